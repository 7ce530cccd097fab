//! SQLite-backed store for the feed snapshot and image data.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;

use super::store::{CachedFeed, FeedStore, ImageDataStore, StoreError, StoreResult};
use crate::feed::FeedImage;

type Job = Box<dyn FnOnce(&mut Connection) + Send>;

/// SQLite-based store implementing both [`FeedStore`] and [`ImageDataStore`].
///
/// The connection lives on a private worker thread. Every operation is queued
/// to that thread, so operations on one store run strictly in submission order.
pub struct SqliteStore {
  jobs: mpsc::Sender<Job>,
}

impl SqliteStore {
  /// Open the store at `path`, creating it if needed.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::start(conn)
  }

  /// Open a store that lives only as long as this value.
  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::start(conn)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pixfeed").join("cache.db"))
  }

  fn start(mut conn: Connection) -> Result<Self> {
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    let (jobs, queue) = mpsc::channel::<Job>();
    std::thread::Builder::new()
      .name("pixfeed-store".to_string())
      .spawn(move || {
        for job in queue {
          job(&mut conn);
        }
        debug!("cache store worker stopped");
      })
      .map_err(|e| eyre!("Failed to start cache worker: {}", e))?;

    Ok(Self { jobs })
  }

  /// Run `action` on the worker thread and wait for its result.
  async fn perform<T, F>(&self, action: F) -> StoreResult<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
  {
    let (reply, response) = oneshot::channel();
    self
      .jobs
      .send(Box::new(move |conn| {
        let _ = reply.send(action(conn));
      }))
      .map_err(|_| StoreError::Closed)?;

    response.await.map_err(|_| StoreError::Closed)?
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- The single feed snapshot
CREATE TABLE IF NOT EXISTS feed_cache (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    saved_at TEXT NOT NULL
);

-- Snapshot entries (preserves order)
CREATE TABLE IF NOT EXISTS feed_images (
    position INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_feed_images_url ON feed_images(url);

-- Image bytes keyed by url
CREATE TABLE IF NOT EXISTS image_data (
    url TEXT PRIMARY KEY,
    data BLOB,
    digest TEXT
);
"#;

#[async_trait]
impl FeedStore for SqliteStore {
  async fn delete_cached_feed(&self) -> StoreResult<()> {
    self
      .perform(|conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM image_data WHERE url IN (SELECT url FROM feed_images)",
          [],
        )?;
        tx.execute("DELETE FROM feed_images", [])?;
        tx.execute("DELETE FROM feed_cache", [])?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn insert(&self, feed: &[FeedImage], timestamp: DateTime<Utc>) -> StoreResult<()> {
    let feed = feed.to_vec();
    self
      .perform(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM feed_images", [])?;
        tx.execute(
          "INSERT OR REPLACE INTO feed_cache (id, saved_at) VALUES (1, ?)",
          params![format_datetime(timestamp)],
        )?;

        {
          let mut stmt = tx.prepare(
            "INSERT INTO feed_images (position, url, created_at, updated_at)
             VALUES (?, ?, ?, ?)",
          )?;
          for (position, image) in feed.iter().enumerate() {
            stmt.execute(params![
              position as i64,
              image.url.as_str(),
              format_datetime(image.created),
              format_datetime(image.updated),
            ])?;
          }
        }

        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn retrieve(&self) -> StoreResult<Option<CachedFeed>> {
    self
      .perform(|conn| {
        let saved_at: Option<String> = conn
          .query_row("SELECT saved_at FROM feed_cache WHERE id = 1", [], |row| {
            row.get(0)
          })
          .optional()?;

        let saved_at = match saved_at {
          Some(saved_at) => parse_datetime(&saved_at)?,
          None => return Ok(None),
        };

        let mut stmt = conn.prepare(
          "SELECT url, created_at, updated_at FROM feed_images ORDER BY position",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok((
              row.get::<_, String>(0)?,
              row.get::<_, String>(1)?,
              row.get::<_, String>(2)?,
            ))
          })?
          .collect::<Result<Vec<_>, _>>()?;

        let feed = rows
          .into_iter()
          .map(|(url, created, updated)| {
            Ok(FeedImage::new(
              parse_url(&url)?,
              parse_datetime(&created)?,
              parse_datetime(&updated)?,
            ))
          })
          .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(CachedFeed {
          feed,
          timestamp: saved_at,
        }))
      })
      .await
  }
}

#[async_trait]
impl ImageDataStore for SqliteStore {
  async fn insert(&self, data: &Bytes, url: &Url) -> StoreResult<()> {
    let data = data.clone();
    let url = url.to_string();
    self
      .perform(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO image_data (url, data, digest) VALUES (?, ?, ?)",
          params![url, data.as_ref(), digest(&data)],
        )?;
        Ok(())
      })
      .await
  }

  async fn retrieve(&self, url: &Url) -> StoreResult<Option<Bytes>> {
    let url = url.to_string();
    self
      .perform(move |conn| {
        let row: Option<(Option<Vec<u8>>, Option<String>)> = conn
          .query_row(
            "SELECT data, digest FROM image_data WHERE url = ?",
            params![url],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        match row {
          Some((Some(data), expected)) => {
            if let Some(expected) = expected {
              if digest(&data) != expected {
                return Err(StoreError::Corrupted(format!("digest mismatch for {}", url)));
              }
            }
            Ok(Some(Bytes::from(data)))
          }
          _ => Ok(None),
        }
      })
      .await
  }
}

fn digest(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}

fn format_datetime(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> StoreResult<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| StoreError::Corrupted(format!("bad timestamp '{}': {}", s, e)))
}

fn parse_url(s: &str) -> StoreResult<Url> {
  Url::parse(s).map_err(|e| StoreError::Corrupted(format!("bad url '{}': {}", s, e)))
}
