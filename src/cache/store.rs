//! Persistence contracts the local loaders are written against.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::feed::FeedImage;

/// The single feed snapshot kept by a [`FeedStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFeed {
  /// The cached feed in order
  pub feed: Vec<FeedImage>,
  /// When the feed was saved
  pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("sqlite: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("corrupted cache entry: {0}")]
  Corrupted(String),
  #[error("store is closed")]
  Closed,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for the feed snapshot.
///
/// At most one snapshot exists at any time. Callers replace it with
/// `delete_cached_feed` followed by `insert`.
#[async_trait]
pub trait FeedStore: Send + Sync {
  async fn delete_cached_feed(&self) -> StoreResult<()>;

  async fn insert(&self, feed: &[FeedImage], timestamp: DateTime<Utc>) -> StoreResult<()>;

  async fn retrieve(&self) -> StoreResult<Option<CachedFeed>>;
}

/// Storage for image bytes keyed by url.
#[async_trait]
pub trait ImageDataStore: Send + Sync {
  /// Insert or overwrite the bytes for `url`.
  async fn insert(&self, data: &Bytes, url: &Url) -> StoreResult<()>;

  async fn retrieve(&self, url: &Url) -> StoreResult<Option<Bytes>>;
}
