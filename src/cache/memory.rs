//! Store that keeps everything in process memory.
//! Used when the on-disk cache is disabled.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use url::Url;

use super::store::{CachedFeed, FeedStore, ImageDataStore, StoreResult};
use crate::feed::FeedImage;

#[derive(Default)]
pub struct InMemoryStore {
  state: Mutex<State>,
}

#[derive(Default)]
struct State {
  feed: Option<CachedFeed>,
  images: HashMap<Url, Bytes>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl FeedStore for InMemoryStore {
  async fn delete_cached_feed(&self) -> StoreResult<()> {
    let mut state = self.state.lock();
    if let Some(cache) = state.feed.take() {
      for image in &cache.feed {
        state.images.remove(&image.url);
      }
    }
    Ok(())
  }

  async fn insert(&self, feed: &[FeedImage], timestamp: DateTime<Utc>) -> StoreResult<()> {
    self.state.lock().feed = Some(CachedFeed {
      feed: feed.to_vec(),
      timestamp,
    });
    Ok(())
  }

  async fn retrieve(&self) -> StoreResult<Option<CachedFeed>> {
    Ok(self.state.lock().feed.clone())
  }
}

#[async_trait]
impl ImageDataStore for InMemoryStore {
  async fn insert(&self, data: &Bytes, url: &Url) -> StoreResult<()> {
    self.state.lock().images.insert(url.clone(), data.clone());
    Ok(())
  }

  async fn retrieve(&self, url: &Url) -> StoreResult<Option<Bytes>> {
    Ok(self.state.lock().images.get(url).cloned())
  }
}
