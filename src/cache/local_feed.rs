//! Feed loader and feed cache over a [`FeedStore`].

use std::sync::Arc;
use tracing::{debug, info};

use super::policy::FeedCachePolicy;
use super::store::FeedStore;
use crate::feed::{deliver, Clock, Completion, FeedCache, FeedImage, FeedLoader, FeedResult};

/// Reads the cached feed through the freshness policy and replaces it on save.
pub struct LocalFeedLoader<S: ?Sized> {
  store: Arc<S>,
  current_date: Clock,
}

impl<S: FeedStore + ?Sized + 'static> LocalFeedLoader<S> {
  pub fn new(store: Arc<S>, current_date: Clock) -> Self {
    Self {
      store,
      current_date,
    }
  }

  /// Return the cached feed if it is still fresh.
  ///
  /// A missing or stale snapshot yields an empty feed. The stale snapshot
  /// stays in the store; only [`validate`](Self::validate) deletes it.
  pub async fn load_cached(&self) -> FeedResult<Vec<FeedImage>> {
    match self.store.retrieve().await? {
      Some(cache) if FeedCachePolicy::validate(cache.timestamp, (self.current_date)()) => {
        Ok(cache.feed)
      }
      Some(_) => {
        debug!("cached feed is stale, serving empty feed");
        Ok(Vec::new())
      }
      None => Ok(Vec::new()),
    }
  }

  /// Replace the cached snapshot with `feed`.
  ///
  /// Nothing is inserted when the old snapshot cannot be deleted.
  pub async fn replace(&self, feed: &[FeedImage]) -> FeedResult<()> {
    self.store.delete_cached_feed().await?;
    self.store.insert(feed, (self.current_date)()).await?;
    Ok(())
  }

  /// Delete the cached snapshot if it is stale or unreadable.
  pub async fn validate(&self) -> FeedResult<()> {
    let expired = match self.store.retrieve().await {
      Err(error) => {
        info!(%error, "cached feed unreadable, deleting it");
        true
      }
      Ok(Some(cache)) => !FeedCachePolicy::validate(cache.timestamp, (self.current_date)()),
      Ok(None) => false,
    };

    if expired {
      info!("deleting expired feed cache");
      self.store.delete_cached_feed().await?;
    }
    Ok(())
  }

  /// Callback form of [`validate`](Self::validate).
  pub fn validate_cache(&self, completion: Completion<()>) {
    let this = self.clone();
    deliver(async move { this.validate().await }, completion);
  }
}

impl<S: ?Sized> Clone for LocalFeedLoader<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      current_date: Arc::clone(&self.current_date),
    }
  }
}

impl<S: FeedStore + ?Sized + 'static> FeedLoader for LocalFeedLoader<S> {
  fn load(&self, completion: Completion<Vec<FeedImage>>) {
    let this = self.clone();
    deliver(async move { this.load_cached().await }, completion);
  }
}

impl<S: FeedStore + ?Sized + 'static> FeedCache for LocalFeedLoader<S> {
  fn save(&self, feed: Vec<FeedImage>, completion: Completion<()>) {
    let this = self.clone();
    deliver(async move { this.replace(&feed).await }, completion);
  }
}
