//! Capability contracts shared by every tier of the pipeline.

use bytes::Bytes;
use std::future::Future;
use tokio::sync::oneshot;
use url::Url;

use super::error::FeedResult;
use super::task::{channel, Completion, TaskHandle};
use super::types::FeedImage;

/// Loads the whole feed. Completes exactly once; not cancellable.
pub trait FeedLoader: Send + Sync {
  fn load(&self, completion: Completion<Vec<FeedImage>>);
}

/// Loads the bytes of one image, keyed by its url.
///
/// Completes exactly once unless the returned task is cancelled first, in
/// which case it never completes.
pub trait ImageDataLoader: Send + Sync {
  fn load_image_data(&self, url: &Url, completion: Completion<Bytes>) -> TaskHandle;
}

/// Write side of the feed cache.
pub trait FeedCache: Send + Sync {
  fn save(&self, feed: Vec<FeedImage>, completion: Completion<()>);
}

/// Write side of the image data cache.
pub trait ImageDataCache: Send + Sync {
  fn save(&self, data: Bytes, url: &Url, completion: Completion<()>);
}

/// Await a completion through its single-value channel.
///
/// `None` means the completion was dropped without being invoked: the load
/// was cancelled or its result could not be delivered.
async fn received<T>(rx: oneshot::Receiver<FeedResult<T>>) -> Option<FeedResult<T>> {
  rx.await.ok()
}

pub trait FeedLoaderExt: FeedLoader {
  /// Start a load and await its result.
  fn load_feed(&self) -> impl Future<Output = Option<FeedResult<Vec<FeedImage>>>> + Send + 'static {
    let (completion, rx) = channel();
    self.load(completion);
    received(rx)
  }
}

impl<L: FeedLoader + ?Sized> FeedLoaderExt for L {}

pub trait ImageDataLoaderExt: ImageDataLoader {
  /// Start a load and await its result. Dropping the future does not cancel
  /// the load; use the returned handle for that. A cancelled load resolves
  /// to `None`.
  fn load_data(
    &self,
    url: &Url,
  ) -> (
    TaskHandle,
    impl Future<Output = Option<FeedResult<Bytes>>> + Send + 'static,
  ) {
    let (completion, rx) = channel();
    let task = self.load_image_data(url, completion);
    (task, received(rx))
  }
}

impl<L: ImageDataLoader + ?Sized> ImageDataLoaderExt for L {}

#[cfg(test)]
pub trait FeedCacheExt: FeedCache {
  fn save_feed(
    &self,
    feed: Vec<FeedImage>,
  ) -> impl Future<Output = Option<FeedResult<()>>> + Send + 'static {
    let (completion, rx) = channel();
    self.save(feed, completion);
    received(rx)
  }
}

#[cfg(test)]
impl<C: FeedCache + ?Sized> FeedCacheExt for C {}

#[cfg(test)]
pub trait ImageDataCacheExt: ImageDataCache {
  fn save_data(&self, data: Bytes, url: &Url) -> impl Future<Output = Option<FeedResult<()>>> + Send + 'static {
    let (completion, rx) = channel();
    self.save(data, url, completion);
    received(rx)
  }
}

#[cfg(test)]
impl<C: ImageDataCache + ?Sized> ImageDataCacheExt for C {}
