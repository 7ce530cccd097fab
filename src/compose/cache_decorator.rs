use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::feed::{
  Completion, FeedCache, FeedImage, FeedLoader, FeedResult, ImageDataCache, ImageDataLoader,
  TaskHandle,
};

fn log_save(what: &'static str) -> Completion<()> {
  Box::new(move |result: FeedResult<()>| match result {
    Ok(()) => debug!(what, "cache write succeeded"),
    Err(error) => warn!(%error, what, "cache write failed"),
  })
}

/// Writes every successfully loaded feed into a cache.
///
/// The caller receives the load result first; the write's outcome is only
/// logged.
pub struct FeedLoaderCacheDecorator<L: ?Sized, C: ?Sized> {
  decoratee: Arc<L>,
  cache: Arc<C>,
}

impl<L: ?Sized, C: ?Sized> FeedLoaderCacheDecorator<L, C> {
  pub fn new(decoratee: Arc<L>, cache: Arc<C>) -> Self {
    Self { decoratee, cache }
  }
}

impl<L, C> FeedLoader for FeedLoaderCacheDecorator<L, C>
where
  L: FeedLoader + ?Sized,
  C: FeedCache + ?Sized + 'static,
{
  fn load(&self, completion: Completion<Vec<FeedImage>>) {
    let cache = Arc::clone(&self.cache);
    self.decoratee.load(Box::new(move |result| match result {
      Ok(feed) => {
        let saved = feed.clone();
        completion(Ok(feed));
        cache.save(saved, log_save("feed"));
      }
      Err(error) => completion(Err(error)),
    }));
  }
}

/// Writes every successfully loaded image into a cache.
pub struct ImageDataLoaderCacheDecorator<L: ?Sized, C: ?Sized> {
  decoratee: Arc<L>,
  cache: Arc<C>,
}

impl<L: ?Sized, C: ?Sized> ImageDataLoaderCacheDecorator<L, C> {
  pub fn new(decoratee: Arc<L>, cache: Arc<C>) -> Self {
    Self { decoratee, cache }
  }
}

impl<L, C> ImageDataLoader for ImageDataLoaderCacheDecorator<L, C>
where
  L: ImageDataLoader + ?Sized,
  C: ImageDataCache + ?Sized + 'static,
{
  fn load_image_data(&self, url: &Url, completion: Completion<Bytes>) -> TaskHandle {
    let cache = Arc::clone(&self.cache);
    let key = url.clone();
    self.decoratee.load_image_data(
      url,
      Box::new(move |result: FeedResult<Bytes>| match result {
        Ok(data) => {
          // Bytes clones share the buffer.
          completion(Ok(data.clone()));
          cache.save(data, &key, log_save("image data"));
        }
        Err(error) => completion(Err(error)),
      }),
    )
  }
}
