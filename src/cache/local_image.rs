//! Image data loader and cache over an [`ImageDataStore`].

use bytes::Bytes;
use std::sync::Arc;
use url::Url;

use super::store::ImageDataStore;
use crate::feed::{
  deliver, Completion, FeedError, FeedResult, ImageDataCache, ImageDataLoader, LoadTask,
  TaskHandle,
};

pub struct LocalImageDataLoader<S: ?Sized> {
  store: Arc<S>,
}

impl<S: ImageDataStore + ?Sized + 'static> LocalImageDataLoader<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Look up the cached bytes for `url`.
  ///
  /// Storage errors surface as `StoreFailed`, a missing entry as `NotFound`.
  pub async fn retrieve(&self, url: &Url) -> FeedResult<Bytes> {
    self
      .store
      .retrieve(url)
      .await
      .map_err(FeedError::StoreFailed)?
      .ok_or(FeedError::NotFound)
  }

  pub async fn insert(&self, data: &Bytes, url: &Url) -> FeedResult<()> {
    self
      .store
      .insert(data, url)
      .await
      .map_err(FeedError::StoreFailed)
  }
}

impl<S: ?Sized> Clone for LocalImageDataLoader<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<S: ImageDataStore + ?Sized + 'static> ImageDataLoader for LocalImageDataLoader<S> {
  /// Cancelling only suppresses delivery; a store lookup runs to completion.
  fn load_image_data(&self, url: &Url, completion: Completion<Bytes>) -> TaskHandle {
    let this = self.clone();
    let url = url.clone();
    LoadTask::spawn(async move { this.retrieve(&url).await }, completion).into_handle()
  }
}

impl<S: ImageDataStore + ?Sized + 'static> ImageDataCache for LocalImageDataLoader<S> {
  fn save(&self, data: Bytes, url: &Url, completion: Completion<()>) {
    let this = self.clone();
    let url = url.clone();
    deliver(async move { this.insert(&data, &url).await }, completion);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::store::{StoreError, StoreResult};
  use crate::feed::{ImageDataCacheExt, ImageDataLoaderExt};
  use async_trait::async_trait;
  use parking_lot::Mutex;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  #[derive(Default)]
  struct ImageStoreStub {
    entries: Mutex<HashMap<Url, Bytes>>,
    failing: bool,
    delay: Option<Duration>,
  }

  #[async_trait]
  impl ImageDataStore for ImageStoreStub {
    async fn insert(&self, data: &Bytes, url: &Url) -> StoreResult<()> {
      if self.failing {
        return Err(StoreError::Closed);
      }
      self.entries.lock().insert(url.clone(), data.clone());
      Ok(())
    }

    async fn retrieve(&self, url: &Url) -> StoreResult<Option<Bytes>> {
      if let Some(delay) = self.delay {
        tokio::time::sleep(delay).await;
      }
      if self.failing {
        return Err(StoreError::Closed);
      }
      Ok(self.entries.lock().get(url).cloned())
    }
  }

  fn url(path: &str) -> Url {
    Url::parse("https://img.example.com/").unwrap().join(path).unwrap()
  }

  #[tokio::test]
  async fn test_load_returns_stored_bytes() {
    let store = Arc::new(ImageStoreStub::default());
    store
      .entries
      .lock()
      .insert(url("k.jpeg"), Bytes::from_static(b"payload"));
    let loader = LocalImageDataLoader::new(store);

    let (_task, result) = loader.load_data(&url("k.jpeg"));

    assert_eq!(result.await.unwrap().unwrap(), Bytes::from_static(b"payload"));
  }

  #[tokio::test]
  async fn test_load_unknown_key_is_not_found() {
    let loader = LocalImageDataLoader::new(Arc::new(ImageStoreStub::default()));

    let (_task, result) = loader.load_data(&url("missing.jpeg"));

    assert!(matches!(result.await.unwrap(), Err(FeedError::NotFound)));
  }

  #[tokio::test]
  async fn test_load_maps_store_error_to_failed() {
    let loader = LocalImageDataLoader::new(Arc::new(ImageStoreStub {
      failing: true,
      ..ImageStoreStub::default()
    }));

    let (_task, result) = loader.load_data(&url("k.jpeg"));

    assert!(matches!(result.await.unwrap(), Err(FeedError::StoreFailed(_))));
  }

  #[tokio::test]
  async fn test_cancelled_load_never_completes() {
    let store = Arc::new(ImageStoreStub {
      delay: Some(Duration::from_millis(30)),
      ..ImageStoreStub::default()
    });
    store.entries.lock().insert(url("k.jpeg"), Bytes::from_static(b"x"));
    let loader = LocalImageDataLoader::new(store);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let task = loader.load_image_data(
      &url("k.jpeg"),
      Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
      }),
    );
    task.cancel();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_save_then_load_roundtrips_through_store() {
    let loader = LocalImageDataLoader::new(Arc::new(ImageStoreStub::default()));

    loader
      .save_data(Bytes::from_static(b"abc"), &url("k.jpeg"))
      .await
      .unwrap()
      .unwrap();
    let (_task, result) = loader.load_data(&url("k.jpeg"));

    assert_eq!(result.await.unwrap().unwrap(), Bytes::from_static(b"abc"));
  }

  #[tokio::test]
  async fn test_save_maps_store_error_to_failed() {
    let loader = LocalImageDataLoader::new(Arc::new(ImageStoreStub {
      failing: true,
      ..ImageStoreStub::default()
    }));

    let result = loader
      .save_data(Bytes::from_static(b"abc"), &url("k.jpeg"))
      .await
      .unwrap();

    assert!(matches!(result, Err(FeedError::StoreFailed(_))));
  }
}
