use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::client::HttpClient;
use crate::feed::{Completion, FeedError, FeedResult, ImageDataLoader, LoadTask, TaskHandle};

/// Downloads image bytes.
///
/// Cancelling the returned task drops the request in flight.
pub struct RemoteImageDataLoader<C: ?Sized> {
  client: Arc<C>,
}

impl<C: HttpClient + ?Sized + 'static> RemoteImageDataLoader<C> {
  pub fn new(client: Arc<C>) -> Self {
    Self { client }
  }

  async fn fetch(client: Arc<C>, url: Url) -> FeedResult<Bytes> {
    let response = client.get(&url).await.map_err(|error| {
      debug!(%error, %url, "image request failed");
      FeedError::Connectivity
    })?;

    if response.status == 200 && !response.body.is_empty() {
      Ok(response.body)
    } else {
      Err(FeedError::InvalidData)
    }
  }
}

impl<C: HttpClient + ?Sized + 'static> ImageDataLoader for RemoteImageDataLoader<C> {
  fn load_image_data(&self, url: &Url, completion: Completion<Bytes>) -> TaskHandle {
    let client = Arc::clone(&self.client);
    LoadTask::spawn(Self::fetch(client, url.clone()), completion).into_handle()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::feed::ImageDataLoaderExt;
  use crate::remote::testing::StubClient;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  fn image_url() -> Url {
    Url::parse("https://img.example.com/a.jpeg").unwrap()
  }

  #[tokio::test]
  async fn test_delivers_body_on_200() {
    let client = Arc::new(StubClient::new().respond(&image_url(), 200, &b"jpeg"[..]));
    let loader = RemoteImageDataLoader::new(client);

    let (_task, result) = loader.load_data(&image_url());

    assert_eq!(result.await.unwrap().unwrap(), Bytes::from_static(b"jpeg"));
  }

  #[tokio::test]
  async fn test_empty_body_is_invalid_data() {
    let client = Arc::new(StubClient::new().respond(&image_url(), 200, Vec::new()));
    let loader = RemoteImageDataLoader::new(client);

    let (_task, result) = loader.load_data(&image_url());

    assert!(matches!(result.await.unwrap(), Err(FeedError::InvalidData)));
  }

  #[tokio::test]
  async fn test_non_200_is_invalid_data() {
    let client = Arc::new(StubClient::new().respond(&image_url(), 404, &b"missing"[..]));
    let loader = RemoteImageDataLoader::new(client);

    let (_task, result) = loader.load_data(&image_url());

    assert!(matches!(result.await.unwrap(), Err(FeedError::InvalidData)));
  }

  #[tokio::test]
  async fn test_transport_failure_is_connectivity() {
    let loader = RemoteImageDataLoader::new(Arc::new(StubClient::new()));

    let (_task, result) = loader.load_data(&image_url());

    assert!(matches!(result.await.unwrap(), Err(FeedError::Connectivity)));
  }

  #[tokio::test]
  async fn test_cancel_abandons_request_and_stays_silent() {
    let client = Arc::new(
      StubClient::new()
        .respond(&image_url(), 200, &b"jpeg"[..])
        .delayed(Duration::from_millis(50)),
    );
    let loader = RemoteImageDataLoader::new(Arc::clone(&client));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let task = loader.load_image_data(
      &image_url(),
      Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
      }),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    task.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(client.abandoned.load(Ordering::SeqCst));
  }
}
