use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::api_types::map_feed;
use super::client::HttpClient;
use crate::feed::{deliver, Completion, FeedError, FeedImage, FeedLoader, FeedResult};

/// Loads the feed from the API.
pub struct RemoteFeedLoader<C: ?Sized> {
  url: Url,
  client: Arc<C>,
}

impl<C: HttpClient + ?Sized + 'static> RemoteFeedLoader<C> {
  pub fn new(url: Url, client: Arc<C>) -> Self {
    Self { url, client }
  }

  async fn fetch(client: Arc<C>, url: Url) -> FeedResult<Vec<FeedImage>> {
    let response = client.get(&url).await.map_err(|error| {
      debug!(%error, %url, "feed request failed");
      FeedError::Connectivity
    })?;
    map_feed(&response)
  }
}

impl<C: HttpClient + ?Sized + 'static> FeedLoader for RemoteFeedLoader<C> {
  fn load(&self, completion: Completion<Vec<FeedImage>>) {
    let client = Arc::clone(&self.client);
    let url = self.url.clone();
    deliver(Self::fetch(client, url), completion);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::feed::FeedLoaderExt;
  use crate::remote::testing::StubClient;

  fn feed_url() -> Url {
    Url::parse("https://api.example.com/image").unwrap()
  }

  #[tokio::test]
  async fn test_delivers_mapped_feed() {
    let body = r#"[{"url": "https://img.example.com/a.jpeg", "created": "Feb 28, 2022 5:05:43 PM", "updated": "Feb 28, 2022 5:05:43 PM"}]"#;
    let client = Arc::new(StubClient::new().respond(&feed_url(), 200, body));
    let loader = RemoteFeedLoader::new(feed_url(), client);

    let feed = loader.load_feed().await.unwrap().unwrap();

    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].url.as_str(), "https://img.example.com/a.jpeg");
  }

  #[tokio::test]
  async fn test_transport_failure_is_connectivity() {
    let loader = RemoteFeedLoader::new(feed_url(), Arc::new(StubClient::new()));

    let result = loader.load_feed().await.unwrap();

    assert!(matches!(result, Err(FeedError::Connectivity)));
  }

  #[tokio::test]
  async fn test_bad_status_is_invalid_data() {
    let client = Arc::new(StubClient::new().respond(&feed_url(), 503, "[]"));
    let loader = RemoteFeedLoader::new(feed_url(), client);

    let result = loader.load_feed().await.unwrap();

    assert!(matches!(result, Err(FeedError::InvalidData)));
  }
}
