//! Upload of edited images: fetch a one-time upload endpoint, then post the
//! image to it.

use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::api_types::{map_endpoint, UploadEndpoint};
use super::client::{HttpClient, UploadForm};
use crate::feed::{deliver, Completion, FeedError, FeedResult};

const CREATED_201: u16 = 201;

/// Provides the url an upload must be posted to.
pub trait EndpointLoader: Send + Sync {
  fn load(&self, completion: Completion<UploadEndpoint>);
}

/// Posts image bytes derived from a feed image.
pub trait ImageUploader: Send + Sync {
  fn upload_image_data(&self, data: Bytes, to: &Url, original: &Url, completion: Completion<()>);
}

pub struct RemoteEndpointLoader<C: ?Sized> {
  url: Url,
  client: Arc<C>,
}

impl<C: HttpClient + ?Sized + 'static> RemoteEndpointLoader<C> {
  pub fn new(url: Url, client: Arc<C>) -> Self {
    Self { url, client }
  }

  async fn fetch(client: Arc<C>, url: Url) -> FeedResult<UploadEndpoint> {
    let response = client.get(&url).await.map_err(|error| {
      debug!(%error, %url, "endpoint request failed");
      FeedError::Connectivity
    })?;
    map_endpoint(&response)
  }
}

impl<C: HttpClient + ?Sized + 'static> EndpointLoader for RemoteEndpointLoader<C> {
  fn load(&self, completion: Completion<UploadEndpoint>) {
    let client = Arc::clone(&self.client);
    deliver(Self::fetch(client, self.url.clone()), completion);
  }
}

pub struct RemoteImageUploader<C: ?Sized> {
  app_id: String,
  client: Arc<C>,
}

impl<C: HttpClient + ?Sized + 'static> RemoteImageUploader<C> {
  pub fn new(app_id: impl Into<String>, client: Arc<C>) -> Self {
    Self {
      app_id: app_id.into(),
      client,
    }
  }

  async fn post(client: Arc<C>, to: Url, form: UploadForm) -> FeedResult<()> {
    let response = client.post(&to, form).await.map_err(|error| {
      debug!(%error, %to, "upload failed");
      FeedError::Connectivity
    })?;

    match response.status {
      CREATED_201 => Ok(()),
      status => Err(FeedError::UploadRejected(status)),
    }
  }
}

impl<C: HttpClient + ?Sized + 'static> ImageUploader for RemoteImageUploader<C> {
  fn upload_image_data(&self, data: Bytes, to: &Url, original: &Url, completion: Completion<()>) {
    let form = UploadForm {
      app_id: self.app_id.clone(),
      original: original.clone(),
      file: data,
    };
    deliver(
      Self::post(Arc::clone(&self.client), to.clone(), form),
      completion,
    );
  }
}
