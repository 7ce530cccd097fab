//! HTTP transport used by the remote loaders.

use async_trait::async_trait;
use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub body: Bytes,
}

impl HttpResponse {
  pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
    Self {
      status,
      body: body.into(),
    }
  }
}

/// Multipart upload of an edited image.
#[derive(Debug, Clone)]
pub struct UploadForm {
  pub app_id: String,
  /// Url of the feed image the upload was derived from
  pub original: Url,
  pub file: Bytes,
}

#[derive(Debug, Error)]
pub enum TransportError {
  #[error("offline")]
  Offline,
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),
}

/// Transport for the remote loaders.
///
/// Dropping a returned future abandons the request.
#[async_trait]
pub trait HttpClient: Send + Sync {
  async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError>;

  async fn post(&self, url: &Url, form: UploadForm) -> Result<HttpResponse, TransportError>;
}

/// [`HttpClient`] backed by reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
  client: reqwest::Client,
}

impl ReqwestClient {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl HttpClient for ReqwestClient {
  async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
    let response = self.client.get(url.clone()).send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?;
    Ok(HttpResponse { status, body })
  }

  async fn post(&self, url: &Url, form: UploadForm) -> Result<HttpResponse, TransportError> {
    let file = Part::bytes(form.file.to_vec())
      .file_name("upload.jpeg")
      .mime_str("image/jpeg")?;
    let multipart = Form::new()
      .text("appid", form.app_id)
      .text("original", form.original.to_string())
      .part("file", file);

    let response = self
      .client
      .post(url.clone())
      .multipart(multipart)
      .send()
      .await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?;
    Ok(HttpResponse { status, body })
  }
}

/// Transport with no network. Every request fails, forcing the pipeline onto
/// its cache and bundled tiers.
pub struct OfflineClient;

#[async_trait]
impl HttpClient for OfflineClient {
  async fn get(&self, _url: &Url) -> Result<HttpResponse, TransportError> {
    Err(TransportError::Offline)
  }

  async fn post(&self, _url: &Url, _form: UploadForm) -> Result<HttpResponse, TransportError> {
    Err(TransportError::Offline)
  }
}
