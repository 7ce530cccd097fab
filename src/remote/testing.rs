//! Scriptable transport for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::client::{HttpClient, HttpResponse, TransportError, UploadForm};

/// Answers GETs from a url table and records POSTs.
#[derive(Default)]
pub struct StubClient {
  responses: Mutex<HashMap<Url, HttpResponse>>,
  post_status: Mutex<Option<u16>>,
  pub posts: Mutex<Vec<(Url, UploadForm)>>,
  pub gets: AtomicUsize,
  delay: Mutex<Option<Duration>>,
  /// Set when a delayed request was dropped before it finished.
  pub abandoned: Arc<AtomicBool>,
}

impl StubClient {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(self, url: &Url, status: u16, body: impl Into<bytes::Bytes>) -> Self {
    self
      .responses
      .lock()
      .insert(url.clone(), HttpResponse::new(status, body));
    self
  }

  pub fn post_status(self, status: u16) -> Self {
    *self.post_status.lock() = Some(status);
    self
  }

  pub fn delayed(self, delay: Duration) -> Self {
    *self.delay.lock() = Some(delay);
    self
  }
}

struct AbandonGuard {
  flag: Arc<AtomicBool>,
  finished: bool,
}

impl Drop for AbandonGuard {
  fn drop(&mut self) {
    if !self.finished {
      self.flag.store(true, Ordering::SeqCst);
    }
  }
}

#[async_trait]
impl HttpClient for StubClient {
  async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
    self.gets.fetch_add(1, Ordering::SeqCst);

    let delay = *self.delay.lock();
    if let Some(delay) = delay {
      let mut guard = AbandonGuard {
        flag: Arc::clone(&self.abandoned),
        finished: false,
      };
      tokio::time::sleep(delay).await;
      guard.finished = true;
    }

    let response = self.responses.lock().get(url).cloned();
    response.ok_or(TransportError::Offline)
  }

  async fn post(&self, url: &Url, form: UploadForm) -> Result<HttpResponse, TransportError> {
    self.posts.lock().push((url.clone(), form));
    let status = *self.post_status.lock();
    status
      .map(|status| HttpResponse::new(status, Vec::new()))
      .ok_or(TransportError::Offline)
  }
}
