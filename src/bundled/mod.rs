//! Last-resort tier: images shipped with the application.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::feed::{
  Clock, Completion, FeedError, FeedImage, FeedLoader, ImageDataLoader, LoadTask, TaskHandle,
};

/// Names of the images a bundle may carry, in feed order.
pub const BUNDLED_NAMES: [&str; 6] = ["spider", "bobcat", "snake", "tiger", "polarbear", "eagle"];

const BUNDLE_SCHEME: &str = "bundle";

/// Synchronous lookup of bundled image bytes by name.
pub trait BundledSource: Send + Sync {
  fn lookup(&self, name: &str) -> Option<Bytes>;
}

/// Bundle read from `<dir>/<name>.jpeg`.
pub struct DirectoryBundle {
  dir: PathBuf,
}

impl DirectoryBundle {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }
}

impl BundledSource for DirectoryBundle {
  fn lookup(&self, name: &str) -> Option<Bytes> {
    let path = self.dir.join(format!("{name}.jpeg"));
    match std::fs::read(&path) {
      Ok(data) => Some(Bytes::from(data)),
      Err(error) => {
        debug!(%error, path = %path.display(), "bundled image unavailable");
        None
      }
    }
  }
}

/// Bundle with nothing in it.
pub struct EmptyBundle;

impl BundledSource for EmptyBundle {
  fn lookup(&self, _name: &str) -> Option<Bytes> {
    None
  }
}

/// Url under which a bundled image is listed in the feed.
pub fn bundle_url(name: &str) -> Option<Url> {
  Url::parse(&format!("{BUNDLE_SCHEME}:///{name}.jpeg")).ok()
}

fn bundle_name(url: &Url) -> Option<&str> {
  if url.scheme() != BUNDLE_SCHEME {
    return None;
  }
  Path::new(url.path()).file_stem()?.to_str()
}

pub struct BundledFeedLoader<B: ?Sized> {
  source: Arc<B>,
  current_date: Clock,
}

impl<B: BundledSource + ?Sized> BundledFeedLoader<B> {
  pub fn new(source: Arc<B>, current_date: Clock) -> Self {
    Self {
      source,
      current_date,
    }
  }
}

impl<B: BundledSource + ?Sized> FeedLoader for BundledFeedLoader<B> {
  fn load(&self, completion: Completion<Vec<FeedImage>>) {
    let now = (self.current_date)();
    let feed = BUNDLED_NAMES
      .iter()
      .filter(|name| self.source.lookup(name).is_some())
      .filter_map(|name| bundle_url(name))
      .map(|url| FeedImage::new(url, now, now))
      .collect();
    completion(Ok(feed));
  }
}

pub struct BundledImageDataLoader<B: ?Sized> {
  source: Arc<B>,
}

impl<B: BundledSource + ?Sized> BundledImageDataLoader<B> {
  pub fn new(source: Arc<B>) -> Self {
    Self { source }
  }
}

impl<B: BundledSource + ?Sized> ImageDataLoader for BundledImageDataLoader<B> {
  fn load_image_data(&self, url: &Url, completion: Completion<Bytes>) -> TaskHandle {
    let task = LoadTask::new(completion);
    let result = bundle_name(url)
      .and_then(|name| self.source.lookup(name))
      .ok_or(FeedError::NotFound);
    task.complete(result);
    task.into_handle()
  }
}
