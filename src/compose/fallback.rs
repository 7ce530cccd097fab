use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::feed::{
  Cancellable, Completion, FeedImage, FeedLoader, FeedResult, ImageDataLoader, LoadTask,
  TaskHandle,
};

/// Tries `primary`, and only if it fails, `fallback`.
///
/// The primary's error is dropped; the caller sees whatever the fallback
/// delivers. Composites nest, so `fallback` may itself be a composite.
pub struct FallbackComposite<P: ?Sized, F: ?Sized> {
  primary: Arc<P>,
  fallback: Arc<F>,
}

impl<P: ?Sized, F: ?Sized> FallbackComposite<P, F> {
  pub fn new(primary: Arc<P>, fallback: Arc<F>) -> Self {
    Self { primary, fallback }
  }
}

impl<P, F> FeedLoader for FallbackComposite<P, F>
where
  P: FeedLoader + ?Sized,
  F: FeedLoader + ?Sized + 'static,
{
  fn load(&self, completion: Completion<Vec<FeedImage>>) {
    let fallback = Arc::clone(&self.fallback);
    self.primary.load(Box::new(move |result| match result {
      Ok(feed) => completion(Ok(feed)),
      Err(error) => {
        debug!(%error, "primary feed source failed, trying fallback");
        fallback.load(completion);
      }
    }));
  }
}

#[derive(Default)]
struct ActiveTask {
  handle: Option<TaskHandle>,
  retargeted: bool,
  cancelled: bool,
}

/// Cancels whichever tier is currently serving the load.
///
/// Every tier delivers through `delivery`, so nothing reaches the caller once
/// the task is cancelled, whichever tier is running.
#[derive(Clone)]
struct FallbackTask {
  active: Arc<Mutex<ActiveTask>>,
  delivery: LoadTask<Bytes>,
}

impl FallbackTask {
  fn new(completion: Completion<Bytes>) -> Self {
    Self {
      active: Arc::default(),
      delivery: LoadTask::new(completion),
    }
  }

  fn is_cancelled(&self) -> bool {
    self.active.lock().cancelled
  }

  fn forward(&self) -> Completion<Bytes> {
    let delivery = self.delivery.clone();
    Box::new(move |result| delivery.complete(result))
  }

  /// Install the primary's handle unless the fallback already took over.
  fn attach_primary(&self, handle: TaskHandle) {
    let mut active = self.active.lock();
    if active.cancelled {
      drop(active);
      handle.cancel();
    } else if !active.retargeted {
      active.handle = Some(handle);
    }
  }

  fn retarget(&self, handle: TaskHandle) {
    let mut active = self.active.lock();
    if active.cancelled {
      drop(active);
      handle.cancel();
    } else {
      active.retargeted = true;
      active.handle = Some(handle);
    }
  }
}

impl Cancellable for FallbackTask {
  fn cancel(&self) {
    self.delivery.cancel();
    let handle = {
      let mut active = self.active.lock();
      active.cancelled = true;
      active.handle.take()
    };
    if let Some(handle) = handle {
      handle.cancel();
    }
  }
}

impl<P, F> ImageDataLoader for FallbackComposite<P, F>
where
  P: ImageDataLoader + ?Sized,
  F: ImageDataLoader + ?Sized + 'static,
{
  fn load_image_data(&self, url: &Url, completion: Completion<Bytes>) -> TaskHandle {
    let task = FallbackTask::new(completion);
    let fallback = Arc::clone(&self.fallback);
    let switch = task.clone();
    let key = url.clone();

    // The primary may complete before it returns its handle, in which case
    // the fallback is already installed and the primary handle is discarded.
    let primary = self.primary.load_image_data(
      url,
      Box::new(move |result: FeedResult<Bytes>| match result {
        Ok(data) => switch.delivery.complete(Ok(data)),
        Err(error) => {
          if switch.is_cancelled() {
            return;
          }
          debug!(%error, url = %key, "primary image source failed, trying fallback");
          let handle = fallback.load_image_data(&key, switch.forward());
          switch.retarget(handle);
        }
      }),
    );
    task.attach_primary(primary);

    Box::new(task)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::feed::{FeedError, FeedLoaderExt, ImageDataLoaderExt};
  use chrono::{TimeZone, Utc};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  fn image(n: u32) -> FeedImage {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, n).unwrap();
    FeedImage::new(
      Url::parse(&format!("https://img.example.com/{n}.jpeg")).unwrap(),
      at,
      at,
    )
  }

  fn any_url() -> Url {
    Url::parse("https://img.example.com/any.jpeg").unwrap()
  }

  /// Feed loader answering with a fixed result and counting calls.
  struct FeedStub {
    result: fn() -> FeedResult<Vec<FeedImage>>,
    calls: AtomicUsize,
  }

  impl FeedStub {
    fn new(result: fn() -> FeedResult<Vec<FeedImage>>) -> Arc<Self> {
      Arc::new(Self {
        result,
        calls: AtomicUsize::new(0),
      })
    }
  }

  impl FeedLoader for FeedStub {
    fn load(&self, completion: Completion<Vec<FeedImage>>) {
      self.calls.fetch_add(1, Ordering::SeqCst);
      completion((self.result)());
    }
  }

  /// Image loader that completes after `delay`, or immediately when zero.
  struct ImageStub {
    result: fn() -> FeedResult<Bytes>,
    delay: Duration,
    calls: AtomicUsize,
    cancels: Arc<AtomicUsize>,
  }

  impl ImageStub {
    fn new(result: fn() -> FeedResult<Bytes>, delay: Duration) -> Arc<Self> {
      Arc::new(Self {
        result,
        delay,
        calls: AtomicUsize::new(0),
        cancels: Arc::new(AtomicUsize::new(0)),
      })
    }
  }

  struct CountingHandle {
    task: LoadTask<Bytes>,
    cancels: Arc<AtomicUsize>,
  }

  impl Cancellable for CountingHandle {
    fn cancel(&self) {
      self.cancels.fetch_add(1, Ordering::SeqCst);
      self.task.cancel();
    }
  }

  impl ImageDataLoader for ImageStub {
    fn load_image_data(&self, _url: &Url, completion: Completion<Bytes>) -> TaskHandle {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let result = (self.result)();
      let task = if self.delay.is_zero() {
        let task = LoadTask::new(completion);
        task.complete(result);
        task
      } else {
        let delay = self.delay;
        LoadTask::spawn(
          async move {
            tokio::time::sleep(delay).await;
            result
          },
          completion,
        )
      };
      Box::new(CountingHandle {
        task,
        cancels: Arc::clone(&self.cancels),
      })
    }
  }

  #[tokio::test]
  async fn test_primary_success_never_invokes_fallback() {
    let primary = FeedStub::new(|| Ok(vec![image(1)]));
    let fallback = FeedStub::new(|| Ok(vec![image(2)]));
    let composite = FallbackComposite::new(primary, Arc::clone(&fallback));

    let feed = composite.load_feed().await.unwrap().unwrap();

    assert_eq!(feed, vec![image(1)]);
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_primary_failure_delivers_fallback_result() {
    let primary = FeedStub::new(|| Err(FeedError::Connectivity));
    let fallback = FeedStub::new(|| Err(FeedError::NotFound));
    let composite = FallbackComposite::new(primary, fallback);

    let result = composite.load_feed().await.unwrap();

    assert!(matches!(result, Err(FeedError::NotFound)));
  }

  #[tokio::test]
  async fn test_three_tier_chain_delivers_first_success() {
    let remote = FeedStub::new(|| Err(FeedError::Connectivity));
    let local = FeedStub::new(|| Err(FeedError::NotFound));
    let bundled = FeedStub::new(|| Ok(vec![image(3)]));
    let chain = FallbackComposite::new(
      Arc::new(FallbackComposite::new(remote, local)),
      Arc::clone(&bundled),
    );

    assert_eq!(chain.load_feed().await.unwrap().unwrap(), vec![image(3)]);

    let remote = FeedStub::new(|| Err(FeedError::Connectivity));
    let local = FeedStub::new(|| Ok(vec![image(2)]));
    let bundled = FeedStub::new(|| Ok(vec![image(3)]));
    let chain = FallbackComposite::new(
      Arc::new(FallbackComposite::new(remote, local)),
      Arc::clone(&bundled),
    );

    assert_eq!(chain.load_feed().await.unwrap().unwrap(), vec![image(2)]);
    assert_eq!(bundled.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_image_primary_success_never_invokes_fallback() {
    let primary = ImageStub::new(|| Ok(Bytes::from_static(b"primary")), Duration::ZERO);
    let fallback = ImageStub::new(|| Ok(Bytes::from_static(b"fallback")), Duration::ZERO);
    let composite = FallbackComposite::new(primary, Arc::clone(&fallback));

    let (_task, result) = composite.load_data(&any_url());

    assert_eq!(result.await.unwrap().unwrap(), Bytes::from_static(b"primary"));
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_image_chain_falls_through_synchronous_failures() {
    let first = ImageStub::new(|| Err(FeedError::NotFound), Duration::ZERO);
    let second = ImageStub::new(|| Err(FeedError::NotFound), Duration::ZERO);
    let third = ImageStub::new(|| Ok(Bytes::from_static(b"third")), Duration::ZERO);
    let chain = FallbackComposite::new(Arc::new(FallbackComposite::new(first, second)), third);

    let (_task, result) = chain.load_data(&any_url());

    assert_eq!(result.await.unwrap().unwrap(), Bytes::from_static(b"third"));
  }

  #[tokio::test]
  async fn test_cancel_before_primary_completes_cancels_primary_only() {
    let primary = ImageStub::new(|| Err(FeedError::Connectivity), Duration::from_millis(50));
    let fallback = ImageStub::new(|| Ok(Bytes::from_static(b"fallback")), Duration::ZERO);
    let composite = FallbackComposite::new(Arc::clone(&primary), Arc::clone(&fallback));

    let (task, result) = composite.load_data(&any_url());
    task.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(result.await.is_none());
    assert_eq!(primary.cancels.load(Ordering::SeqCst), 1);
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_cancel_after_primary_failure_retargets_to_fallback() {
    let primary = ImageStub::new(|| Err(FeedError::NotFound), Duration::ZERO);
    let fallback = ImageStub::new(|| Ok(Bytes::from_static(b"fallback")), Duration::from_millis(50));
    let composite = FallbackComposite::new(Arc::clone(&primary), Arc::clone(&fallback));

    let (task, result) = composite.load_data(&any_url());
    task.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(result.await.is_none());
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fallback.cancels.load(Ordering::SeqCst), 1);
    assert_eq!(primary.cancels.load(Ordering::SeqCst), 0);
  }

  /// Fallback that cancels the composite task while it is being started,
  /// then completes synchronously.
  struct CancellingFallback {
    composite_task: Arc<Mutex<Option<TaskHandle>>>,
  }

  impl ImageDataLoader for CancellingFallback {
    fn load_image_data(&self, _url: &Url, completion: Completion<Bytes>) -> TaskHandle {
      let composite_task = self.composite_task.lock().take();
      if let Some(task) = composite_task {
        task.cancel();
      }
      let task = LoadTask::new(completion);
      task.complete(Ok(Bytes::from_static(b"late")));
      task.into_handle()
    }
  }

  #[tokio::test]
  async fn test_cancel_while_fallback_starts_suppresses_its_result() {
    let primary = ImageStub::new(|| Err(FeedError::NotFound), Duration::from_millis(10));
    let slot = Arc::new(Mutex::new(None));
    let fallback = Arc::new(CancellingFallback {
      composite_task: Arc::clone(&slot),
    });
    let composite = FallbackComposite::new(primary, fallback);

    let (task, result) = composite.load_data(&any_url());
    *slot.lock() = Some(task);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(slot.lock().is_none());
    assert!(result.await.is_none());
  }
}
