//! Cancellable one-shot delivery of load results.
//!
//! Every load hands its result to a [`Completion`]. A [`LoadTask`] owns that
//! completion until it is either invoked or cancelled, whichever happens
//! first. After `cancel()` the completion is gone, so no later result can
//! reach the caller.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::error::FeedResult;

/// One-shot continuation receiving the outcome of a load.
pub type Completion<T> = Box<dyn FnOnce(FeedResult<T>) + Send + 'static>;

/// Handle to an in-flight load that can be cancelled.
///
/// `cancel` is idempotent and may be called after the load completed.
pub trait Cancellable: Send + Sync {
  fn cancel(&self);
}

/// Type-erased task handle returned by cancellable loaders.
pub type TaskHandle = Box<dyn Cancellable>;

/// A load whose result is delivered to a stored completion at most once.
pub struct LoadTask<T> {
  inner: Arc<Inner<T>>,
}

struct Inner<T> {
  completion: Mutex<Option<Completion<T>>>,
  token: CancellationToken,
}

impl<T: Send + 'static> LoadTask<T> {
  /// Create a task for a result that will be supplied through [`complete`].
  ///
  /// [`complete`]: LoadTask::complete
  pub fn new(completion: Completion<T>) -> Self {
    Self {
      inner: Arc::new(Inner {
        completion: Mutex::new(Some(completion)),
        token: CancellationToken::new(),
      }),
    }
  }

  /// Run `work` on the tokio runtime and deliver its result.
  ///
  /// Cancelling the task drops `work` wherever it is suspended, which also
  /// tears down any request it owns.
  pub fn spawn<F>(work: F, completion: Completion<T>) -> Self
  where
    F: Future<Output = FeedResult<T>> + Send + 'static,
  {
    let task = Self::new(completion);
    let delivery = task.clone();
    let token = task.inner.token.clone();

    tokio::spawn(async move {
      tokio::select! {
        biased;
        _ = token.cancelled() => {}
        result = work => delivery.complete(result),
      }
    });

    task
  }

  /// Deliver `result` unless the task was cancelled or already completed.
  pub fn complete(&self, result: FeedResult<T>) {
    // Take under the lock, invoke outside it: a completion may cancel its own task.
    let completion = self.inner.completion.lock().take();
    if let Some(completion) = completion {
      completion(result);
    }
  }

  #[cfg(test)]
  pub fn is_cancelled(&self) -> bool {
    self.inner.token.is_cancelled()
  }

  pub fn into_handle(self) -> TaskHandle {
    Box::new(self)
  }
}

impl<T> Clone for LoadTask<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T: Send + 'static> Cancellable for LoadTask<T> {
  fn cancel(&self) {
    self.inner.token.cancel();
    let _dropped = self.inner.completion.lock().take();
  }
}

/// Run `work` on the tokio runtime and hand its result to `completion`.
///
/// Used by loaders whose contract has no cancellation.
pub fn deliver<T, F>(work: F, completion: Completion<T>)
where
  T: Send + 'static,
  F: Future<Output = FeedResult<T>> + Send + 'static,
{
  tokio::spawn(async move {
    completion(work.await);
  });
}

/// A completion paired with the receiving end of its single-value channel.
pub fn channel<T: Send + 'static>() -> (Completion<T>, oneshot::Receiver<FeedResult<T>>) {
  let (tx, rx) = oneshot::channel();
  let completion: Completion<T> = Box::new(move |result| {
    let _ = tx.send(result);
  });
  (completion, rx)
}
