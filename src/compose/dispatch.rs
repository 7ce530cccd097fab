use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tokio::runtime::Handle;
use tracing::debug;
use url::Url;

use crate::cache::{FeedStore, LocalFeedLoader};
use crate::feed::{
  Cancellable, Completion, FeedImage, FeedLoader, ImageDataLoader, LoadTask, TaskHandle,
};
use crate::remote::{EndpointLoader, ImageUploader, UploadEndpoint};

type Job = Box<dyn FnOnce() + Send>;

/// A named thread running jobs one at a time in submission order.
///
/// The thread exits once the last reference to the context is dropped and
/// its queue drains. When spawned from within a tokio runtime, jobs run inside
/// that runtime, so they can start loads of their own.
pub struct SerialContext {
  jobs: mpsc::Sender<Job>,
  thread: ThreadId,
}

impl SerialContext {
  pub fn spawn(name: &str) -> Result<Arc<Self>> {
    let (jobs, queue) = mpsc::channel::<Job>();
    let runtime = Handle::try_current().ok();
    let handle = thread::Builder::new()
      .name(name.to_string())
      .spawn(move || {
        let _runtime = runtime.as_ref().map(Handle::enter);
        for job in queue {
          job();
        }
      })
      .map_err(|e| eyre!("Failed to start {} context: {}", name, e))?;

    Ok(Arc::new(Self {
      jobs,
      thread: handle.thread().id(),
    }))
  }

  pub fn is_current(&self) -> bool {
    thread::current().id() == self.thread
  }

  /// Run `job` on this context: inline when already on it, queued otherwise.
  pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
    if self.is_current() {
      job();
    } else if self.jobs.send(Box::new(job)).is_err() {
      debug!("serial context stopped, job dropped");
    }
  }
}

/// Redelivers every completion of the wrapped capability on a [`SerialContext`].
///
/// Holds the context weakly: a delivery arriving after the context is gone is
/// dropped.
pub struct MainQueueDispatchDecorator<T: ?Sized> {
  decoratee: Arc<T>,
  context: Weak<SerialContext>,
}

impl<T: ?Sized> MainQueueDispatchDecorator<T> {
  pub fn new(decoratee: Arc<T>, context: &Arc<SerialContext>) -> Self {
    Self {
      decoratee,
      context: Arc::downgrade(context),
    }
  }

  /// Wrap `completion` so it runs on the context.
  pub fn dispatch<V: Send + 'static>(&self, completion: Completion<V>) -> Completion<V> {
    let context = self.context.clone();
    Box::new(move |result| match context.upgrade() {
      Some(context) => context.dispatch(move || completion(result)),
      None => debug!("serial context gone, delivery dropped"),
    })
  }
}

impl<T: FeedLoader + ?Sized> FeedLoader for MainQueueDispatchDecorator<T> {
  fn load(&self, completion: Completion<Vec<FeedImage>>) {
    self.decoratee.load(self.dispatch(completion));
  }
}

/// Cancelling clears the caller's completion, which is checked again on the
/// context right before it would run.
struct DispatchedTask {
  delivery: LoadTask<Bytes>,
  inner: TaskHandle,
}

impl Cancellable for DispatchedTask {
  fn cancel(&self) {
    self.delivery.cancel();
    self.inner.cancel();
  }
}

impl<T: ImageDataLoader + ?Sized> ImageDataLoader for MainQueueDispatchDecorator<T> {
  fn load_image_data(&self, url: &Url, completion: Completion<Bytes>) -> TaskHandle {
    let delivery = LoadTask::new(completion);
    let on_context = delivery.clone();
    let inner = self.decoratee.load_image_data(
      url,
      self.dispatch(Box::new(move |result| on_context.complete(result))),
    );
    Box::new(DispatchedTask { delivery, inner })
  }
}

impl<T: EndpointLoader + ?Sized> EndpointLoader for MainQueueDispatchDecorator<T> {
  fn load(&self, completion: Completion<UploadEndpoint>) {
    self.decoratee.load(self.dispatch(completion));
  }
}

impl<T: ImageUploader + ?Sized> ImageUploader for MainQueueDispatchDecorator<T> {
  fn upload_image_data(&self, data: Bytes, to: &Url, original: &Url, completion: Completion<()>) {
    self
      .decoratee
      .upload_image_data(data, to, original, self.dispatch(completion));
  }
}

impl<S: FeedStore + ?Sized + 'static> MainQueueDispatchDecorator<LocalFeedLoader<S>> {
  pub fn validate_cache(&self, completion: Completion<()>) {
    self.decoratee.validate_cache(self.dispatch(completion));
  }
}
