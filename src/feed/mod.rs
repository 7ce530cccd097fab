//! Domain types and capability contracts of the loading pipeline.
//!
//! Loaders deliver their outcome to a one-shot [`Completion`]. Image loads
//! additionally return a [`TaskHandle`] whose `cancel()` guarantees that the
//! completion is never invoked afterwards.

mod error;
mod loader;
mod task;
mod types;

pub use error::{FeedError, FeedResult};
pub use loader::{
  FeedCache, FeedLoader, FeedLoaderExt, ImageDataCache, ImageDataLoader, ImageDataLoaderExt,
};
#[cfg(test)]
pub use loader::{FeedCacheExt, ImageDataCacheExt};
pub use task::{channel, deliver, Cancellable, Completion, LoadTask, TaskHandle};
#[cfg(test)]
pub use types::fixed_clock;
pub use types::{system_clock, Clock, FeedImage};
