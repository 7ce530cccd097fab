//! Local persistence of the feed and its image data.
//!
//! This module provides:
//! - Store contracts (`FeedStore`, `ImageDataStore`) and their SQLite and
//!   in-memory implementations
//! - The freshness policy for the cached feed
//! - Local loaders that read through the policy and write on save

mod local_feed;
mod local_image;
mod memory;
mod policy;
mod storage;
mod store;

pub use local_feed::LocalFeedLoader;
pub use local_image::LocalImageDataLoader;
pub use memory::InMemoryStore;
pub use storage::SqliteStore;
pub use store::{FeedStore, ImageDataStore, StoreError};
