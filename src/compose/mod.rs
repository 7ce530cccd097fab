//! Composites and decorators that turn the individual tiers into one
//! resilient pipeline.

mod cache_decorator;
mod dispatch;
mod fallback;
mod pipeline;

pub use dispatch::SerialContext;
pub use pipeline::{Pipeline, Sources, UploadTarget};
