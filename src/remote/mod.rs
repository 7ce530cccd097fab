//! Network tier: loaders backed by the feed API.

mod api_types;
mod client;
mod feed_loader;
mod image_loader;
#[cfg(test)]
pub mod testing;
mod upload;

pub use api_types::UploadEndpoint;
pub use client::{HttpClient, OfflineClient, ReqwestClient};
pub use feed_loader::RemoteFeedLoader;
pub use image_loader::RemoteImageDataLoader;
pub use upload::{EndpointLoader, ImageUploader, RemoteEndpointLoader, RemoteImageUploader};
