//! Wiring of the tiers into the loaders the application uses.

use std::sync::Arc;
use tracing::info;
use url::Url;

use super::cache_decorator::{FeedLoaderCacheDecorator, ImageDataLoaderCacheDecorator};
use super::dispatch::{MainQueueDispatchDecorator, SerialContext};
use super::fallback::FallbackComposite;
use crate::bundled::{BundledFeedLoader, BundledImageDataLoader, BundledSource};
use crate::cache::{FeedStore, ImageDataStore, LocalFeedLoader, LocalImageDataLoader};
use crate::feed::{Clock, Completion, FeedError, FeedImage, FeedLoader, ImageDataLoader};
use crate::remote::{
  EndpointLoader, HttpClient, ImageUploader, RemoteEndpointLoader, RemoteFeedLoader,
  RemoteImageDataLoader, RemoteImageUploader,
};

/// Turns an empty feed into `NotFound`, so a fallback gets its turn.
struct NonEmpty<L: ?Sized>(Arc<L>);

impl<L: FeedLoader + ?Sized> FeedLoader for NonEmpty<L> {
  fn load(&self, completion: Completion<Vec<FeedImage>>) {
    self.0.load(Box::new(move |result| match result {
      Ok(feed) if feed.is_empty() => completion(Err(FeedError::NotFound)),
      other => completion(other),
    }));
  }
}

/// Where and as whom edited images are uploaded.
#[derive(Debug, Clone)]
pub struct UploadTarget {
  pub endpoint_url: Url,
  pub app_id: String,
}

/// Everything the pipeline is built from.
pub struct Sources<S, C: ?Sized, B: ?Sized> {
  pub store: Arc<S>,
  pub client: Arc<C>,
  pub bundle: Arc<B>,
  pub feed_url: Url,
  pub upload: Option<UploadTarget>,
  pub current_date: Clock,
}

/// The composed loaders. Every completion is delivered on the main context.
pub struct Pipeline {
  feed: Arc<dyn FeedLoader>,
  images: Arc<dyn ImageDataLoader>,
  endpoint: Option<Arc<dyn EndpointLoader>>,
  uploader: Option<Arc<dyn ImageUploader>>,
  validator: MainQueueDispatchDecorator<LocalFeedLoader<dyn FeedStore>>,
}

impl Pipeline {
  pub fn compose<S, C, B>(sources: Sources<S, C, B>, main: &Arc<SerialContext>) -> Self
  where
    S: FeedStore + ImageDataStore + 'static,
    C: HttpClient + ?Sized + 'static,
    B: BundledSource + ?Sized + 'static,
  {
    let Sources {
      store,
      client,
      bundle,
      feed_url,
      upload,
      current_date,
    } = sources;

    let feed_store: Arc<dyn FeedStore> = store.clone();
    let local_feed = Arc::new(LocalFeedLoader::new(feed_store, current_date.clone()));
    let remote_feed = Arc::new(RemoteFeedLoader::new(feed_url, Arc::clone(&client)));
    let bundled_feed = Arc::new(BundledFeedLoader::new(Arc::clone(&bundle), current_date));

    let feed = FallbackComposite::new(
      Arc::new(FallbackComposite::new(
        Arc::new(FeedLoaderCacheDecorator::new(
          remote_feed,
          Arc::clone(&local_feed),
        )),
        Arc::new(NonEmpty(Arc::clone(&local_feed))),
      )),
      bundled_feed,
    );

    let local_images = Arc::new(LocalImageDataLoader::new(store));
    let remote_images = Arc::new(RemoteImageDataLoader::new(Arc::clone(&client)));
    let bundled_images = Arc::new(BundledImageDataLoader::new(bundle));

    let images = FallbackComposite::new(
      Arc::new(FallbackComposite::new(
        bundled_images,
        Arc::clone(&local_images),
      )),
      Arc::new(ImageDataLoaderCacheDecorator::new(
        remote_images,
        local_images,
      )),
    );

    let (endpoint, uploader) = match upload {
      Some(target) => {
        let endpoint: Arc<dyn EndpointLoader> = Arc::new(MainQueueDispatchDecorator::new(
          Arc::new(RemoteEndpointLoader::new(
            target.endpoint_url,
            Arc::clone(&client),
          )),
          main,
        ));
        let uploader: Arc<dyn ImageUploader> = Arc::new(MainQueueDispatchDecorator::new(
          Arc::new(RemoteImageUploader::new(target.app_id, client)),
          main,
        ));
        (Some(endpoint), Some(uploader))
      }
      None => (None, None),
    };

    info!(upload = endpoint.is_some(), "loading pipeline composed");

    Self {
      feed: Arc::new(MainQueueDispatchDecorator::new(Arc::new(feed), main)),
      images: Arc::new(MainQueueDispatchDecorator::new(Arc::new(images), main)),
      endpoint,
      uploader,
      validator: MainQueueDispatchDecorator::new(local_feed, main),
    }
  }

  pub fn feed_loader(&self) -> Arc<dyn FeedLoader> {
    Arc::clone(&self.feed)
  }

  pub fn image_loader(&self) -> Arc<dyn ImageDataLoader> {
    Arc::clone(&self.images)
  }

  /// `None` when no upload endpoint is configured.
  pub fn endpoint_loader(&self) -> Option<Arc<dyn EndpointLoader>> {
    self.endpoint.clone()
  }

  pub fn uploader(&self) -> Option<Arc<dyn ImageUploader>> {
    self.uploader.clone()
  }

  /// Delete the cached feed if it is expired or unreadable.
  pub fn validate_cache(&self, completion: Completion<()>) {
    self.validator.validate_cache(completion);
  }
}
