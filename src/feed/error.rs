use thiserror::Error;

use crate::cache::StoreError;

/// Errors a caller of the loading pipeline can observe.
///
/// Cancellation is not an error: a cancelled load never completes.
#[derive(Debug, Error)]
pub enum FeedError {
  #[error("server unreachable")]
  Connectivity,
  #[error("unexpected response from server")]
  InvalidData,
  #[error("no cached data for key")]
  NotFound,
  #[error("cache storage failed")]
  StoreFailed(#[source] StoreError),
  #[error("upload rejected with HTTP {0}")]
  UploadRejected(u16),
}

impl From<StoreError> for FeedError {
  fn from(error: StoreError) -> Self {
    Self::StoreFailed(error)
  }
}

pub type FeedResult<T> = Result<T, FeedError>;
