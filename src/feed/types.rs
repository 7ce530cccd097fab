use chrono::{DateTime, Utc};
use std::sync::Arc;
use url::Url;

/// One entry of the image feed.
///
/// The url doubles as the lookup key for the image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedImage {
  pub url: Url,
  pub created: DateTime<Utc>,
  pub updated: DateTime<Utc>,
}

impl FeedImage {
  pub fn new(url: Url, created: DateTime<Utc>, updated: DateTime<Utc>) -> Self {
    Self {
      url,
      created,
      updated,
    }
  }
}

/// Source of "now" for anything that compares against stored timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Clock backed by the system time.
pub fn system_clock() -> Clock {
  Arc::new(Utc::now)
}

/// Clock frozen at a fixed instant.
#[cfg(test)]
pub fn fixed_clock(now: DateTime<Utc>) -> Clock {
  Arc::new(move || now)
}
