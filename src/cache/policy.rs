use chrono::{DateTime, Duration, Utc};

/// How long a saved feed stays usable.
const MAX_CACHE_AGE_DAYS: i64 = 7;

/// Freshness rule for the cached feed snapshot.
pub struct FeedCachePolicy;

impl FeedCachePolicy {
  fn max_cache_age() -> Duration {
    Duration::days(MAX_CACHE_AGE_DAYS)
  }

  /// Whether a snapshot saved at `timestamp` is still valid at `now`.
  ///
  /// Compares elapsed time, not calendar dates.
  pub fn validate(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - timestamp < Self::max_cache_age()
  }
}
