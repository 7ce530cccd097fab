//! Serde-deserializable types matching the feed API responses, and the
//! mappers turning them into domain types.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use url::Url;

use super::client::HttpResponse;
use crate::feed::{FeedError, FeedImage, FeedResult};

const OK_200: u16 = 200;

/// Date layout used by the feed API, e.g. `Feb 28, 2022 5:05:43 PM`.
const API_DATE_FORMAT: &str = "%b %d, %Y %I:%M:%S %p";

#[derive(Debug, Deserialize)]
pub struct ApiFeedImage {
  pub url: Url,
  pub created: String,
  pub updated: String,
}

impl ApiFeedImage {
  fn into_model(self) -> FeedResult<FeedImage> {
    Ok(FeedImage::new(
      self.url,
      parse_api_date(&self.created)?,
      parse_api_date(&self.updated)?,
    ))
  }
}

/// Upload destination handed out by the endpoint API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadEndpoint {
  pub url: Url,
}

/// Map a feed response to feed images.
///
/// Succeeds only for a 200 response whose body is a well-formed feed.
pub fn map_feed(response: &HttpResponse) -> FeedResult<Vec<FeedImage>> {
  if response.status != OK_200 {
    return Err(FeedError::InvalidData);
  }

  let items: Vec<ApiFeedImage> =
    serde_json::from_slice(&response.body).map_err(|_| FeedError::InvalidData)?;

  items.into_iter().map(ApiFeedImage::into_model).collect()
}

/// Map an upload endpoint response.
pub fn map_endpoint(response: &HttpResponse) -> FeedResult<UploadEndpoint> {
  if response.status != OK_200 {
    return Err(FeedError::InvalidData);
  }
  serde_json::from_slice(&response.body).map_err(|_| FeedError::InvalidData)
}

fn parse_api_date(s: &str) -> FeedResult<DateTime<Utc>> {
  NaiveDateTime::parse_from_str(s.trim(), API_DATE_FORMAT)
    .map(|dt| dt.and_utc())
    .map_err(|_| FeedError::InvalidData)
}
