use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable overriding `api.feed_url`.
pub const FEED_URL_ENV: &str = "PIXFEED_FEED_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub bundle: BundleConfig,
  /// Directory for log files (defaults to $XDG_DATA_HOME/pixfeed/logs)
  pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub feed_url: Url,
  /// Where to fetch a one-time upload url from; uploads are disabled without it
  pub upload_endpoint_url: Option<Url>,
  pub app_id: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Persist the feed and images between runs
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Database location (defaults to $XDG_DATA_HOME/pixfeed/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
    }
  }
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundleConfig {
  /// Directory holding the bundled `<name>.jpeg` images
  pub dir: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pixfeed.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pixfeed/config.yaml
  ///
  /// `PIXFEED_FEED_URL` overrides the configured feed url.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/pixfeed/config.yaml"
        ))
      }
    };

    config.with_feed_url_override(std::env::var(FEED_URL_ENV).ok())
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("pixfeed.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pixfeed").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    Ok(serde_yaml::from_str(contents)?)
  }

  fn with_feed_url_override(mut self, feed_url: Option<String>) -> Result<Self> {
    if let Some(raw) = feed_url {
      self.api.feed_url =
        Url::parse(&raw).map_err(|e| eyre!("Invalid {} '{}': {}", FEED_URL_ENV, raw, e))?;
    }
    Ok(self)
  }

  /// Directory for log files.
  pub fn log_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.log_dir {
      return Ok(dir.clone());
    }
    Ok(data_dir()?.join("pixfeed").join("logs"))
  }
}

fn data_dir() -> Result<PathBuf> {
  dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))
}
