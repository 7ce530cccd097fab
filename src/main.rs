mod bundled;
mod cache;
mod compose;
mod config;
mod feed;
mod logging;
mod remote;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use bundled::{BundledSource, DirectoryBundle, EmptyBundle};
use cache::{InMemoryStore, SqliteStore};
use compose::{Pipeline, SerialContext, Sources, UploadTarget};
use config::Config;
use feed::{channel, system_clock, FeedLoaderExt, ImageDataLoaderExt};
use remote::{HttpClient, OfflineClient, ReqwestClient};

#[derive(Parser, Debug)]
#[command(name = "pixfeed")]
#[command(about = "An image feed that keeps working offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pixfeed/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Never touch the network; serve from the cache and bundle only
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the feed
  Feed {
    /// Also load every image, warming the cache
    #[arg(long)]
    prefetch: bool,
  },
  /// Load the bytes of one image
  Image {
    url: Url,
    /// Write the image here instead of printing its size
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Drop the cached feed if it has expired
  Validate,
  /// Upload an edited image
  Upload {
    file: PathBuf,
    /// Url of the feed image the upload was derived from
    #[arg(long)]
    original: Url,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log_dir()?)?;

  let main_context = SerialContext::spawn("pixfeed-main")?;
  let pipeline = compose(&config, args.offline, &main_context)?;

  let validation = validate_cache(&pipeline).await;
  if let Err(error) = &validation {
    warn!(%error, "cache validation failed");
  }

  match args.command {
    Command::Feed { prefetch } => print_feed(&pipeline, prefetch).await,
    Command::Image { url, output } => load_image(&pipeline, &url, output).await,
    Command::Validate => {
      validation?;
      println!("Cache validated");
      Ok(())
    }
    Command::Upload { file, original } => upload(&pipeline, &file, &original).await,
  }
}

fn compose(config: &Config, offline: bool, main: &Arc<SerialContext>) -> Result<Pipeline> {
  let client: Arc<dyn HttpClient> = if offline {
    Arc::new(OfflineClient)
  } else {
    Arc::new(ReqwestClient::new(config.api.timeout())?)
  };

  let bundle: Arc<dyn BundledSource> = match &config.bundle.dir {
    Some(dir) => Arc::new(DirectoryBundle::new(dir)),
    None => Arc::new(EmptyBundle),
  };

  let upload = config
    .api
    .upload_endpoint_url
    .clone()
    .map(|endpoint_url| UploadTarget {
      endpoint_url,
      app_id: config.api.app_id.clone(),
    });

  let feed_url = config.api.feed_url.clone();

  if !config.cache.enabled {
    info!("cache disabled, nothing will persist");
    return Ok(Pipeline::compose(
      Sources {
        store: Arc::new(InMemoryStore::new()),
        client,
        bundle,
        feed_url,
        upload,
        current_date: system_clock(),
      },
      main,
    ));
  }

  let path = match &config.cache.path {
    Some(path) => path.clone(),
    None => SqliteStore::default_path()?,
  };
  info!(path = %path.display(), "opening cache");

  Ok(Pipeline::compose(
    Sources {
      store: Arc::new(SqliteStore::open(&path)?),
      client,
      bundle,
      feed_url,
      upload,
      current_date: system_clock(),
    },
    main,
  ))
}

async fn validate_cache(pipeline: &Pipeline) -> Result<()> {
  let (completion, rx) = channel();
  pipeline.validate_cache(completion);
  rx.await
    .map_err(|_| eyre!("Cache validation result was dropped"))?
    .map_err(|e| eyre!("Cache validation failed: {}", e))
}

async fn print_feed(pipeline: &Pipeline, prefetch: bool) -> Result<()> {
  let feed = pipeline
    .feed_loader()
    .load_feed()
    .await
    .ok_or_else(|| eyre!("Feed load was dropped"))??;

  if feed.is_empty() {
    println!("Feed is empty");
    return Ok(());
  }

  for image in &feed {
    println!(
      "{}  created {}  updated {}",
      image.url,
      image.created.format("%Y-%m-%d %H:%M"),
      image.updated.format("%Y-%m-%d %H:%M")
    );
  }

  if prefetch {
    let images = pipeline.image_loader();
    let (_tasks, loads): (Vec<_>, Vec<_>) = feed
      .iter()
      .map(|image| images.load_data(&image.url))
      .unzip();
    let results = futures::future::join_all(loads).await;

    let loaded = results
      .iter()
      .filter(|result| matches!(result, Some(Ok(_))))
      .count();
    println!("Prefetched {}/{} images", loaded, feed.len());
  }

  Ok(())
}

async fn load_image(pipeline: &Pipeline, url: &Url, output: Option<PathBuf>) -> Result<()> {
  let (_task, load) = pipeline.image_loader().load_data(url);
  let data: Bytes = load
    .await
    .ok_or_else(|| eyre!("Image load was dropped"))??;

  match output {
    Some(path) => {
      std::fs::write(&path, &data)
        .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
      println!("Wrote {} bytes to {}", data.len(), path.display());
    }
    None => println!("{}: {} bytes", url, data.len()),
  }
  Ok(())
}

async fn upload(pipeline: &Pipeline, file: &Path, original: &Url) -> Result<()> {
  let (endpoint_loader, uploader) = pipeline
    .endpoint_loader()
    .zip(pipeline.uploader())
    .ok_or_else(|| eyre!("Uploads are disabled. Set api.upload_endpoint_url in the config."))?;

  let data = std::fs::read(file).map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;

  let (completion, rx) = channel();
  endpoint_loader.load(completion);
  let endpoint = rx
    .await
    .map_err(|_| eyre!("Upload endpoint request was dropped"))??;

  let (completion, rx) = channel();
  uploader.upload_image_data(Bytes::from(data), &endpoint.url, original, completion);
  rx.await.map_err(|_| eyre!("Upload was dropped"))??;

  println!("Uploaded {} to {}", file.display(), endpoint.url);
  Ok(())
}
