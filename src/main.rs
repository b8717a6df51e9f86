use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use movie_offline::cache::{CacheSource, SqliteCacheStore};
use movie_offline::clients::{ClientRegistry, StdoutClient};
use movie_offline::config::Config;
use movie_offline::lookup::MovieCatalog;
use movie_offline::network::{HttpNetwork, Request};
use movie_offline::queue::{QueueStore, SqliteQueueStore};
use movie_offline::sync::{SyncOutcome, SYNC_TAG};
use movie_offline::worker::{EventOutcome, ServiceWorker, WorkerEvent};

#[derive(Parser, Debug)]
#[command(name = "movie-offline")]
#[command(about = "Offline cache and replayable lookup queue for the movie app")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/movie-offline/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Pre-fetch the asset manifest into the cache and activate this version
  Install,
  /// Answer a request cache-first, falling back to the network
  Fetch {
    url: String,
    #[arg(short, long, default_value = "GET")]
    method: String,
  },
  /// Queue a movie lookup for the next sync
  Enqueue { subject: String },
  /// List pending lookups
  Queue,
  /// Deliver a replay trigger; results are printed as JSON lines
  Sync {
    /// Tag to send (default: sync-movie-queue)
    #[arg(short, long)]
    tag: Option<String>,
  },
  /// Resolve a subject directly without queueing it
  Resolve { subject: String },
}

type Worker = ServiceWorker<SqliteCacheStore, HttpNetwork, SqliteQueueStore, MovieCatalog>;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let data_dir = config.data_dir()?;
  let _guard = init_logging(&data_dir)?;

  let clients = Arc::new(ClientRegistry::new());
  let queue = Arc::new(SqliteQueueStore::open(&config.queue_db_path()?)?);

  match args.command {
    Command::Install => {
      let worker = build_worker(&config, queue, clients)?;
      let (installed, activated) = worker.install_and_activate().await?;
      println!(
        "installed {} asset(s) into {}",
        installed.assets, installed.namespace
      );
      if let Some(activated) = activated {
        for removed in &activated.removed_namespaces {
          println!("removed superseded cache {}", removed);
        }
        println!("{} is active", activated.namespace);
      }
    }
    Command::Fetch { url, method } => {
      let worker = build_worker(&config, queue, clients)?;
      let outcome = worker
        .dispatch(WorkerEvent::Fetch(Request::new(&method, url)))
        .await?;
      if let EventOutcome::Responded(result) = outcome {
        let source = match result.source {
          CacheSource::Cache => "cache",
          CacheSource::Network => "network",
        };
        eprintln!("{} {} (from {})", method, result.data.status, source);
        println!("{}", String::from_utf8_lossy(&result.data.body));
      }
    }
    Command::Enqueue { subject } => {
      let item = queue.enqueue(&subject)?;
      println!("queued #{}: {}", item.id, item.subject);
    }
    Command::Queue => {
      for item in queue.drain_all()? {
        println!("#{}\t{}", item.id, item.subject);
      }
    }
    Command::Sync { tag } => {
      clients.connect(Arc::new(StdoutClient::new("stdout")))?;
      let tag = tag.unwrap_or_else(|| SYNC_TAG.to_string());
      let worker = build_worker(&config, queue, clients)?;
      match worker.dispatch(WorkerEvent::Sync { tag }).await? {
        EventOutcome::Synced(SyncOutcome::Ignored) => eprintln!("tag not handled, nothing to do"),
        EventOutcome::Synced(SyncOutcome::Flushed(report)) => {
          eprintln!("flushed {} item(s)", report.items)
        }
        _ => {}
      }
    }
    Command::Resolve { subject } => {
      let record = MovieCatalog::lookup(&subject);
      println!("{}", serde_json::to_string_pretty(&record)?);
    }
  }

  Ok(())
}

fn build_worker(
  config: &Config,
  queue: Arc<SqliteQueueStore>,
  clients: Arc<ClientRegistry>,
) -> Result<Worker> {
  let cache = Arc::new(SqliteCacheStore::open(&config.cache_db_path()?)?);
  let network = Arc::new(HttpNetwork::new()?);

  Ok(ServiceWorker::new(
    config.worker_options()?,
    cache,
    network,
    queue,
    Arc::new(MovieCatalog),
    clients,
  ))
}

/// Log to a daily file in the data directory; stdout carries client output.
fn init_logging(data_dir: &Path) -> Result<WorkerGuard> {
  let appender = RollingFileAppender::builder()
    .rotation(Rotation::DAILY)
    .filename_prefix("movie-offline")
    .filename_suffix("log")
    .build(data_dir.join("logs"))?;
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter =
    EnvFilter::try_from_env("MOVIE_OFFLINE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
