//! offer-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite projection, connects to the upstream services and serves the JSON
//! API over HTTP. With `indexer.rebuild_interval_secs` set, a full rebuild
//! also runs in the background on that interval.

mod clients;
mod rebuild;
mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use offer_api::AppState;
use offer_indexer::{Enricher, Indexer, StockReservedHandler};
use offer_store_sqlite::SqliteOfferRepository;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Offer projection server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Run one full rebuild and exit instead of serving.
  #[arg(long)]
  index_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(cli.config)?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteOfferRepository::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let (offers, catalog, stock) = clients::connect(&cfg.upstream)?;
  let enricher = || {
    Enricher::new(catalog.clone(), stock.clone(), store.clone(), cfg.status.clone())
  };

  let indexer = Arc::new(Indexer::new(
    offers.clone(),
    enricher(),
    cfg.indexer.indexer_config(),
  ));
  let shutdown = CancellationToken::new();

  if cli.index_once {
    let result = indexer
      .index(&shutdown)
      .await
      .context("rebuild failed")?;
    tracing::info!(indexed = result.indexed, "rebuild complete");
    return Ok(());
  }

  let events = Arc::new(StockReservedHandler::new(
    offers.clone(),
    enricher(),
    cfg.events.delay(),
    cfg.events.retry_policy(),
  ));

  let rebuild_loop = cfg.indexer.rebuild_interval().map(|every| {
    tokio::spawn(rebuild::run_loop(indexer.clone(), every, shutdown.clone()))
  });

  let state = AppState {
    repo: Arc::new(store.clone()),
    offers: Arc::new(offers),
    indexer,
    events,
    shutdown: shutdown.clone(),
  };

  let app = Router::new()
    .nest("/api", offer_api::api_router(state))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await
    .context("server error")?;

  shutdown.cancel();
  if let Some(handle) = rebuild_loop {
    handle.await.context("rebuild loop panicked")?;
  }

  Ok(())
}

/// Resolves on Ctrl-C, cancelling `shutdown` so background work stops too.
async fn shutdown_signal(shutdown: CancellationToken) {
  match tokio::signal::ctrl_c().await {
    Ok(()) => tracing::info!("shutting down"),
    Err(e) => {
      tracing::error!(error = %e, "failed to listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  }
  shutdown.cancel();
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
