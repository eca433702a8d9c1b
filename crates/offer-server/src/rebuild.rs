//! Periodic full rebuild.

use std::{sync::Arc, time::Duration};

use offer_indexer::{IndexError, Reindex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Rebuild every `every` until `shutdown` is cancelled. The first rebuild
/// starts immediately. A tick that finds a rebuild already running (e.g. one
/// triggered through the API) is skipped.
pub async fn run_loop<I: Reindex>(indexer: Arc<I>, every: Duration, shutdown: CancellationToken) {
  let mut ticker = tokio::time::interval(every);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      biased;
      _ = shutdown.cancelled() => break,
      _ = ticker.tick() => {}
    }

    match indexer.reindex(&shutdown).await {
      Ok(result) => info!(indexed = result.indexed, "scheduled rebuild done"),
      Err(IndexError::AlreadyRunning) => info!("scheduled rebuild skipped, one is running"),
      Err(IndexError::Cancelled) => break,
      // The next tick starts over.
      Err(e) => warn!(error = %e, "scheduled rebuild failed"),
    }
  }

  info!("rebuild loop stopped");
}
