//! Full rebuild of the projection.
//!
//! [`Indexer::index`] pages through the whole offer population, newest id
//! first, and pushes every page through the [`Enricher`] into the
//! repository. A process-wide flag keeps rebuilds single-flight: a trigger
//! that arrives while one is running is refused with
//! [`IndexError::AlreadyRunning`], never queued.

use std::{
  future::Future,
  sync::atomic::{AtomicBool, Ordering},
  time::{Duration, Instant},
};

use offer_core::{
  repository::OfferRepository,
  upstream::{CatalogWriteSource, OfferSearch, OfferSource, RawOffer, StockSource},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument as _, debug, error, info, info_span};
use uuid::Uuid;

use crate::{Enricher, IndexError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerConfig {
  /// Offers requested per upstream page.
  pub per_page:   u32,
  /// Pause before every page fetch, to spare the upstream.
  pub page_delay: Duration,
}

impl Default for IndexerConfig {
  fn default() -> Self { Self { per_page: 50, page_delay: Duration::ZERO } }
}

/// Outcome of a completed rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexingResult {
  /// Records written; offers dropped for missing facts are not counted.
  pub indexed: usize,
  pub elapsed: Duration,
}

// ─── Single-flight guard ─────────────────────────────────────────────────────

/// Clears the running flag when dropped, whether the rebuild finished,
/// failed or was cancelled.
struct RunGuard<'a> {
  flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
  fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
    flag
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .ok()
      .map(|_| Self { flag })
  }
}

impl Drop for RunGuard<'_> {
  fn drop(&mut self) { self.flag.store(false, Ordering::SeqCst); }
}

// ─── Indexer ─────────────────────────────────────────────────────────────────

pub struct Indexer<O, W, S, R> {
  offers:   O,
  enricher: Enricher<W, S, R>,
  config:   IndexerConfig,
  running:  AtomicBool,
}

impl<O, W, S, R> Indexer<O, W, S, R>
where
  O: OfferSource,
  W: CatalogWriteSource,
  S: StockSource,
  R: OfferRepository,
{
  pub fn new(offers: O, enricher: Enricher<W, S, R>, config: IndexerConfig) -> Self {
    Self { offers, enricher, config, running: AtomicBool::new(false) }
  }

  pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

  /// Run one full rebuild.
  ///
  /// Pages are processed strictly in sequence. The first failing page aborts
  /// the run; pages written before it stay written. Cancelling `cancel`
  /// stops the run at the next page boundary or pending fetch.
  pub async fn index(&self, cancel: &CancellationToken) -> Result<IndexingResult> {
    let Some(_guard) = RunGuard::try_acquire(&self.running) else {
      info!("rebuild requested while another is running");
      return Err(IndexError::AlreadyRunning);
    };

    let span = info_span!("index", run_id = %Uuid::new_v4());
    let outcome = self.run(cancel).instrument(span.clone()).await;
    if let Err(e) = &outcome {
      span.in_scope(|| error!(error = %e, "rebuild aborted"));
    }
    outcome
  }

  async fn run(&self, cancel: &CancellationToken) -> Result<IndexingResult> {
    let started = Instant::now();
    let per_page = self.config.per_page.max(1);
    let mut page = 1u32;
    let mut indexed = 0usize;

    info!(per_page, "rebuild started");

    loop {
      if !self.config.page_delay.is_zero() {
        tokio::select! {
          biased;
          _ = cancel.cancelled() => return Err(IndexError::Cancelled),
          _ = tokio::time::sleep(self.config.page_delay) => {}
        }
      }

      let search = OfferSearch::page(page, per_page);
      let raw = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(IndexError::Cancelled),
        res = self.offers.search_offers(&search) => {
          res.map_err(IndexError::upstream("offers.search_offers"))?
        }
      };
      let fetched = raw.len();

      let written = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(IndexError::Cancelled),
        res = self.write_page(&raw) => res?,
      };
      indexed += written;
      debug!(page, fetched, written, "page indexed");

      // A short page is the last one. A population that is an exact
      // multiple of `per_page` costs one extra, empty fetch.
      if fetched < per_page as usize {
        break;
      }
      page += 1;
    }

    let result = IndexingResult { indexed, elapsed: started.elapsed() };
    info!(
      indexed,
      pages = page,
      elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
      "rebuild finished"
    );
    Ok(result)
  }

  /// Enrich one fetched page and write it; returns the records written.
  async fn write_page(&self, raw: &[RawOffer]) -> Result<usize> {
    let enriched = self.enricher.enrich(raw).await?;
    if !enriched.is_empty() {
      self
        .enricher
        .repository()
        .upsert(&enriched)
        .await
        .map_err(IndexError::upstream("repository.upsert"))?;
    }
    Ok(enriched.len())
  }
}

/// Anything that can run a full rebuild on demand.
pub trait Reindex: Send + Sync {
  fn reindex<'a>(
    &'a self,
    cancel: &'a CancellationToken,
  ) -> impl Future<Output = Result<IndexingResult>> + Send + 'a;
}

impl<O, W, S, R> Reindex for Indexer<O, W, S, R>
where
  O: OfferSource,
  W: CatalogWriteSource,
  S: StockSource,
  R: OfferRepository,
{
  async fn reindex(&self, cancel: &CancellationToken) -> Result<IndexingResult> {
    self.index(cancel).await
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use chrono::{TimeZone as _, Utc};
  use offer_core::{
    query::ListRequest,
    status::StatusRules,
    upstream::RawOffer,
  };
  use offer_store_sqlite::SqliteOfferRepository;

  use super::*;
  use crate::fakes::{FakeCatalog, FakeOffers, FakeRepo, FakeStock, catalog_for};

  type TestIndexer = Indexer<FakeOffers, FakeCatalog, FakeStock, FakeRepo>;

  fn config(per_page: u32) -> IndexerConfig {
    IndexerConfig { per_page, ..Default::default() }
  }

  fn indexer(offers: &FakeOffers, repo: &FakeRepo, per_page: u32) -> TestIndexer {
    let created = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let enricher = Enricher::new(
      catalog_for(&offers.all(), created),
      FakeStock::default(),
      repo.clone(),
      StatusRules::default(),
    );
    Indexer::new(offers.clone(), enricher, config(per_page))
  }

  #[tokio::test]
  async fn stops_after_the_first_short_page() {
    let offers = FakeOffers::population(100);
    let repo = FakeRepo::default();
    let ix = indexer(&offers, &repo, 50);

    let result = ix.index(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.indexed, 100);
    // 50 + 50 + an empty page.
    assert_eq!(offers.searches(), vec![(50, 0), (50, 50), (50, 100)]);
    assert_eq!(repo.len(), 100);
  }

  #[tokio::test]
  async fn partial_last_page_ends_the_run() {
    let offers = FakeOffers::population(120);
    let repo = FakeRepo::default();
    let ix = indexer(&offers, &repo, 50);

    let result = ix.index(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.indexed, 120);
    assert_eq!(offers.searches().len(), 3);
    assert_eq!(repo.upserts(), 3);
  }

  #[tokio::test]
  async fn empty_population_fetches_once() {
    let offers = FakeOffers::population(0);
    let repo = FakeRepo::default();
    let ix = indexer(&offers, &repo, 50);

    let result = ix.index(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.indexed, 0);
    assert_eq!(offers.searches().len(), 1);
    assert_eq!(repo.upserts(), 0);
  }

  #[tokio::test]
  async fn dropped_offers_are_not_counted() {
    let offers = FakeOffers::population(4);
    let repo = FakeRepo::default();
    let created = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let known: Vec<RawOffer> = offers.all().into_iter().filter(|o| o.id % 2 == 0).collect();
    let enricher = Enricher::new(
      catalog_for(&known, created),
      FakeStock::default(),
      repo.clone(),
      StatusRules::default(),
    );
    let ix = Indexer::new(offers.clone(), enricher, config(10));

    let result = ix.index(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.indexed, 2);
    assert!(repo.get("O2").is_some());
    assert!(repo.get("O1").is_none());
  }

  #[tokio::test]
  async fn concurrent_trigger_is_refused() {
    let offers = FakeOffers::population(3);
    let repo = FakeRepo::default();
    let ix = Arc::new(indexer(&offers, &repo, 50));

    let hold = offers.hold().await;
    let first = tokio::spawn({
      let ix = ix.clone();
      async move { ix.index(&CancellationToken::new()).await }
    });
    offers.entered().await;

    assert!(ix.is_running());
    let second = ix.index(&CancellationToken::new()).await;
    assert!(matches!(second, Err(IndexError::AlreadyRunning)));

    drop(hold);
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.indexed, 3);
    assert!(!ix.is_running());

    // Once the first run is over, a new one is accepted.
    assert!(ix.index(&CancellationToken::new()).await.is_ok());
  }

  #[tokio::test]
  async fn failure_aborts_and_releases_the_flag() {
    let offers = FakeOffers::population(5);
    let repo = FakeRepo::default();
    let ix = indexer(&offers, &repo, 50);

    offers.fail_next(1);
    let err = ix.index(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, IndexError::Upstream { stage: "offers.search_offers", .. }));
    assert!(!ix.is_running());
    assert_eq!(repo.len(), 0);

    let ok = ix.index(&CancellationToken::new()).await.unwrap();
    assert_eq!(ok.indexed, 5);
  }

  #[tokio::test]
  async fn repository_failure_aborts_the_run() {
    let offers = FakeOffers::population(5);
    let repo = FakeRepo::default();
    let ix = indexer(&offers, &repo, 2);

    repo.fail_upserts(1);
    let err = ix.index(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, IndexError::Upstream { stage: "repository.upsert", .. }));
    assert_eq!(offers.searches().len(), 1);
  }

  #[tokio::test]
  async fn cancelled_run_stops_and_releases_the_flag() {
    let offers = FakeOffers::population(5);
    let repo = FakeRepo::default();
    let ix = indexer(&offers, &repo, 2);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = ix.index(&cancel).await.unwrap_err();
    assert!(matches!(err, IndexError::Cancelled));
    assert!(offers.searches().is_empty());
    assert!(!ix.is_running());
  }

  #[tokio::test]
  async fn cancellation_interrupts_a_hung_page() {
    let offers = FakeOffers::population(3);
    let repo = FakeRepo::default();
    let stock = FakeStock::default();
    stock.hang();
    let created = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let enricher = Enricher::new(
      catalog_for(&offers.all(), created),
      stock.clone(),
      repo.clone(),
      StatusRules::default(),
    );
    let ix = Indexer::new(offers.clone(), enricher, config(50));

    let cancel = CancellationToken::new();
    tokio::spawn({
      let cancel = cancel.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
      }
    });

    let outcome = tokio::time::timeout(Duration::from_secs(2), ix.index(&cancel))
      .await
      .expect("rebuild ignored cancellation");
    assert!(matches!(outcome, Err(IndexError::Cancelled)));
    assert_eq!(stock.calls(), 1);
    assert_eq!(repo.len(), 0);
    assert!(!ix.is_running());
  }

  #[tokio::test]
  async fn reindex_writes_into_sqlite() {
    let offers = FakeOffers::population(7);
    let repo = SqliteOfferRepository::open_in_memory().await.unwrap();
    let created = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let enricher = Enricher::new(
      catalog_for(&offers.all(), created),
      FakeStock::default(),
      repo.clone(),
      StatusRules::default(),
    );
    let ix = Indexer::new(offers.clone(), enricher, config(3));

    let result = ix.reindex(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.indexed, 7);
    assert_eq!(offers.searches().len(), 3);

    let listed = repo.list(&ListRequest::default()).await.unwrap();
    assert_eq!(listed.total, 7);
    assert_eq!(listed.data[0].code, "O7");
  }
}
