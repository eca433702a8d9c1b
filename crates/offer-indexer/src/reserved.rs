//! Incremental update on a "stock unit reserved" event.
//!
//! The handler waits for the upstreams to settle, then re-derives the single
//! affected offer through the same [`Enricher`] the full rebuild uses. Failed
//! attempts are retried under a [`RetryPolicy`]; once it is exhausted the
//! failure is logged and the event is dropped. A missed event self-heals on
//! the next full rebuild.

use std::{future::Future, time::Duration};

use backoff::backoff::Backoff as _;
use offer_core::{
  repository::OfferRepository,
  upstream::{CatalogWriteSource, OfferSource, StockSource},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument as _, error, info, info_span, warn};

use crate::{Enricher, IndexError, Result, RetryPolicy};

/// A stock unit of `offer_code` has been reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUnitReserved {
  pub offer_code: String,
}

/// What became of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
  /// The offer was re-derived; the count is the records written, zero when
  /// the offer was dropped for missing facts.
  Indexed(usize),
  /// The offer service does not know the code.
  NotFound,
  /// Every attempt failed.
  Exhausted,
  Cancelled,
}

pub struct StockReservedHandler<O, W, S, R> {
  offers:   O,
  enricher: Enricher<W, S, R>,
  delay:    Duration,
  retry:    RetryPolicy,
}

impl<O, W, S, R> StockReservedHandler<O, W, S, R>
where
  O: OfferSource,
  W: CatalogWriteSource,
  S: StockSource,
  R: OfferRepository,
{
  /// `delay` is the settle time before the first attempt.
  pub fn new(
    offers: O,
    enricher: Enricher<W, S, R>,
    delay: Duration,
    retry: RetryPolicy,
  ) -> Self {
    Self { offers, enricher, delay, retry }
  }

  /// Handle one event to completion. Never fails: the outcome is logged and
  /// returned for inspection.
  pub async fn handle(
    &self,
    event: &StockUnitReserved,
    cancel: &CancellationToken,
  ) -> HandleOutcome {
    let span = info_span!("stock_reserved", offer_code = %event.offer_code);
    self.retrying(&event.offer_code, cancel).instrument(span).await
  }

  async fn retrying(&self, offer_code: &str, cancel: &CancellationToken) -> HandleOutcome {
    if !self.pause(self.delay, cancel).await {
      return HandleOutcome::Cancelled;
    }

    let mut backoff = self.retry.backoff();
    let mut attempt = 1;
    loop {
      let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return HandleOutcome::Cancelled,
        result = self.process(offer_code) => result,
      };
      match result {
        Ok(outcome) => return outcome,
        Err(e) if !self.retry.should_retry(attempt) => {
          error!(attempt, error = %e, "giving up on reserved event");
          return HandleOutcome::Exhausted;
        }
        Err(e) => {
          let Some(wait) = backoff.next_backoff() else {
            error!(attempt, error = %e, "backoff exhausted, giving up on reserved event");
            return HandleOutcome::Exhausted;
          };
          warn!(attempt, backoff = ?wait, error = %e, "reserved event failed, retrying");
          if !self.pause(wait, cancel).await {
            return HandleOutcome::Cancelled;
          }
          attempt += 1;
        }
      }
    }
  }

  /// Sleep for `d`; `false` when cancelled first.
  async fn pause(&self, d: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
      return false;
    }
    if d.is_zero() {
      return true;
    }
    tokio::select! {
      biased;
      _ = cancel.cancelled() => false,
      _ = tokio::time::sleep(d) => true,
    }
  }

  /// One attempt: fetch the offer, enrich it, write it.
  pub async fn process(&self, offer_code: &str) -> Result<HandleOutcome> {
    let codes = [offer_code.to_owned()];
    let raw = self
      .offers
      .offers_by_codes(&codes)
      .await
      .map_err(IndexError::upstream("offers.offers_by_codes"))?;
    if raw.is_empty() {
      info!("offer not found upstream");
      return Ok(HandleOutcome::NotFound);
    }

    let enriched = self.enricher.enrich(&raw).await?;
    if !enriched.is_empty() {
      self
        .enricher
        .repository()
        .upsert(&enriched)
        .await
        .map_err(IndexError::upstream("repository.upsert"))?;
    }
    info!(written = enriched.len(), "offer re-indexed");
    Ok(HandleOutcome::Indexed(enriched.len()))
  }
}

/// Anything that can take a reserved event off the caller's hands.
pub trait ReservedEventHandler: Send + Sync {
  fn on_reserved<'a>(
    &'a self,
    event: &'a StockUnitReserved,
    cancel: &'a CancellationToken,
  ) -> impl Future<Output = HandleOutcome> + Send + 'a;
}

impl<O, W, S, R> ReservedEventHandler for StockReservedHandler<O, W, S, R>
where
  O: OfferSource,
  W: CatalogWriteSource,
  S: StockSource,
  R: OfferRepository,
{
  async fn on_reserved(
    &self,
    event: &StockUnitReserved,
    cancel: &CancellationToken,
  ) -> HandleOutcome {
    self.handle(event, cancel).await
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone as _, Utc};
  use offer_core::{
    offer::OfferStatus,
    status::StatusRules,
    upstream::StockUnit,
  };

  use super::*;
  use crate::fakes::{FakeCatalog, FakeOffers, FakeRepo, FakeStock, catalog_for};

  type TestHandler = StockReservedHandler<FakeOffers, FakeCatalog, FakeStock, FakeRepo>;

  fn handler(offers: &FakeOffers, repo: &FakeRepo, attempts: u32) -> TestHandler {
    let reserved_at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
    let stock = FakeStock::with(vec![StockUnit {
      offer_code: "O1".into(),
      is_reserved: true,
      reserved_at: Some(reserved_at),
      ..Default::default()
    }]);
    handler_with_stock(offers, repo, stock, attempts)
  }

  fn handler_with_stock(
    offers: &FakeOffers,
    repo: &FakeRepo,
    stock: FakeStock,
    attempts: u32,
  ) -> TestHandler {
    let created = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let enricher = Enricher::new(
      catalog_for(&offers.all(), created),
      stock,
      repo.clone(),
      StatusRules::default(),
    );
    StockReservedHandler::new(
      offers.clone(),
      enricher,
      Duration::ZERO,
      RetryPolicy::immediate(attempts),
    )
  }

  fn event(code: &str) -> StockUnitReserved { StockUnitReserved { offer_code: code.into() } }

  #[tokio::test]
  async fn reserved_offer_moves_to_in_order() {
    let offers = FakeOffers::population(2);
    let repo = FakeRepo::default();
    let h = handler(&offers, &repo, 3);

    let outcome = h.handle(&event("O1"), &CancellationToken::new()).await;
    assert_eq!(outcome, HandleOutcome::Indexed(1));

    let stored = repo.get("O1").unwrap();
    assert_eq!(stored.status, OfferStatus::InOrder);
    assert_eq!(stored.dates.in_order_at, Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()));
    assert!(repo.get("O2").is_none());
  }

  #[tokio::test]
  async fn unknown_offer_is_a_no_op() {
    let offers = FakeOffers::population(1);
    let repo = FakeRepo::default();
    let h = handler(&offers, &repo, 3);

    let outcome = h.handle(&event("O-unknown"), &CancellationToken::new()).await;
    assert_eq!(outcome, HandleOutcome::NotFound);
    assert_eq!(repo.len(), 0);
    assert_eq!(offers.by_code_calls(), 1);
  }

  #[tokio::test]
  async fn transient_failures_are_retried() {
    let offers = FakeOffers::population(1);
    let repo = FakeRepo::default();
    let h = handler(&offers, &repo, 5);

    offers.fail_next(2);
    let outcome = h.handle(&event("O1"), &CancellationToken::new()).await;
    assert_eq!(outcome, HandleOutcome::Indexed(1));
    assert_eq!(offers.by_code_calls(), 3);
  }

  #[tokio::test]
  async fn exhausted_retries_drop_the_event() {
    let offers = FakeOffers::population(1);
    let repo = FakeRepo::default();
    let h = handler(&offers, &repo, 3);

    offers.fail_next(10);
    let outcome = h.handle(&event("O1"), &CancellationToken::new()).await;
    assert_eq!(outcome, HandleOutcome::Exhausted);
    assert_eq!(offers.by_code_calls(), 3);
    assert_eq!(repo.len(), 0);
  }

  #[tokio::test]
  async fn repository_failure_is_retried_too() {
    let offers = FakeOffers::population(1);
    let repo = FakeRepo::default();
    let h = handler(&offers, &repo, 2);

    repo.fail_upserts(1);
    let outcome = h.on_reserved(&event("O1"), &CancellationToken::new()).await;
    assert_eq!(outcome, HandleOutcome::Indexed(1));
    assert_eq!(offers.by_code_calls(), 2);
  }

  #[tokio::test]
  async fn cancellation_interrupts_the_settle_delay() {
    let offers = FakeOffers::population(1);
    let repo = FakeRepo::default();
    let mut h = handler(&offers, &repo, 3);
    h.delay = Duration::from_secs(3600);

    let cancel = CancellationToken::new();
    let task = {
      let cancel = cancel.clone();
      async move { h.handle(&event("O1"), &cancel).await }
    };
    let (outcome, ()) = tokio::join!(task, async { cancel.cancel() });
    assert_eq!(outcome, HandleOutcome::Cancelled);
    assert_eq!(offers.by_code_calls(), 0);
  }

  #[tokio::test]
  async fn cancellation_interrupts_a_hung_attempt() {
    let offers = FakeOffers::population(1);
    let repo = FakeRepo::default();
    let stock = FakeStock::default();
    stock.hang();
    let h = handler_with_stock(&offers, &repo, stock.clone(), 3);

    let cancel = CancellationToken::new();
    let trigger = {
      let cancel = cancel.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
      }
    };
    let ev = event("O1");
    let handled = tokio::time::timeout(Duration::from_secs(2), h.handle(&ev, &cancel));
    let (outcome, ()) = tokio::join!(handled, trigger);

    assert_eq!(outcome.expect("handler ignored cancellation"), HandleOutcome::Cancelled);
    assert_eq!(stock.calls(), 1);
    assert_eq!(repo.len(), 0);
  }

  #[tokio::test]
  async fn retry_waits_follow_the_policy() {
    let offers = FakeOffers::population(1);
    let repo = FakeRepo::default();
    let mut h = handler(&offers, &repo, 3);
    h.retry = RetryPolicy::new(3)
      .with_intervals(Duration::from_millis(20), Duration::from_millis(40))
      .with_randomization(0.0);

    offers.fail_next(2);
    let started = tokio::time::Instant::now();
    let outcome = h.handle(&event("O1"), &CancellationToken::new()).await;
    assert_eq!(outcome, HandleOutcome::Indexed(1));
    assert_eq!(offers.by_code_calls(), 3);
    assert!(started.elapsed() >= Duration::from_millis(60), "elapsed: {:?}", started.elapsed());
  }
}
