//! The enrichment pipeline: raw offers in, projection records out.
//!
//! For one batch the enricher fetches the stock units and catalog items of
//! every offer in a single call each, reads the previously stored records,
//! derives each offer's status and merges it into the stored history.

use std::collections::HashMap;

use chrono::{DateTime, SubsecRound as _, Utc};
use offer_core::{
  offer::{Offer, StatusDates},
  query::ListRequest,
  repository::OfferRepository,
  status::{Derivation, StatusRules, derive},
  upstream::{CatalogItem, CatalogWriteSource, RawOffer, StockSource},
};
use tracing::{debug, warn};

use crate::{IndexError, Result};

/// Upper bound on stock units requested per offer of a batch.
pub const DEFAULT_UNITS_PER_OFFER: u32 = 10;

/// Joins raw offers with catalog and stock facts and the stored projection.
///
/// Holds no mutable state; one enricher may serve concurrent batches.
pub struct Enricher<W, S, R> {
  catalog:         W,
  stock:           S,
  repo:            R,
  rules:           StatusRules,
  units_per_offer: u32,
}

impl<W, S, R> Enricher<W, S, R>
where
  W: CatalogWriteSource,
  S: StockSource,
  R: OfferRepository,
{
  pub fn new(catalog: W, stock: S, repo: R, rules: StatusRules) -> Self {
    Self { catalog, stock, repo, rules, units_per_offer: DEFAULT_UNITS_PER_OFFER }
  }

  pub fn with_units_per_offer(mut self, units: u32) -> Self {
    self.units_per_offer = units.max(1);
    self
  }

  /// The repository this enricher reads prior records from. Writers use the
  /// same one.
  pub fn repository(&self) -> &R { &self.repo }

  /// Enrich `offers`, stamping the records with the current time.
  pub async fn enrich(&self, offers: &[RawOffer]) -> Result<Vec<Offer>> {
    self.enrich_at(offers, Utc::now()).await
  }

  /// Enrich `offers`, stamping the records' `indexed_at` with `now`.
  ///
  /// Offers whose item is unknown to the catalog write view are dropped with
  /// a warning. An empty input, or a batch where every offer was dropped,
  /// yields an empty result.
  pub async fn enrich_at(
    &self,
    offers: &[RawOffer],
    now: DateTime<Utc>,
  ) -> Result<Vec<Offer>> {
    if offers.is_empty() {
      return Ok(Vec::new());
    }

    let item_codes = unique(offers.iter().map(|o| &o.item_code));
    let offer_codes = unique(offers.iter().map(|o| &o.offer_code));

    let limit = u32::try_from(offer_codes.len())
      .unwrap_or(u32::MAX)
      .saturating_mul(self.units_per_offer)
      .saturating_add(1);
    let units = self
      .stock
      .list_stock_units(limit, &offer_codes)
      .await
      .map_err(IndexError::upstream("stock.list_stock_units"))?;

    let catalog: HashMap<String, CatalogItem> = self
      .catalog
      .items_by_codes(&item_codes)
      .await
      .map_err(IndexError::upstream("catalog_write.items_by_codes"))?
      .into_iter()
      .map(|item| (item.code.clone(), item))
      .collect();

    let stored: HashMap<String, Offer> = self
      .repo
      .list(&ListRequest::by_codes(&offer_codes))
      .await
      .map_err(IndexError::upstream("repository.list"))?
      .data
      .into_iter()
      .map(|offer| (offer.code.clone(), offer))
      .collect();

    let mut enriched = Vec::with_capacity(offers.len());
    for offer in offers {
      match derive(offer, &catalog, &units, &self.rules) {
        Ok(derivation) => {
          enriched.push(merge(offer, stored.get(&offer.offer_code), derivation, now));
        }
        Err(gap) => {
          warn!(
            offer_code = %offer.offer_code,
            item_code = %offer.item_code,
            "skipping offer: {gap}"
          );
        }
      }
    }

    debug!(requested = offers.len(), enriched = enriched.len(), "enriched batch");
    Ok(enriched)
  }
}

/// Build the record to write for `raw`: the prior record's slots carried
/// forward, the derived status's slot overwritten.
///
/// A derivation without a timestamp leaves the slot as it was. Timestamps are
/// truncated to whole microseconds, the precision the repository keeps, so a
/// record reads back exactly as it was merged.
pub fn merge(
  raw: &RawOffer,
  prior: Option<&Offer>,
  derivation: Derivation,
  now: DateTime<Utc>,
) -> Offer {
  let mut dates = prior.map(|p| p.dates.clone()).unwrap_or_else(StatusDates::default);
  if let Some(at) = derivation.at {
    dates.set(derivation.status, Some(at.trunc_subsecs(6)));
  }

  Offer {
    id: raw.id,
    code: raw.offer_code.clone(),
    seller_id: raw.seller_id,
    status: derivation.status,
    dates,
    indexed_at: now.trunc_subsecs(6),
  }
}

fn unique<'a>(codes: impl Iterator<Item = &'a String>) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for code in codes {
    if !out.contains(code) {
      out.push(code.clone());
    }
  }
  out
}
