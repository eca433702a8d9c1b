//! Facts owned by the upstream systems of record, and the traits their
//! clients implement.
//!
//! Three domains feed the projection: pricing/ownership (raw offers), the
//! catalog write view (draft/publication state of items), and stock (the
//! inventory units attached to an offer). The indexer depends on these traits,
//! never on a concrete transport.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Pricing / ownership ─────────────────────────────────────────────────────

/// A price in whole currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
  pub currency_code: String,
  pub units:         i64,
}

/// An offer as reported by the pricing/ownership service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOffer {
  pub id:         i64,
  pub offer_code: String,
  /// Join key into the catalog.
  pub item_code:  String,
  pub seller_id:  i64,
  pub price:      Option<Money>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferSortField {
  #[default]
  Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
  Asc,
  #[default]
  Desc,
}

/// Inclusive price bounds in whole units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFilter {
  pub currency_code: Option<String>,
  pub min_units:     Option<i64>,
  pub max_units:     Option<i64>,
}

/// Parameters for a paged scan of the offer population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSearch {
  pub limit:     u32,
  pub offset:    u32,
  pub sort:      OfferSortField,
  pub direction: SortDirection,
  pub price:     Option<PriceFilter>,
}

impl OfferSearch {
  /// The `page`-th (1-based) page of `per_page` offers, newest id first.
  pub fn page(page: u32, per_page: u32) -> Self {
    Self {
      limit:     per_page,
      offset:    page.saturating_sub(1).saturating_mul(per_page),
      sort:      OfferSortField::Id,
      direction: SortDirection::Desc,
      price:     None,
    }
  }
}

pub trait OfferSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Page through all offers.
  fn search_offers<'a>(
    &'a self,
    search: &'a OfferSearch,
  ) -> impl Future<Output = Result<Vec<RawOffer>, Self::Error>> + Send + 'a;

  /// Fetch specific offers by code. Unknown codes are simply absent from the
  /// result.
  fn offers_by_codes<'a>(
    &'a self,
    offer_codes: &'a [String],
  ) -> impl Future<Output = Result<Vec<RawOffer>, Self::Error>> + Send + 'a;
}

// ─── Catalog (write view) ────────────────────────────────────────────────────

/// An item as held by the catalog's write-optimised view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
  pub code:              String,
  pub is_draft:          bool,
  #[serde(default)]
  pub publication_flags: Vec<String>,
  /// Fallback reference time for statuses that carry no event time of their
  /// own.
  pub created_at:        DateTime<Utc>,
}

impl CatalogItem {
  pub fn has_flag(&self, flag: &str) -> bool {
    self.publication_flags.iter().any(|f| f == flag)
  }
}

pub trait CatalogWriteSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn items_by_codes<'a>(
    &'a self,
    item_codes: &'a [String],
  ) -> impl Future<Output = Result<Vec<CatalogItem>, Self::Error>> + Send + 'a;
}

// ─── Stock ───────────────────────────────────────────────────────────────────

/// Why a stock unit version was closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClosingReason {
  Released,
  Sold,
  ReturnedToSeller,
  Lost,
  Moved,
  /// Any `duplicate-*` reason; such units are bookkeeping noise.
  Duplicate(String),
  Other(String),
}

impl ClosingReason {
  pub fn as_str(&self) -> &str {
    match self {
      ClosingReason::Released => "released",
      ClosingReason::Sold => "sold",
      ClosingReason::ReturnedToSeller => "returned-to-seller",
      ClosingReason::Lost => "lost",
      ClosingReason::Moved => "moved",
      ClosingReason::Duplicate(s) | ClosingReason::Other(s) => s,
    }
  }

  pub fn is_duplicate(&self) -> bool {
    matches!(self, ClosingReason::Duplicate(_))
  }
}

impl From<String> for ClosingReason {
  fn from(s: String) -> Self {
    match s.as_str() {
      "released" => ClosingReason::Released,
      "sold" => ClosingReason::Sold,
      "returned-to-seller" => ClosingReason::ReturnedToSeller,
      "lost" => ClosingReason::Lost,
      "moved" => ClosingReason::Moved,
      _ if s.contains("duplicate") => ClosingReason::Duplicate(s),
      _ => ClosingReason::Other(s),
    }
  }
}

impl From<&str> for ClosingReason {
  fn from(s: &str) -> Self { ClosingReason::from(s.to_owned()) }
}

impl From<ClosingReason> for String {
  fn from(r: ClosingReason) -> Self { r.as_str().to_owned() }
}

/// An inventory unit attached to an offer. An offer may own several units
/// over its history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUnit {
  pub offer_code:                String,
  #[serde(default)]
  pub is_available_for_purchase: bool,
  #[serde(default)]
  pub is_reserved:               bool,
  pub reserved_at:               Option<DateTime<Utc>>,
  pub version_closing_reason:    Option<ClosingReason>,
  pub version_closed_at:         Option<DateTime<Utc>>,
}

pub trait StockSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// List at most `limit` units belonging to any of `offer_codes`.
  fn list_stock_units<'a>(
    &'a self,
    limit: u32,
    offer_codes: &'a [String],
  ) -> impl Future<Output = Result<Vec<StockUnit>, Self::Error>> + Send + 'a;
}
