//! The offer projection record: the unit of storage and the API payload.
//!
//! A record carries the offer's current status plus one timestamp slot per
//! status. Only the slot of the current status is rewritten on enrichment;
//! the remaining slots are history carried forward from the stored record.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

// ─── Status ──────────────────────────────────────────────────────────────────

/// The derived lifecycle stage of an offer.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
  #[default]
  New,
  Sales,
  InOrder,
  Sold,
  ReturnedToSeller,
}

impl OfferStatus {
  /// Every status, in lifecycle order.
  pub const ALL: [OfferStatus; 5] = [
    OfferStatus::New,
    OfferStatus::Sales,
    OfferStatus::InOrder,
    OfferStatus::Sold,
    OfferStatus::ReturnedToSeller,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      OfferStatus::New => "new",
      OfferStatus::Sales => "sales",
      OfferStatus::InOrder => "in_order",
      OfferStatus::Sold => "sold",
      OfferStatus::ReturnedToSeller => "returned_to_seller",
    }
  }

  /// Human-readable label shown by list clients.
  pub fn title(self) -> &'static str {
    match self {
      OfferStatus::New => "New",
      OfferStatus::Sales => "On sale",
      OfferStatus::InOrder => "In order",
      OfferStatus::Sold => "Sold",
      OfferStatus::ReturnedToSeller => "Returned to seller",
    }
  }

  /// Name of the projection field holding this status's timestamp slot.
  pub fn date_field(self) -> &'static str {
    match self {
      OfferStatus::New => "new_at",
      OfferStatus::Sales => "sales_at",
      OfferStatus::InOrder => "in_order_at",
      OfferStatus::Sold => "sold_at",
      OfferStatus::ReturnedToSeller => "returned_to_seller_at",
    }
  }
}

impl fmt::Display for OfferStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OfferStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    OfferStatus::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| Error::UnknownStatus(s.to_owned()))
  }
}

// ─── Timestamp slots ─────────────────────────────────────────────────────────

/// When the offer most recently entered each status. `None` means the offer
/// has never been observed in that status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDates {
  pub new_at:                Option<DateTime<Utc>>,
  pub sales_at:              Option<DateTime<Utc>>,
  pub in_order_at:           Option<DateTime<Utc>>,
  pub sold_at:               Option<DateTime<Utc>>,
  pub returned_to_seller_at: Option<DateTime<Utc>>,
}

impl StatusDates {
  pub fn get(&self, status: OfferStatus) -> Option<DateTime<Utc>> {
    match status {
      OfferStatus::New => self.new_at,
      OfferStatus::Sales => self.sales_at,
      OfferStatus::InOrder => self.in_order_at,
      OfferStatus::Sold => self.sold_at,
      OfferStatus::ReturnedToSeller => self.returned_to_seller_at,
    }
  }

  /// Overwrite the slot for `status`, leaving every other slot untouched.
  pub fn set(&mut self, status: OfferStatus, at: Option<DateTime<Utc>>) {
    let slot = match status {
      OfferStatus::New => &mut self.new_at,
      OfferStatus::Sales => &mut self.sales_at,
      OfferStatus::InOrder => &mut self.in_order_at,
      OfferStatus::Sold => &mut self.sold_at,
      OfferStatus::ReturnedToSeller => &mut self.returned_to_seller_at,
    };
    *slot = at;
  }
}

// ─── Projection record ───────────────────────────────────────────────────────

/// The denormalised, searchable projection of one offer. Keyed by `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
  pub id:         i64,
  /// Natural key; upserts are addressed by this code.
  pub code:       String,
  pub seller_id:  i64,
  pub status:     OfferStatus,
  #[serde(flatten)]
  pub dates:      StatusDates,
  /// Wall-clock time of the enrichment run that produced this record.
  pub indexed_at: DateTime<Utc>,
}

impl Offer {
  /// Timestamp of the authoritative slot, i.e. when the offer entered its
  /// current status.
  pub fn status_date(&self) -> Option<DateTime<Utc>> {
    self.dates.get(self.status)
  }
}
