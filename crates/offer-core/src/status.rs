//! Status derivation, a pure, priority-ordered rule engine.
//!
//! Given one raw offer, the catalog write-view items of its batch and the
//! stock units of its batch, [`derive`] picks the offer's lifecycle status and
//! the time it entered that status. Both the full rebuild and the incremental
//! update route through this single function.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  offer::OfferStatus,
  upstream::{CatalogItem, ClosingReason, RawOffer, StockUnit},
};

/// Tunables of the "is this offer really on sale" check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRules {
  /// Currency in which the low-value threshold applies.
  pub local_currency:      String,
  /// Prices below this many whole units of `local_currency` are not
  /// considered on sale.
  pub low_price_threshold: i64,
  /// Publication flag that makes an item visible to buyers.
  pub visible_flag:        String,
}

impl Default for StatusRules {
  fn default() -> Self {
    Self {
      local_currency:      "RUB".to_owned(),
      low_price_threshold: 1000,
      visible_flag:        "visible_ios".to_owned(),
    }
  }
}

/// The outcome of [`derive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivation {
  pub status: OfferStatus,
  /// When the offer entered `status`. `None` when the deciding stock unit
  /// carries no timestamp.
  pub at:     Option<DateTime<Utc>>,
}

impl Derivation {
  fn new(status: OfferStatus, at: Option<DateTime<Utc>>) -> Self {
    Self { status, at }
  }
}

/// Facts missing for a derivation to be meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataGap {
  #[error("catalog write view has no item {0:?}")]
  MissingCatalogItem(String),
}

/// Derive `offer`'s status. The first matching rule wins:
///
/// 1. Units whose closing reason is a `duplicate-*` variant are ignored.
/// 2. The offer's own units are visited in the order given:
///    - available for purchase → `new` if the item is a draft, lacks the
///      visible flag or the price is absent/low, else `sales`; both at the
///      catalog `created_at`;
///    - closed as `sold` → `sold` at the close time;
///    - reserved → `in_order` at the reservation time;
///    - closed as `released` → `in_order` at the close time;
///    - closed as `returned-to-seller` → `returned_to_seller` at the close
///      time;
///    - closed as `lost` → `sales` at the catalog `created_at`;
///    - closed as `moved` → `new` at the catalog `created_at`;
///    - otherwise the next unit is considered.
/// 3. No unit matched → `new` at the catalog `created_at`.
///
/// An offer whose item is absent from `catalog` has no reference time and is
/// reported as a [`DataGap`].
pub fn derive(
  offer: &RawOffer,
  catalog: &HashMap<String, CatalogItem>,
  units: &[StockUnit],
  rules: &StatusRules,
) -> Result<Derivation, DataGap> {
  let item = catalog
    .get(&offer.item_code)
    .ok_or_else(|| DataGap::MissingCatalogItem(offer.item_code.clone()))?;
  let created_at = Some(item.created_at);

  let own_units = units
    .iter()
    .filter(|u| !u.version_closing_reason.as_ref().is_some_and(ClosingReason::is_duplicate))
    .filter(|u| u.offer_code == offer.offer_code);

  for unit in own_units {
    if unit.is_available_for_purchase {
      let status = if is_sellable(offer, item, rules) {
        OfferStatus::Sales
      } else {
        OfferStatus::New
      };
      return Ok(Derivation::new(status, created_at));
    }

    let reason = unit.version_closing_reason.as_ref();

    if reason == Some(&ClosingReason::Sold) {
      return Ok(Derivation::new(OfferStatus::Sold, unit.version_closed_at));
    }
    if unit.is_reserved {
      return Ok(Derivation::new(OfferStatus::InOrder, unit.reserved_at));
    }
    match reason {
      Some(ClosingReason::Released) => {
        return Ok(Derivation::new(OfferStatus::InOrder, unit.version_closed_at));
      }
      Some(ClosingReason::ReturnedToSeller) => {
        return Ok(Derivation::new(
          OfferStatus::ReturnedToSeller,
          unit.version_closed_at,
        ));
      }
      Some(ClosingReason::Lost) => {
        return Ok(Derivation::new(OfferStatus::Sales, created_at));
      }
      Some(ClosingReason::Moved) => {
        return Ok(Derivation::new(OfferStatus::New, created_at));
      }
      _ => {}
    }
  }

  Ok(Derivation::new(OfferStatus::New, created_at))
}

/// Published, visible, and priced above the low-value threshold.
fn is_sellable(offer: &RawOffer, item: &CatalogItem, rules: &StatusRules) -> bool {
  if item.is_draft || !item.has_flag(&rules.visible_flag) {
    return false;
  }
  match &offer.price {
    None => false,
    Some(price) => {
      !(price.currency_code == rules.local_currency
        && price.units < rules.low_price_threshold)
    }
  }
}
