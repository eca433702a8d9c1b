//! Encoding and decoding helpers between projection records and the plain
//! values stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width
//! and a `Z` suffix, which keeps text ordering equal to time ordering.

use chrono::{DateTime, SecondsFormat, Utc};
use offer_core::offer::{Offer, OfferStatus, StatusDates};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column order shared by every `SELECT` over `offers`.
pub const OFFER_COLUMNS: &str = "code, id, seller_id, status, new_at, sales_at, \
                                 in_order_at, sold_at, returned_to_seller_at, indexed_at";

/// Plain column values of one `offers` row.
pub struct OfferRow {
  pub code:                  String,
  pub id:                    i64,
  pub seller_id:             i64,
  pub status:                String,
  pub new_at:                Option<String>,
  pub sales_at:              Option<String>,
  pub in_order_at:           Option<String>,
  pub sold_at:               Option<String>,
  pub returned_to_seller_at: Option<String>,
  pub indexed_at:            String,
}

impl OfferRow {
  pub fn from_offer(offer: &Offer) -> Self {
    let dates = &offer.dates;
    Self {
      code:                  offer.code.clone(),
      id:                    offer.id,
      seller_id:             offer.seller_id,
      status:                offer.status.as_str().to_owned(),
      new_at:                dates.new_at.map(encode_dt),
      sales_at:              dates.sales_at.map(encode_dt),
      in_order_at:           dates.in_order_at.map(encode_dt),
      sold_at:               dates.sold_at.map(encode_dt),
      returned_to_seller_at: dates.returned_to_seller_at.map(encode_dt),
      indexed_at:            encode_dt(offer.indexed_at),
    }
  }

  /// Read a row selected with [`OFFER_COLUMNS`].
  pub fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      code:                  row.get(0)?,
      id:                    row.get(1)?,
      seller_id:             row.get(2)?,
      status:                row.get(3)?,
      new_at:                row.get(4)?,
      sales_at:              row.get(5)?,
      in_order_at:           row.get(6)?,
      sold_at:               row.get(7)?,
      returned_to_seller_at: row.get(8)?,
      indexed_at:            row.get(9)?,
    })
  }

  pub fn into_offer(self) -> Result<Offer> {
    Ok(Offer {
      id:         self.id,
      code:       self.code,
      seller_id:  self.seller_id,
      status:     self.status.parse::<OfferStatus>()?,
      dates:      StatusDates {
        new_at:                decode_opt_dt(self.new_at)?,
        sales_at:              decode_opt_dt(self.sales_at)?,
        in_order_at:           decode_opt_dt(self.in_order_at)?,
        sold_at:               decode_opt_dt(self.sold_at)?,
        returned_to_seller_at: decode_opt_dt(self.returned_to_seller_at)?,
      },
      indexed_at: decode_dt(&self.indexed_at)?,
    })
  }
}
