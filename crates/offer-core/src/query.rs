//! Structured list requests against the projection.
//!
//! A [`ListRequest`] is a storage-neutral description of filters, an optional
//! sort and pagination. Backends hand it to a [`QueryTranslator`] to obtain a
//! storage-native query; the translator is an opaque collaborator as far as
//! the rest of the system is concerned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::upstream::SortDirection;

// ─── Filters ─────────────────────────────────────────────────────────────────

/// The operator and value-set of one field filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterOp {
  /// Field equals any of the given strings.
  TextIn { values: Vec<String> },
  /// Field equals any of the given integers.
  NumberIn { values: Vec<i64> },
  /// Field lies within the (inclusive) bounds; either side may be open.
  DateRange {
    from: Option<DateTime<Utc>>,
    to:   Option<DateTime<Utc>>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
  pub field: String,
  #[serde(flatten)]
  pub op:    FilterOp,
}

impl FieldFilter {
  pub fn text_in(field: impl Into<String>, values: Vec<String>) -> Self {
    Self { field: field.into(), op: FilterOp::TextIn { values } }
  }
}

// ─── Sort and pagination ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
  pub field:     String,
  #[serde(default)]
  pub direction: SortDirection,
}

/// 1-based page of `per_page` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
  pub page:     u32,
  pub per_page: u32,
}

impl Pagination {
  /// Number of rows that precede this page.
  pub fn offset(&self) -> u64 {
    u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
  }
}

// ─── Request / response ──────────────────────────────────────────────────────

/// A filter group (all filters must match), an optional single sort, and
/// optional pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
  #[serde(default)]
  pub filters:    Vec<FieldFilter>,
  pub sort:       Option<Sort>,
  pub pagination: Option<Pagination>,
}

impl ListRequest {
  /// Rows whose `code` is any of `codes`, all on one page.
  pub fn by_codes(codes: &[String]) -> Self {
    Self {
      filters:    vec![FieldFilter::text_in("code", codes.to_vec())],
      sort:       None,
      pagination: Some(Pagination {
        page:     1,
        per_page: u32::try_from(codes.len().max(1)).unwrap_or(u32::MAX),
      }),
    }
  }

  /// The single value of a lone `text_in` filter on `field`, if that is all
  /// the filter group contains.
  pub fn sole_text_value(&self, field: &str) -> Option<&str> {
    match self.filters.as_slice() {
      [FieldFilter { field: f, op: FilterOp::TextIn { values } }] if f == field => {
        match values.as_slice() {
          [value] => Some(value.as_str()),
          _ => None,
        }
      }
      _ => None,
    }
  }
}

/// One page of results and the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse<T> {
  pub total: u64,
  pub data:  Vec<T>,
}

impl<T> Default for ListResponse<T> {
  fn default() -> Self { Self { total: 0, data: Vec::new() } }
}

/// Pagination metadata echoed back to list clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
  pub page:       u32,
  pub per_page:   u32,
  pub total:      u64,
  pub page_count: u64,
}

impl PaginationInfo {
  /// Clamp the requested page to the last existing one.
  pub fn new(requested: Pagination, total: u64) -> Self {
    let per_page = u64::from(requested.per_page.max(1));
    let page_count = total.div_ceil(per_page);
    let page = u64::from(requested.page).min(page_count);
    Self {
      page: u32::try_from(page).unwrap_or(u32::MAX),
      per_page: requested.per_page,
      total,
      page_count,
    }
  }
}

// ─── Translator ──────────────────────────────────────────────────────────────

/// Turns a [`ListRequest`] into a storage-native query.
///
/// Translators only express the first page of a result set; callers apply any
/// offset themselves (see the backend's `list` implementation).
pub trait QueryTranslator: Send + Sync {
  type Query;

  fn translate(&self, request: &ListRequest) -> crate::Result<Self::Query>;
}
