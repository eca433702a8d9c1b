//! Handlers for `/offers` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/offers/list` | Body: a [`ListRequest`]; pagination required |
//! | `GET`  | `/offers/config` | Filter options for list clients |

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use offer_core::{
  offer::{Offer, OfferStatus},
  query::{ListRequest, PaginationInfo, Sort, SortDirection},
  repository::OfferRepository,
  upstream::{OfferSource, RawOffer},
};
use offer_indexer::{Reindex, ReservedEventHandler};
use serde::Serialize;
use tracing::warn;

use crate::{AppState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// The projected status of a listed offer.
#[derive(Debug, Serialize)]
pub struct StatusView {
  pub code:  OfferStatus,
  pub title: &'static str,
  /// When the offer entered its current status.
  pub date:  Option<DateTime<Utc>>,
}

impl From<&Offer> for StatusView {
  fn from(offer: &Offer) -> Self {
    Self { code: offer.status, title: offer.status.title(), date: offer.status_date() }
  }
}

/// A live offer joined with its projected status.
#[derive(Debug, Serialize)]
pub struct ListedOffer {
  #[serde(flatten)]
  pub offer:  RawOffer,
  pub status: StatusView,
}

#[derive(Debug, Serialize)]
pub struct ListMeta {
  pub sort:       Option<Sort>,
  pub pagination: PaginationInfo,
}

#[derive(Debug, Serialize)]
pub struct ListOffersResponse {
  pub data: Vec<ListedOffer>,
  pub meta: ListMeta,
}

/// `POST /offers/list`
///
/// A lone single-value `status` filter sorts by that status's timestamp,
/// newest first, whatever sort the client asked for.
pub async fn list<R, O, I, H>(
  State(state): State<AppState<R, O, I, H>>,
  Json(mut request): Json<ListRequest>,
) -> Result<Json<ListOffersResponse>, ApiError>
where
  R: OfferRepository,
  O: OfferSource,
  I: Reindex,
  H: ReservedEventHandler,
{
  let pagination = request
    .pagination
    .ok_or_else(|| ApiError::BadRequest("pagination is required".into()))?;
  if pagination.per_page < 1 {
    return Err(ApiError::BadRequest("per_page must be at least 1".into()));
  }
  if pagination.page < 1 {
    return Err(ApiError::BadRequest("page must be at least 1".into()));
  }

  if let Some(value) = request.sole_text_value("status") {
    let status: OfferStatus =
      value.parse().map_err(|e: offer_core::Error| ApiError::BadRequest(e.to_string()))?;
    request.sort =
      Some(Sort { field: status.date_field().to_owned(), direction: SortDirection::Desc });
  }

  let page = state.repo.list(&request).await.map_err(ApiError::store)?;
  if page.data.is_empty() {
    return Err(ApiError::NotFound("no offers match the request".into()));
  }

  let codes: Vec<String> = page.data.iter().map(|o| o.code.clone()).collect();
  let mut live = state
    .offers
    .offers_by_codes(&codes)
    .await
    .map_err(ApiError::upstream)?;

  let mut data = Vec::with_capacity(page.data.len());
  for projected in &page.data {
    match live.iter().position(|o| o.offer_code == projected.code) {
      Some(i) => data.push(ListedOffer {
        offer:  live.swap_remove(i),
        status: StatusView::from(projected),
      }),
      None => warn!(offer_code = %projected.code, "projected offer unknown upstream"),
    }
  }

  Ok(Json(ListOffersResponse {
    data,
    meta: ListMeta {
      sort:       request.sort,
      pagination: PaginationInfo::new(pagination, page.total),
    },
  }))
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FilterOption {
  pub value: &'static str,
  pub title: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FilterConfig {
  pub field:   &'static str,
  #[serde(rename = "type")]
  pub kind:    &'static str,
  pub options: Vec<FilterOption>,
}

#[derive(Debug, Serialize)]
pub struct ListConfig {
  pub filters: Vec<FilterConfig>,
}

/// `GET /offers/config`
pub async fn config() -> Json<ListConfig> {
  let options = OfferStatus::ALL
    .into_iter()
    .map(|s| FilterOption { value: s.as_str(), title: s.title() })
    .collect();

  Json(ListConfig {
    filters: vec![FilterConfig { field: "status", kind: "text_in", options }],
  })
}
