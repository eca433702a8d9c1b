//! Handler for `POST /admin/index`, the on-demand full rebuild.

use axum::{Json, extract::State};
use offer_core::{repository::OfferRepository, upstream::OfferSource};
use offer_indexer::{Reindex, ReservedEventHandler};
use serde::Serialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct IndexResponse {
  pub indexed:    usize,
  pub elapsed_ms: u64,
}

/// `POST /admin/index`. Runs to completion; 409 while another rebuild is in
/// progress.
pub async fn index<R, O, I, H>(
  State(state): State<AppState<R, O, I, H>>,
) -> Result<Json<IndexResponse>, ApiError>
where
  R: OfferRepository,
  O: OfferSource,
  I: Reindex,
  H: ReservedEventHandler,
{
  let result = state.indexer.reindex(&state.shutdown).await?;
  Ok(Json(IndexResponse {
    indexed:    result.indexed,
    elapsed_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
  }))
}
