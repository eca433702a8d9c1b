//! Handler for `POST /events/stock-unit-reserved`.
//!
//! The event is handed to the incremental update handler on a background
//! task; the request is answered before processing starts.

use axum::{Json, extract::State, http::StatusCode};
use offer_core::{repository::OfferRepository, upstream::OfferSource};
use offer_indexer::{Reindex, ReservedEventHandler, StockUnitReserved};
use tracing::debug;

use crate::{AppState, error::ApiError};

/// `POST /events/stock-unit-reserved`, body: `{"offer_code":"..."}`
pub async fn stock_unit_reserved<R, O, I, H>(
  State(state): State<AppState<R, O, I, H>>,
  Json(event): Json<StockUnitReserved>,
) -> Result<StatusCode, ApiError>
where
  R: OfferRepository,
  O: OfferSource,
  I: Reindex,
  H: ReservedEventHandler + 'static,
{
  if event.offer_code.trim().is_empty() {
    return Err(ApiError::BadRequest("offer_code must not be empty".into()));
  }

  debug!(offer_code = %event.offer_code, "reserved event accepted");
  let handler = state.events.clone();
  let cancel = state.shutdown.clone();
  tokio::spawn(async move {
    handler.on_reserved(&event, &cancel).await;
  });

  Ok(StatusCode::ACCEPTED)
}
