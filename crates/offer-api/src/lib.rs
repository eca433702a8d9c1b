//! JSON REST API over the offer projection.
//!
//! Exposes an axum [`Router`] backed by an [`OfferRepository`], the live
//! [`OfferSource`], a [`Reindex`] implementation for on-demand rebuilds and a
//! [`ReservedEventHandler`] for inbound stock events. Auth, TLS and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", offer_api::api_router(state))
//! ```

pub mod admin;
pub mod error;
pub mod events;
pub mod offers;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use offer_core::{repository::OfferRepository, upstream::OfferSource};
use offer_indexer::{Reindex, ReservedEventHandler};
use tokio_util::sync::CancellationToken;

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<R, O, I, H> {
  pub repo:     Arc<R>,
  pub offers:   Arc<O>,
  pub indexer:  Arc<I>,
  pub events:   Arc<H>,
  /// Cancelled on shutdown; rebuilds and event handling observe it.
  pub shutdown: CancellationToken,
}

// Not derived: the derive would demand `Clone` of every type parameter.
impl<R, O, I, H> Clone for AppState<R, O, I, H> {
  fn clone(&self) -> Self {
    Self {
      repo:     self.repo.clone(),
      offers:   self.offers.clone(),
      indexer:  self.indexer.clone(),
      events:   self.events.clone(),
      shutdown: self.shutdown.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<R, O, I, H>(state: AppState<R, O, I, H>) -> Router<()>
where
  R: OfferRepository + 'static,
  O: OfferSource + 'static,
  I: Reindex + 'static,
  H: ReservedEventHandler + 'static,
{
  Router::new()
    // Offers
    .route("/offers/list", post(offers::list::<R, O, I, H>))
    .route("/offers/config", get(offers::config))
    // Administration
    .route("/admin/index", post(admin::index::<R, O, I, H>))
    // Inbound events
    .route(
      "/events/stock-unit-reserved",
      post(events::stock_unit_reserved::<R, O, I, H>),
    )
    .with_state(state)
}
