//! The `OfferRepository` trait: the search store holding the projection.
//!
//! The trait is implemented by storage backends (e.g. `offer-store-sqlite`).
//! The indexer and the API depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  offer::Offer,
  query::{ListRequest, ListResponse},
};

/// Key-addressed document store for [`Offer`] projection records.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait OfferRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert or replace every record, keyed by [`Offer::code`].
  ///
  /// Each record write is idempotent and last-write-wins; a batch is applied
  /// as one self-contained unit.
  fn upsert<'a>(
    &'a self,
    offers: &'a [Offer],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Return the total match count and the requested page of records.
  fn list<'a>(
    &'a self,
    request: &'a ListRequest,
  ) -> impl Future<Output = Result<ListResponse<Offer>, Self::Error>> + Send + 'a;
}
