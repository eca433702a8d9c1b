//! Keeps the offer projection fresh.
//!
//! - [`enrich::Enricher`] joins raw offers with catalog and stock facts,
//!   derives each offer's status and merges it into the stored record.
//! - [`indexer::Indexer`] drives a full, paged rebuild through the enricher;
//!   at most one rebuild runs at a time.
//! - [`reserved::StockReservedHandler`] re-indexes a single offer when its
//!   stock is reserved, with bounded retry.

#![allow(async_fn_in_trait)]

pub mod enrich;
pub mod error;
pub mod indexer;
pub mod reserved;
pub mod retry;

pub use enrich::Enricher;
pub use error::{IndexError, Result};
pub use indexer::{Indexer, IndexerConfig, IndexingResult, Reindex};
pub use reserved::{
  HandleOutcome, ReservedEventHandler, StockReservedHandler, StockUnitReserved,
};
pub use retry::RetryPolicy;

#[cfg(test)]
mod fakes;
