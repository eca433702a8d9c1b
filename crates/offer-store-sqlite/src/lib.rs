//! SQLite backend for the offer projection.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;
pub mod translate;

pub use error::{Error, Result};
pub use store::SqliteOfferRepository;
pub use translate::{SqlQuery, SqlTranslator};
