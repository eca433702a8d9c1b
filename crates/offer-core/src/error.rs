//! Error types for `offer-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown offer status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown field: {0:?}")]
  UnknownField(String),

  #[error("invalid query: {0}")]
  InvalidQuery(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
