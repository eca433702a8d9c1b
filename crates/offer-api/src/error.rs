//! API error type and [`axum::response::IntoResponse`] implementation.

use std::error::Error as StdError;

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use offer_indexer::IndexError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn StdError + Send + Sync>),

  #[error("upstream error: {0}")]
  Upstream(#[source] Box<dyn StdError + Send + Sync>),
}

impl ApiError {
  /// Wrap a repository error. A rejected query (unknown field, mismatched
  /// operator) anywhere in the source chain is the caller's fault.
  pub fn store<E>(e: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    let rejected = std::iter::successors(Some(&e as &(dyn StdError + 'static)), |&e| e.source())
      .find_map(|e| e.downcast_ref::<offer_core::Error>())
      .map(ToString::to_string);
    match rejected {
      Some(message) => ApiError::BadRequest(message),
      None => ApiError::Store(Box::new(e)),
    }
  }

  pub fn upstream<E>(e: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    ApiError::Upstream(Box::new(e))
  }
}

impl From<IndexError> for ApiError {
  fn from(e: IndexError) -> Self {
    match e {
      IndexError::AlreadyRunning => ApiError::Conflict(e.to_string()),
      other => ApiError::Upstream(Box::new(other)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) | ApiError::Upstream(e) => {
        error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
