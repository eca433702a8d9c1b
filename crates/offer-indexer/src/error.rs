//! Error type for `offer-indexer`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
  /// A rebuild was requested while another one is running.
  #[error("indexing is already in progress")]
  AlreadyRunning,

  #[error("indexing was cancelled")]
  Cancelled,

  /// An upstream fetch or repository call failed. `stage` names the call.
  #[error("{stage} failed: {source}")]
  Upstream {
    stage:  &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl IndexError {
  pub(crate) fn upstream<E>(stage: &'static str) -> impl FnOnce(E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    move |e| IndexError::Upstream { stage, source: Box::new(e) }
  }
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
