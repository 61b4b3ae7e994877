//! Error taxonomy shared by the list-state controller and its data sources.

use thiserror::Error;

/// Errors surfaced by fetches and mutations.
///
/// Every variant is recoverable: the session stays usable and a retry
/// (refresh or re-issuing the mutation) is always allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
  /// Transport-level failure (connection refused, timeout, DNS)
  #[error("network failure: {0}")]
  NetworkFailure(String),

  /// Non-success status with a message from the backend
  #[error("server error ({status}): {message}")]
  ServerError { status: u16, message: String },

  /// Entity missing from the local cache when a mutation was requested
  #[error("{0} not found")]
  NotFound(String),

  /// A mutation for the same entity is still outstanding
  #[error("{0} has a pending change")]
  Busy(String),

  /// Caller input failed a local precondition
  #[error("invalid input: {0}")]
  ValidationFailure(String),
}

impl ListError {
  pub fn server(status: u16, message: impl Into<String>) -> Self {
    ListError::ServerError {
      status,
      message: message.into(),
    }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    ListError::ValidationFailure(message.into())
  }

  /// Whether the error came from the transport or backend rather than a
  /// local precondition.
  pub fn is_remote(&self) -> bool {
    matches!(
      self,
      ListError::NetworkFailure(_) | ListError::ServerError { .. }
    )
  }
}

impl From<reqwest::Error> for ListError {
  fn from(e: reqwest::Error) -> Self {
    match e.status() {
      Some(status) => ListError::server(status.as_u16(), e.to_string()),
      None if e.is_decode() => ListError::server(200, "invalid JSON response"),
      None => ListError::NetworkFailure(e.to_string()),
    }
  }
}

pub type ListResult<T> = std::result::Result<T, ListError>;
