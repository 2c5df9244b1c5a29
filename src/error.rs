//! Error taxonomy for the resource cache.
//!
//! Every error here is `Clone`: a single fetch result is handed to every
//! caller waiting on the same cache key.

use thiserror::Error;

use crate::key::CacheKey;
use crate::mutation::MutationKind;

/// Failure reported by a [`ResourceAdapter`](crate::adapter::ResourceAdapter).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
  /// The backend answered with a non-success status.
  #[error("backend returned {status}: {message}")]
  Status { status: u16, message: String },
  /// The request never produced a response (connect, timeout, reset).
  #[error("transport error: {0}")]
  Transport(String),
  /// The response could not be decoded into the expected shape.
  #[error("failed to decode response: {0}")]
  Decode(String),
}

impl AdapterError {
  pub fn status(status: u16, message: impl Into<String>) -> Self {
    Self::Status {
      status,
      message: message.into(),
    }
  }

  /// Whether retrying the same request may succeed.
  ///
  /// Client errors other than 408/429 are permanent.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
      Self::Transport(_) => true,
      Self::Decode(_) => false,
    }
  }
}

/// Query parameters that cannot be turned into a cache key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid cache key for {resource}/{operation}: {reason}")]
pub struct InvalidKeyError {
  pub resource: String,
  pub operation: String,
  pub reason: String,
}

/// A list/detail fetch that failed after exhausting its retry budget.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("fetching {key} failed after {attempts} attempt(s): {source}")]
pub struct FetchError {
  pub key: CacheKey,
  pub attempts: u32,
  #[source]
  pub source: AdapterError,
}

/// A create/update/delete the backend rejected. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} on {resource} failed: {source}")]
pub struct MutationError {
  pub resource: String,
  pub kind: MutationKind,
  #[source]
  pub source: AdapterError,
}

impl MutationError {
  /// HTTP status of the rejection, when the backend produced one.
  pub fn status(&self) -> Option<u16> {
    match &self.source {
      AdapterError::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
  #[error(transparent)]
  InvalidKey(#[from] InvalidKeyError),
  #[error(transparent)]
  Fetch(#[from] FetchError),
  #[error(transparent)]
  Mutation(#[from] MutationError),
  /// Adapter failure outside a fetch or mutation, e.g. backend setup.
  #[error(transparent)]
  Adapter(#[from] AdapterError),
  /// The value cached under `key` is not of the requested type.
  #[error("cached value for {key} has an unexpected type")]
  TypeMismatch { key: CacheKey },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
