//! Error taxonomy.
//!
//! `GenerationError` never leaves the orchestrator: every variant is downgraded to a
//! local-synthesis fallback. Store and service errors are what the routing layer sees.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
  /// Missing credential, transport failure, non-2xx status or empty body.
  #[error("remote completion unavailable: {0}")]
  RemoteUnavailable(String),

  #[error("remote completion timed out after {secs}s")]
  RemoteTimeout { secs: u64 },

  /// No bracket pair in the text, or the candidate is not valid JSON.
  #[error("could not parse model output: {0}")]
  Parse(String),

  /// Parsed JSON has the wrong shape or breaks tree invariants after normalization.
  #[error("model output has unexpected shape: {0}")]
  Shape(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
  #[error("record not found: {0}")]
  NotFound(String),

  #[error("record already exists: {0}")]
  AlreadyExists(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("section {index} not found in {tree_id}")]
  SectionNotFound { tree_id: String, index: u32 },
}
