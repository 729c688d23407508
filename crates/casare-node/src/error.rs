use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of error kinds used across every layer of the system
/// (§7). A `NodeError`'s kind is what survives into job rows, WS frames,
/// and CLI output — the message is free text, the kind is what callers
/// branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
  Validation,
  Timeout,
  Cancelled,
  NodeExecution,
  ResourceUnavailable,
  CredentialNotFound,
  PermissionDenied,
  LeaseExpired,
  Internal,
}

/// An error raised while validating or executing a node.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct NodeError {
  pub kind: ErrorKind,
  pub message: String,
}

impl NodeError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Validation, message)
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Internal, message)
  }
}
