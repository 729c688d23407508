use thiserror::Error;

/// Errors a vault backend can raise. All three are non-fatal to the
/// resolver chain (§4.5) — the resolver logs and falls through to the next
/// tier rather than aborting.
#[derive(Debug, Error)]
pub enum BackendError {
  #[error("vault connection error: {0}")]
  Connection(String),

  #[error("secret not found")]
  NotFound,

  #[error("access denied: {0}")]
  AccessDenied(String),
}
