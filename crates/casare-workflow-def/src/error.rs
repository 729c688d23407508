use thiserror::Error;

/// Errors raised while decoding a workflow from its persisted JSON shape.
#[derive(Debug, Error)]
pub enum SchemaError {
  #[error("invalid workflow JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("missing required field: {0}")]
  MissingField(&'static str),

  #[error("node map key '{key}' does not match node_id '{declared}'")]
  NodeIdMismatch { key: String, declared: String },
}
