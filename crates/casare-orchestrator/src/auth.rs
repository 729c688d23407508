use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

use crate::state::AppState;

/// SHA-256 hex digest of an API key, stored in `robots.api_key_hash` (§4.6
/// "per-robot API keys ... SHA-256 hash stored in DB, never plaintext").
pub fn hash_api_key(key: &str) -> String {
  let digest = Sha256::digest(key.as_bytes());
  digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Accepts a bearer token matching the configured `API_SECRET` for
/// fleet-internal calls (§6 Authentication). Per-robot API keys are
/// verified separately by whichever handler looks the robot up, since that
/// requires a DB round trip this middleware has no reason to make for
/// every request.
pub async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, StatusCode> {
  let Some(secret) = &state.api_secret else {
    return Ok(next.run(request).await);
  };

  let token = request
    .headers()
    .get("authorization")
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.strip_prefix("Bearer "));

  match token {
    Some(token) if token == secret => Ok(next.run(request).await),
    _ => Err(StatusCode::UNAUTHORIZED),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hashing_is_deterministic_and_never_echoes_the_key() {
    let hash = hash_api_key("sekret");
    assert_eq!(hash, hash_api_key("sekret"));
    assert!(!hash.contains("sekret"));
    assert_eq!(hash.len(), 64);
  }
}
