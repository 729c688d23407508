use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resolved secret, as held by a vault backend (§3 Credential).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
  pub name: String,
  #[serde(rename = "type")]
  pub kind: CredentialKind,
  pub data: HashMap<String, Value>,
  pub metadata: CredentialMetadata,
}

impl Credential {
  /// Pull a named subvalue out of `data` — the `credential_field` tier of
  /// resolution (§4.5).
  pub fn field(&self, field: &str) -> Option<&Value> {
    self.data.get(field)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
  UsernamePassword,
  ApiKey,
  OauthToken,
  ServiceAccount,
  Certificate,
  Custom,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialMetadata {
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub expiry: Option<DateTime<Utc>>,
  #[serde(default)]
  pub owner: Option<String>,
}
