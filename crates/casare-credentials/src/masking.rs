use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Key names treated as sensitive regardless of case (§7, P10). Mirrors the
/// fixed sensitive-key vocabulary the masking filter matches on.
static SENSITIVE_KEYS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
  [
    "password", "passwd", "pwd", "pass", "secret", "secrets", "api_key", "apikey", "api-key",
    "access_token", "accesstoken", "access-token", "refresh_token", "refreshtoken",
    "refresh-token", "auth_token", "authtoken", "auth-token", "bearer", "bearer_token",
    "authorization", "auth", "private_key", "privatekey", "private-key", "secret_key",
    "secretkey", "secret-key", "credential", "credentials", "cred", "creds", "token", "tokens",
    "session_id", "sessionid", "session-id", "cookie", "cookies", "jwt", "jwt_token",
    "client_secret", "clientsecret", "client-secret", "encryption_key", "encryptionkey",
    "signing_key", "signingkey", "database_password", "db_password", "dbpassword",
    "connection_string", "connectionstring", "pin", "otp", "totp", "mfa_code", "ssn",
    "social_security", "credit_card", "creditcard", "cc_number", "cvv", "cvc",
  ]
  .into_iter()
  .collect()
});

/// Patterns that catch sensitive `key=value`/`key: value` pairs embedded in
/// free-text log lines, not just structured maps.
static SENSITIVE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
  [
    r#"(?i)password["']?\s*[:=]\s*["']?([^"'}\s,]+)"#,
    r#"(?i)api[_-]?key["']?\s*[:=]\s*["']?([^"'}\s,]+)"#,
    r#"(?i)secret["']?\s*[:=]\s*["']?([^"'}\s,]+)"#,
    r#"(?i)token["']?\s*[:=]\s*["']?([^"'}\s,]+)"#,
    r#"(?i)authorization["']?\s*[:=]\s*["']?([^"'}\s,]+)"#,
  ]
  .iter()
  .map(|p| Regex::new(p).expect("static masking pattern is valid"))
  .collect()
});

const MASK: &str = "******";

/// Detects and redacts sensitive data before it reaches a log sink (§7,
/// P10). Key-based detection covers structured data (config maps, job
/// params); pattern-based detection covers free-text strings that embed a
/// `key=value` pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataMasker;

impl DataMasker {
  pub fn new() -> Self {
    Self
  }

  pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.contains(key.to_lowercase().as_str())
  }

  /// Redact any `key=value`/`key: value` pairs a free-text string embeds.
  pub fn mask_string(&self, input: &str) -> String {
    let mut out = input.to_string();
    for pattern in SENSITIVE_PATTERNS.iter() {
      out = pattern
        .replace_all(&out, |caps: &regex::Captures| {
          caps[0].replacen(&caps[1], MASK, 1)
        })
        .into_owned();
    }
    out
  }

  /// Recursively redact any object value whose key matches the sensitive
  /// vocabulary, and pattern-mask any remaining string leaves.
  pub fn mask_json(&self, value: &Value) -> Value {
    match value {
      Value::Object(map) => Value::Object(
        map
          .iter()
          .map(|(k, v)| {
            let masked = if Self::is_sensitive_key(k) {
              Value::String(MASK.to_string())
            } else {
              self.mask_json(v)
            };
            (k.clone(), masked)
          })
          .collect(),
      ),
      Value::Array(items) => Value::Array(items.iter().map(|v| self.mask_json(v)).collect()),
      Value::String(s) => Value::String(self.mask_string(s)),
      other => other.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn masks_sensitive_keys_in_objects() {
    let masker = DataMasker::new();
    let input = json!({"username": "alice", "password": "hunter2"});
    let masked = masker.mask_json(&input);
    assert_eq!(masked["username"], json!("alice"));
    assert_eq!(masked["password"], json!(MASK));
  }

  #[test]
  fn masks_sensitive_keys_case_insensitively() {
    assert!(DataMasker::is_sensitive_key("API_KEY"));
    assert!(DataMasker::is_sensitive_key("Api-Key"));
    assert!(!DataMasker::is_sensitive_key("username"));
  }

  #[test]
  fn masks_embedded_key_value_pairs_in_free_text() {
    let masker = DataMasker::new();
    let masked = masker.mask_string("connecting with password=hunter2 to host");
    assert!(!masked.contains("hunter2"));
    assert!(masked.contains(MASK));
  }

  #[test]
  fn recurses_into_nested_objects_and_arrays() {
    let masker = DataMasker::new();
    let input = json!({"nested": {"secret": "x"}, "list": [{"token": "y"}]});
    let masked = masker.mask_json(&input);
    assert_eq!(masked["nested"]["secret"], json!(MASK));
    assert_eq!(masked["list"][0]["token"], json!(MASK));
  }
}
