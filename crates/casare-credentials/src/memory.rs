use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::CredentialBackend;
use crate::credential::Credential;
use crate::error::BackendError;

/// An in-memory credential backend. Suitable for tests and for local/dev
/// deployments that don't run a real vault.
#[derive(Default)]
pub struct InMemoryCredentialBackend {
  data: Mutex<HashMap<String, Credential>>,
}

impl InMemoryCredentialBackend {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CredentialBackend for InMemoryCredentialBackend {
  async fn get(&self, name: &str) -> Result<Credential, BackendError> {
    self
      .data
      .lock()
      .unwrap()
      .get(name)
      .cloned()
      .ok_or(BackendError::NotFound)
  }

  async fn put(&self, name: &str, credential: Credential) -> Result<(), BackendError> {
    self.data.lock().unwrap().insert(name.to_string(), credential);
    Ok(())
  }

  async fn delete(&self, name: &str) -> Result<(), BackendError> {
    self.data.lock().unwrap().remove(name);
    Ok(())
  }

  async fn rotate(&self, name: &str) -> Result<(), BackendError> {
    if self.data.lock().unwrap().contains_key(name) {
      Ok(())
    } else {
      Err(BackendError::NotFound)
    }
  }

  async fn list(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
    Ok(
      self
        .data
        .lock()
        .unwrap()
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }

  fn is_connected(&self) -> bool {
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::credential::{CredentialKind, CredentialMetadata};

  fn sample(name: &str) -> Credential {
    Credential {
      name: name.to_string(),
      kind: CredentialKind::ApiKey,
      data: HashMap::from([("value".to_string(), serde_json::json!("sk-abc"))]),
      metadata: CredentialMetadata::default(),
    }
  }

  #[tokio::test]
  async fn put_then_get_round_trips() {
    let backend = InMemoryCredentialBackend::new();
    backend.put("svc", sample("svc")).await.unwrap();
    let cred = backend.get("svc").await.unwrap();
    assert_eq!(cred.field("value").unwrap(), &serde_json::json!("sk-abc"));
  }

  #[tokio::test]
  async fn get_missing_is_not_found() {
    let backend = InMemoryCredentialBackend::new();
    assert!(matches!(backend.get("ghost").await, Err(BackendError::NotFound)));
  }
}
