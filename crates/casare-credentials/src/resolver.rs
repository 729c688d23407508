use serde_json::Value;

use casare_node::{CredentialRequest, ErrorKind, NodeError};

use crate::backend::CredentialBackend;

fn is_empty(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => s.is_empty(),
    _ => false,
  }
}

/// Resolves a `CredentialRequest` through the ordered chain (§4.5, P9):
/// vault lookup, then direct parameter, then a context variable, then a
/// process environment variable. First non-empty tier wins.
///
/// The context-variable tier is supplied by the caller rather than looked
/// up here — only the owning `ExecutionContext` knows workflow variables,
/// and this crate has no reason to depend on it.
pub struct CredentialResolver<B: CredentialBackend> {
  backend: B,
}

impl<B: CredentialBackend> CredentialResolver<B> {
  pub fn new(backend: B) -> Self {
    Self { backend }
  }

  pub async fn resolve(
    &self,
    request: &CredentialRequest,
    context_var_value: Option<Value>,
  ) -> Result<Value, NodeError> {
    if let Some(name) = &request.credential_name {
      match self.backend.get(name).await {
        Ok(credential) => {
          let value = match &request.credential_field {
            Some(field) => credential.field(field).cloned(),
            None => credential.data.get("value").cloned(),
          };
          if let Some(value) = value {
            if !is_empty(&value) {
              return Ok(value);
            }
          }
        }
        Err(err) => {
          tracing::debug!(credential = %name, error = %err, "vault tier miss, falling through");
        }
      }
    }

    if let Some(value) = &request.direct_param {
      if !is_empty(value) {
        return Ok(value.clone());
      }
    }

    if let Some(value) = context_var_value {
      if !is_empty(&value) {
        return Ok(value);
      }
    }

    if let Some(env_var) = &request.env_var {
      if let Ok(value) = std::env::var(env_var) {
        if !value.is_empty() {
          return Ok(Value::String(value));
        }
      }
    }

    Err(NodeError::new(
      ErrorKind::CredentialNotFound,
      "no tier of the credential resolution chain produced a value",
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::credential::{Credential, CredentialKind, CredentialMetadata};
  use crate::memory::InMemoryCredentialBackend;
  use std::collections::HashMap;

  fn resolver() -> CredentialResolver<InMemoryCredentialBackend> {
    CredentialResolver::new(InMemoryCredentialBackend::new())
  }

  #[tokio::test]
  async fn direct_param_wins_when_vault_tier_is_absent() {
    let resolver = resolver();
    let request = CredentialRequest {
      direct_param: Some(Value::from("direct-value")),
      ..Default::default()
    };
    let value = resolver.resolve(&request, None).await.unwrap();
    assert_eq!(value, Value::from("direct-value"));
  }

  #[tokio::test]
  async fn vault_tier_takes_precedence_over_direct_param() {
    let backend = InMemoryCredentialBackend::new();
    backend
      .put(
        "db",
        Credential {
          name: "db".into(),
          kind: CredentialKind::UsernamePassword,
          data: HashMap::from([("value".to_string(), Value::from("vault-value"))]),
          metadata: CredentialMetadata::default(),
        },
      )
      .await
      .unwrap();
    let resolver = CredentialResolver::new(backend);

    let request = CredentialRequest {
      credential_name: Some("db".into()),
      direct_param: Some(Value::from("direct-value")),
      ..Default::default()
    };
    let value = resolver.resolve(&request, None).await.unwrap();
    assert_eq!(value, Value::from("vault-value"));
  }

  #[tokio::test]
  async fn falls_through_to_context_var_then_env() {
    let resolver = resolver();
    let request = CredentialRequest {
      context_var: Some("db_password".into()),
      ..Default::default()
    };
    let value = resolver
      .resolve(&request, Some(Value::from("ctx-value")))
      .await
      .unwrap();
    assert_eq!(value, Value::from("ctx-value"));
  }

  #[tokio::test]
  async fn all_tiers_empty_raises_credential_not_found() {
    let resolver = resolver();
    let request = CredentialRequest::default();
    let err = resolver.resolve(&request, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::CredentialNotFound);
  }
}
