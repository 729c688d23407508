use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::BackendError;

/// The minimal interface every vault backend satisfies (§4.5). Concrete
/// backends — HashiCorp Vault, Azure Key Vault, AWS Secrets Manager, an
/// in-memory store for tests — sit behind this trait; the resolver and the
/// rest of the core depend only on it.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
  async fn get(&self, name: &str) -> Result<Credential, BackendError>;
  async fn put(&self, name: &str, credential: Credential) -> Result<(), BackendError>;
  async fn delete(&self, name: &str) -> Result<(), BackendError>;
  async fn rotate(&self, name: &str) -> Result<(), BackendError>;
  async fn list(&self, prefix: &str) -> Result<Vec<String>, BackendError>;
  fn is_connected(&self) -> bool;
}

/// Lets callers hold a type-erased backend (`Arc<dyn CredentialBackend>`)
/// behind a `CredentialResolver<B>` without a second resolver type — the
/// orchestrator and agent both wire whichever concrete backend a deployment
/// configures, then pass the trait object around.
#[async_trait]
impl CredentialBackend for std::sync::Arc<dyn CredentialBackend> {
  async fn get(&self, name: &str) -> Result<Credential, BackendError> {
    (**self).get(name).await
  }

  async fn put(&self, name: &str, credential: Credential) -> Result<(), BackendError> {
    (**self).put(name, credential).await
  }

  async fn delete(&self, name: &str) -> Result<(), BackendError> {
    (**self).delete(name).await
  }

  async fn rotate(&self, name: &str) -> Result<(), BackendError> {
    (**self).rotate(name).await
  }

  async fn list(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
    (**self).list(prefix).await
  }

  fn is_connected(&self) -> bool {
    (**self).is_connected()
  }
}
