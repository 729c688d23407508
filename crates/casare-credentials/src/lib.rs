//! CasareRPA Credential Resolver
//!
//! The vault abstraction and resolution chain nodes use to fetch secrets
//! (§4.5): `CredentialBackend` is the interface concrete vaults (HashiCorp
//! Vault, Azure Key Vault, AWS Secrets Manager, or an in-memory store for
//! tests) implement; `CredentialResolver` walks the ordered
//! vault → direct-param → context-var → env-var chain; `DataMasker` keeps
//! resolved secrets out of log output.

mod backend;
mod credential;
mod error;
mod masking;
mod memory;
mod resolver;

pub use backend::CredentialBackend;
pub use credential::{Credential, CredentialKind, CredentialMetadata};
pub use error::BackendError;
pub use masking::DataMasker;
pub use memory::InMemoryCredentialBackend;
pub use resolver::CredentialResolver;
