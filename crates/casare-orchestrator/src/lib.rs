//! CasareRPA Orchestrator.
//!
//! The process clients and operators talk to: the `/jobs`, `/robots`,
//! `/stats`, and `/events` HTTP/WS surface (§6), override application, and
//! the admission-control approximation layered on top of the queue's own
//! `tenant_quotas` enforcement.

mod auth;
mod bootstrap;
mod error;
mod poller;
mod router;
mod routes;
mod state;

pub use bootstrap::run;
pub use error::OrchestratorError;
pub use router::build_router;
pub use state::{AppState, WsFrame};
