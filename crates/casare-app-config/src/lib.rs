//! CasareRPA Ambient Process Configuration
//!
//! Loads the process-level settings shared by both binaries (§6
//! Environment variables) straight from the environment, with typed
//! defaults. The workflow/node/queue-row config that varies per job lives
//! in the domain crates (`casare-workflow-def`, `casare-queue`, ...); this
//! crate only covers the boot-time settings a deployment sets once per
//! process.

mod env;
mod error;
mod exit_code;

pub use env::{AgentConfig, OrchestratorConfig};
pub use error::ConfigError;
pub use exit_code::ExitCode;
