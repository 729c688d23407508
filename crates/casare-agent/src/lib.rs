//! CasareRPA Robot Agent.
//!
//! The process that runs on a robot machine: polls the queue for eligible
//! jobs (§4.3), executes them through `casare-engine`, publishes periodic
//! heartbeats, and sweeps up any child processes left behind by a crash.

mod bootstrap;
mod error;
mod heartbeat;
mod lifecycle;
mod orphan;
mod supervisor;

pub use bootstrap::run;
pub use error::AgentError;
pub use heartbeat::{run_heartbeat_loop, RunningJobs};
pub use lifecycle::{ExecutionLifecycleManager, LifecycleError, LocalState};
pub use orphan::OrphanTracker;
pub use supervisor::RobotAgent;
