use thiserror::Error;

/// Failures that can abort the agent process before or during its main
/// loop. Per-job failures never appear here — those are captured as an
/// `ErrorRecord` on the job row instead (§7).
///
/// `VaultUnreachable` and `DbUnreachable` are raised only during startup
/// (`bootstrap::run`'s connectivity checks), never from a query issued
/// once the agent is already serving jobs — those later failures surface
/// as a plain `Queue` error instead. This split is what lets the CLI map
/// a cold-start failure to the exit codes in §6.
#[derive(Debug, Error)]
pub enum AgentError {
  #[error(transparent)]
  Config(#[from] casare_app_config::ConfigError),

  #[error(transparent)]
  Queue(#[from] casare_queue::QueueError),

  #[error(transparent)]
  Fleet(#[from] casare_fleet::FleetError),

  #[error("failed to decode job workflow: {0}")]
  Schema(#[from] casare_workflow_def::SchemaError),

  #[error("failed to load workflow: {0}")]
  Load(#[from] casare_workflow_loader::LoadError),

  #[error("failed to read/write orphan PID file at {path}: {source}")]
  OrphanFile { path: String, source: std::io::Error },

  #[error("vault at {addr} is not reachable: {source}")]
  VaultUnreachable { addr: String, source: reqwest::Error },

  #[error("database is not reachable at startup: {0}")]
  DbUnreachable(sqlx::Error),
}
