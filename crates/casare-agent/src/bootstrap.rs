use std::sync::Arc;

use casare_app_config::AgentConfig;
use casare_credentials::InMemoryCredentialBackend;
use casare_fleet::{PgRobotStore, RobotStore};
use casare_node::NodeRegistry;
use casare_queue::{JobStore, PgJobStore};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AgentError;
use crate::heartbeat::{run_heartbeat_loop, RunningJobs};
use crate::orphan::OrphanTracker;
use crate::supervisor::RobotAgent;

const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);
const DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const VAULT_PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Wires an `AgentConfig` up into a running agent: checks Vault and
/// Postgres reachability, registers the built-in node types, and runs the
/// poll loop and heartbeat loop side by side until `shutdown` fires.
///
/// Credentials resolve against an in-process backend regardless of
/// `vault_addr` for now — a Vault-backed `CredentialBackend` is not yet
/// implemented in `casare-credentials`. The address is still probed at
/// startup so a misconfigured deployment fails fast with the right exit
/// code (§6) rather than silently falling back to the in-memory backend.
pub async fn run(config: AgentConfig, shutdown: CancellationToken) -> Result<(), AgentError> {
  if let Some(addr) = &config.vault_addr {
    probe_vault(addr).await?;
  }

  let pool = PgPoolOptions::new()
    .max_connections(10)
    .connect(&config.postgres_url)
    .await
    .map_err(AgentError::DbUnreachable)?;

  let job_store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
  let robot_store: Arc<dyn RobotStore> = Arc::new(PgRobotStore::new(pool));
  let credential_backend = Arc::new(InMemoryCredentialBackend::new());
  let node_registry = Arc::new(NodeRegistry::builtin());
  let orphans = Arc::new(OrphanTracker::new(orphan_file_path(config.robot_id)));
  let running = Arc::new(RunningJobs::new());

  info!(robot_id = %config.robot_id, capabilities = ?config.robot_capabilities, "starting robot agent");

  let agent = Arc::new(RobotAgent::new(
    config.robot_id,
    config.max_concurrent_jobs,
    config.robot_capabilities.clone(),
    None,
    config.lease_ttl.as_millis() as i64,
    job_store.clone(),
    credential_backend,
    node_registry,
    orphans,
    running.clone(),
  ));

  let heartbeat_cancel = shutdown.clone();
  let heartbeat_handle = tokio::spawn(run_heartbeat_loop(
    config.robot_id,
    format!("robot-{}", config.robot_id),
    config.robot_capabilities,
    config.max_concurrent_jobs,
    running,
    robot_store,
    job_store,
    config.heartbeat_interval,
    config.lease_ttl.as_millis() as i64,
    heartbeat_cancel,
  ));

  agent.run(POLL_INTERVAL, DRAIN_TIMEOUT, shutdown).await;
  let _ = heartbeat_handle.await;
  Ok(())
}

fn orphan_file_path(robot_id: uuid::Uuid) -> std::path::PathBuf {
  std::env::temp_dir().join(format!("casare-agent-{robot_id}-orphans.txt"))
}

async fn probe_vault(addr: &str) -> Result<(), AgentError> {
  let url = format!("{}/v1/sys/health", addr.trim_end_matches('/'));
  let client = reqwest::Client::builder()
    .timeout(VAULT_PROBE_TIMEOUT)
    .build()
    .map_err(|source| AgentError::VaultUnreachable { addr: addr.to_string(), source })?;
  client
    .get(&url)
    .send()
    .await
    .map_err(|source| AgentError::VaultUnreachable { addr: addr.to_string(), source })?;
  Ok(())
}
