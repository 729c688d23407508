use std::sync::Arc;
use std::time::Duration;

use casare_app_config::OrchestratorConfig;
use casare_fleet::{AdmissionPolicy, PgRobotStore, RobotStore, UnlimitedAdmission};
use casare_queue::{run_lease_reaper, JobStore, PgJobStore};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::OrchestratorError;
use crate::poller::run_event_poller;
use crate::router::build_router;
use crate::state::AppState;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const REAPER_INTERVAL: Duration = Duration::from_secs(10);

/// Wires an `OrchestratorConfig` up into a running HTTP/WS server (§6).
/// Admission is always `UnlimitedAdmission` for now — real enforcement
/// lives in `claim_next`'s own `tenant_quotas` query; this in-process
/// policy exists for callers that want a cheap pre-check before submitting,
/// and the event poller keeps its counters roughly in step.
pub async fn run(config: OrchestratorConfig, shutdown: CancellationToken) -> Result<(), OrchestratorError> {
  let pool = PgPoolOptions::new().max_connections(10).connect(&config.postgres_url).await.map_err(casare_queue::QueueError::from)?;
  let job_store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
  let robot_store: Arc<dyn RobotStore> = Arc::new(PgRobotStore::new(pool));
  let admission: Arc<dyn AdmissionPolicy> = Arc::new(UnlimitedAdmission);

  let state = AppState::new(job_store.clone(), robot_store, admission, config.api_secret.clone());

  let reaper_handle = tokio::spawn(run_lease_reaper(job_store, REAPER_INTERVAL, shutdown.clone()));
  let poller_handle = tokio::spawn(run_event_poller(state.clone(), EVENT_POLL_INTERVAL, shutdown.clone()));

  let router = build_router(state);
  let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
  info!(addr = %config.bind_addr, "orchestrator listening");

  axum::serve(listener, router).with_graceful_shutdown(shutdown_signal(shutdown)).await?;

  let _ = reaper_handle.await;
  let _ = poller_handle.await;
  Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
  shutdown.cancelled().await;
}
