use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use casare_credentials::CredentialBackend;
use casare_engine::{Engine, ErrorRecord, EventBus, ExecutionContext, ExecutionSummary, NodeMetrics, PauseController, TerminalStatus};
use casare_node::NodeRegistry;
use casare_queue::{ClaimRequest, Job, JobOutcome, JobState, JobStore};
use casare_workflow_def::WorkflowDef;
use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AgentError;
use crate::heartbeat::RunningJobs;
use crate::lifecycle::{ExecutionLifecycleManager, LocalState};
use crate::orphan::OrphanTracker;

/// Polls for eligible jobs and supervises the job tasks it spawns (§4.3
/// main loop + job task). One `RobotAgent` per process; `max_concurrent_jobs`
/// caps how many job tasks run at once.
pub struct RobotAgent {
  pub robot_id: Uuid,
  max_concurrent_jobs: u32,
  capabilities: HashSet<String>,
  tenant_id: Option<String>,
  lease_ttl_ms: i64,
  job_store: Arc<dyn JobStore>,
  credential_backend: Arc<dyn CredentialBackend>,
  node_registry: Arc<NodeRegistry>,
  orphans: Arc<OrphanTracker>,
  running: Arc<RunningJobs>,
  wake: Arc<Notify>,
  job_cancels: Mutex<HashMap<Uuid, CancellationToken>>,
  /// One lifecycle slot per unit of `max_concurrent_jobs` (§12). A job task
  /// claims whichever slot is `Idle`; if none is, it forces cleanup of the
  /// one a crashed prior task left stuck rather than refusing the job.
  slots: Vec<Arc<ExecutionLifecycleManager>>,
}

impl RobotAgent {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    robot_id: Uuid,
    max_concurrent_jobs: u32,
    capabilities: HashSet<String>,
    tenant_id: Option<String>,
    lease_ttl_ms: i64,
    job_store: Arc<dyn JobStore>,
    credential_backend: Arc<dyn CredentialBackend>,
    node_registry: Arc<NodeRegistry>,
    orphans: Arc<OrphanTracker>,
    running: Arc<RunningJobs>,
  ) -> Self {
    let slots = (0..max_concurrent_jobs.max(1)).map(|_| Arc::new(ExecutionLifecycleManager::new())).collect();
    Self {
      robot_id,
      max_concurrent_jobs,
      capabilities,
      tenant_id,
      lease_ttl_ms,
      job_store,
      credential_backend,
      node_registry,
      orphans,
      running,
      wake: Arc::new(Notify::new()),
      job_cancels: Mutex::new(HashMap::new()),
      slots,
    }
  }

  /// Find an `Idle` slot, or force-cleanup the first stuck one if every
  /// slot is occupied by a crashed prior task's leftovers.
  async fn claim_slot(&self) -> Arc<ExecutionLifecycleManager> {
    for slot in &self.slots {
      if slot.current().await == LocalState::Idle {
        return slot.clone();
      }
    }
    let slot = &self.slots[0];
    let _ = slot.begin().await;
    slot.finish_cleanup().await;
    slot.clone()
  }

  /// The claim/spawn/wait loop (§4.3):
  /// ```text
  /// loop:
  ///   if current_jobs < max_concurrent_jobs:
  ///     job := claim_next_compatible_job()
  ///     if job: spawn job_task(job)
  ///   wait(poll_interval OR wake_on_notify OR any_job_task_done)
  /// ```
  /// Runs until `shutdown` fires, then stops claiming and drains running
  /// jobs for up to `drain_timeout` before force-cancelling the rest.
  pub async fn run(self: Arc<Self>, poll_interval: Duration, drain_timeout: Duration, shutdown: CancellationToken) {
    if let Err(err) = self.orphans.reap_from_previous_run() {
      warn!(error = %err, "failed to reap orphaned processes from a prior run");
    }

    let mut ticker = tokio::time::interval(poll_interval);
    loop {
      tokio::select! {
        _ = shutdown.cancelled() => break,
        _ = ticker.tick() => {}
        _ = self.wake.notified() => {}
      }

      while self.running.count() < self.max_concurrent_jobs {
        let request = ClaimRequest {
          robot_id: self.robot_id,
          capabilities: self.capabilities.clone(),
          tenant_id: self.tenant_id.clone(),
          lease_ttl_ms: self.lease_ttl_ms,
        };
        match self.job_store.claim_next(&request).await {
          Ok(Some(job)) => {
            info!(job_id = %job.job_id, "claimed job");
            self.running.insert(job.job_id);
            let slot = self.claim_slot().await;
            let agent = self.clone();
            tokio::spawn(async move {
              agent.run_job_task(job, slot, poll_interval).await;
              agent.wake.notify_one();
            });
          }
          Ok(None) => break,
          Err(err) => {
            warn!(error = %err, "claim attempt failed");
            break;
          }
        }
      }
    }

    info!("shutdown requested, draining running jobs");
    let deadline = tokio::time::Instant::now() + drain_timeout;
    while self.running.count() > 0 && tokio::time::Instant::now() < deadline {
      tokio::time::sleep(Duration::from_millis(200)).await;
    }
    if self.running.count() > 0 {
      warn!(remaining = self.running.count(), "drain timeout elapsed, cancelling remaining jobs");
      let cancels: Vec<CancellationToken> = self.job_cancels.lock().unwrap().values().cloned().collect();
      for cancel in cancels {
        cancel.cancel();
      }
    }
  }

  async fn run_job_task(&self, job: Job, slot: Arc<ExecutionLifecycleManager>, cancel_poll_interval: Duration) {
    let job_id = job.job_id;
    if slot.begin().await.is_err() {
      warn!(%job_id, "job slot needed forced cleanup before this job could start");
    }
    if let Err(err) = self.execute_job(job, &slot, cancel_poll_interval).await {
      warn!(%job_id, error = %err, "job task aborted before completion");
      let _ = slot.transition(LocalState::Error).await;
    }
    slot.finish_cleanup().await;
    self.running.remove(job_id);
  }

  /// Runs the workflow, retrying the whole thing from a clean context up
  /// to `workflow.settings.retry_count` additional times on a genuine
  /// node-execution failure (§3 Settings). A cancelled or timed-out run is
  /// never retried — those are a deliberate stop and a near-certain repeat
  /// failure, respectively, not the kind of transient error this setting
  /// is for.
  async fn execute_job(&self, job: Job, slot: &ExecutionLifecycleManager, cancel_poll_interval: Duration) -> Result<(), AgentError> {
    slot.transition(LocalState::Running).await.ok();
    let def = WorkflowDef::from_value(job.workflow.0.clone())?;
    let workflow = casare_workflow_loader::load(def)?;

    let initial_variables: HashMap<String, Value> = job.inputs.0.as_object().cloned().unwrap_or_default().into_iter().collect();

    let cancel = CancellationToken::new();
    self.job_cancels.lock().unwrap().insert(job_id_key(&job), cancel.clone());

    self.job_store.mark_running(job.job_id, self.robot_id).await?;

    let metrics = NodeMetrics::new();
    let timeout = Duration::from_secs(workflow.settings.timeout_seconds);
    let max_attempts = workflow.settings.retry_count + 1;

    let mut summary = None;
    for attempt in 1..=max_attempts {
      let events = EventBus::default();
      let mut ctx = ExecutionContext::new(job.job_id.to_string(), initial_variables.clone(), cancel.clone(), events, self.credential_backend.clone());
      let pause = PauseController::new();
      let watcher = self.spawn_control_watcher(job.job_id, cancel.clone(), pause.clone(), cancel_poll_interval);
      let engine = Engine::new(&workflow, &self.node_registry, &pause, &metrics);

      let attempt_summary = match tokio::time::timeout(timeout, engine.run(&mut ctx, &job.job_id.to_string())).await {
        Ok(attempt_summary) => attempt_summary,
        Err(_) => {
          cancel.cancel();
          ExecutionSummary {
            status: TerminalStatus::TimedOut,
            error: Some(ErrorRecord::new(casare_node::ErrorKind::Timeout, "workflow exceeded its timeout")),
            variables: ctx.variables_snapshot(),
            executed_count: ctx.executed_node_count(),
            total_reachable: workflow.reachable_node_count(),
          }
        }
      };

      ctx.cleanup().await;
      self.orphans.kill_all().await?;
      watcher.abort();

      let will_retry = attempt_summary.status == TerminalStatus::Error && attempt < max_attempts;
      if will_retry {
        warn!(job_id = %job.job_id, attempt, max_attempts, "workflow failed, retrying the whole workflow");
      }
      summary = Some(attempt_summary);
      if !will_retry {
        break;
      }
    }

    self.job_cancels.lock().unwrap().remove(&job.job_id);
    slot.transition(LocalState::CleaningUp).await.ok();

    let outcome = summary_to_outcome(summary.expect("the attempt loop always runs at least once"));
    self.job_store.complete(job.job_id, self.robot_id, outcome).await?;
    Ok(())
  }

  /// Polls the job row so that state changes made through the API —
  /// cancellation, pause, resume — reach the engine actually running the
  /// workflow. `mark_paused`/`mark_resumed` themselves are called by
  /// whoever accepts the request (§6 `POST /jobs/:id/pause` et al.); this
  /// loop only reacts to what lands in the row.
  ///
  /// This is a poll, not a push: resume latency is bounded by
  /// `poll_interval` (the `cancel_poll_interval` passed in from
  /// `execute_job`), not by how fast `PauseController` itself can wake a
  /// waiter. §8 scenario 6's "resume causes NODE_STARTED(node 4) within
  /// 50 ms" only holds with a `poll_interval` at or below that bound; the
  /// default 2s poll interval does not meet it. A tighter bound needs a
  /// push path from the orchestrator's pause/resume handler straight into
  /// this process (e.g. the same LISTEN/NOTIFY channel §4.2 uses for
  /// claim wake-ups), which this agent does not wire up today.
  fn spawn_control_watcher(&self, job_id: Uuid, cancel: CancellationToken, pause: PauseController, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
    let job_store = self.job_store.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(poll_interval);
      loop {
        ticker.tick().await;
        if cancel.is_cancelled() {
          break;
        }
        match job_store.get(job_id).await {
          Ok(job) if job.state == JobState::Cancelled => {
            cancel.cancel();
            break;
          }
          Ok(job) if job.state == JobState::Paused => {
            pause.pause();
          }
          Ok(job) if job.state == JobState::Running => {
            pause.resume();
          }
          Ok(_) => {}
          Err(_) => break,
        }
      }
    })
  }
}

fn job_id_key(job: &Job) -> Uuid {
  job.job_id
}

/// Turn a finished run into the outcome written to the job row (§4.2
/// RUNNING → terminal). The result blob carries the final variables
/// snapshot plus a small progress summary; failures carry the error record.
fn summary_to_outcome(summary: ExecutionSummary) -> JobOutcome {
  let state = match summary.status {
    TerminalStatus::Success => JobState::Succeeded,
    TerminalStatus::Error => JobState::Failed,
    TerminalStatus::Cancelled => JobState::Cancelled,
    TerminalStatus::TimedOut => JobState::TimedOut,
  };

  let result = matches!(state, JobState::Succeeded).then(|| {
    serde_json::json!({
      "variables": summary.variables,
      "executed_count": summary.executed_count,
      "total_reachable": summary.total_reachable,
    })
  });

  let error = summary.error.map(|e| serde_json::to_value(e).unwrap_or(Value::Null));

  JobOutcome { state, result, error }
}
