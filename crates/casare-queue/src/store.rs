use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::QueueError;
use crate::types::{ClaimRequest, Heartbeat, Job, JobOutcome, JobState, NewJob};

/// Durable job storage (§4.2). Defined as a trait, mirroring
/// `fuschia-store::Store`, specifically so it can be faked in tests without
/// a live Postgres instance — see `InMemoryJobStore`.
#[async_trait]
pub trait JobStore: Send + Sync {
  async fn submit(&self, job: NewJob) -> Result<Job, QueueError>;

  async fn get(&self, job_id: Uuid) -> Result<Job, QueueError>;

  /// Atomically claim the highest-priority eligible QUEUED job for this
  /// robot (§4.2 claim protocol, P8). Returns `None` if nothing is
  /// eligible right now.
  async fn claim_next(&self, request: &ClaimRequest) -> Result<Option<Job>, QueueError>;

  /// Transition CLAIMED → RUNNING, setting `started_at` (§4.2).
  async fn mark_running(&self, job_id: Uuid, robot_id: Uuid) -> Result<(), QueueError>;

  async fn mark_paused(&self, job_id: Uuid, robot_id: Uuid) -> Result<(), QueueError>;

  async fn mark_resumed(&self, job_id: Uuid, robot_id: Uuid) -> Result<(), QueueError>;

  /// Write a terminal (or re-queueing, on FAILED-with-attempts-remaining)
  /// outcome, gated by the lease (Q1). Returns `Ok(false)` without error if
  /// the lease had already moved on — the caller lost the race to the
  /// reaper and should not treat this as a hard failure.
  async fn complete(&self, job_id: Uuid, robot_id: Uuid, outcome: JobOutcome) -> Result<bool, QueueError>;

  /// Renew the lease of every job in `heartbeat.running_job_ids` held by
  /// `heartbeat.robot_id` (§4.3 heartbeat).
  async fn renew_leases(&self, heartbeat: &Heartbeat) -> Result<(), QueueError>;

  /// Request cancellation of a non-terminal job (§4.6
  /// `POST /jobs/:id/cancel`). If currently assigned, the agent observes
  /// this via its own poll of the job row; if unassigned, it is cancelled
  /// outright here.
  async fn request_cancel(&self, job_id: Uuid) -> Result<(), QueueError>;

  /// Sweep CLAIMED/RUNNING/PAUSED jobs whose lease has expired: return
  /// those under `max_attempts` to QUEUED (incrementing `attempt_count`),
  /// terminally FAIL the rest with kind `LEASE_EXPIRED` (§4.2, P7).
  async fn reap_expired_leases(&self) -> Result<Vec<Uuid>, QueueError>;

  /// Count of jobs in CLAIMED/RUNNING/PAUSED for a tenant, used by
  /// admission control (§4.4).
  async fn tenant_in_flight(&self, tenant_id: &str) -> Result<u32, QueueError>;

  /// Set (or, with `None`, clear) a tenant's concurrency quota. `claim_next`
  /// consults this to hold a tenant's jobs in QUEUED once its in-flight
  /// count reaches the cap (§4.4 admission control).
  async fn set_tenant_quota(&self, tenant_id: &str, max_concurrent_jobs: Option<u32>) -> Result<(), QueueError>;

  /// Count of jobs per state, for `GET /stats` (spec.md "clients can
  /// observe queue depth via `/stats`").
  async fn queue_depth(&self) -> Result<Vec<(JobState, u32)>, QueueError>;

  /// Every job not yet in a terminal state, for the orchestrator's event
  /// poller (§6 event stream) — there is no Postgres LISTEN/NOTIFY wiring
  /// here, so the poller diffs snapshots of this against what it saw last.
  async fn list_active(&self) -> Result<Vec<Job>, QueueError>;
}

/// Postgres-backed `JobStore` (§4.2, §6 job table schema).
pub struct PgJobStore {
  pool: PgPool,
}

impl PgJobStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }
}

const JOB_COLUMNS: &str = "job_id, workflow, inputs, priority, state, assigned_robot_id, \
  lease_expires_at, claimed_at, started_at, finished_at, attempt_count, max_attempts, \
  required_capabilities, tenant_id, result, error, created_at";

#[async_trait]
impl JobStore for PgJobStore {
  async fn submit(&self, job: NewJob) -> Result<Job, QueueError> {
    let capabilities: Vec<String> = job.required_capabilities.into_iter().collect();
    let row = sqlx::query_as::<_, Job>(&format!(
      r#"
      INSERT INTO jobs (job_id, workflow, inputs, priority, state, attempt_count, max_attempts, required_capabilities, tenant_id, created_at)
      VALUES ($1, $2, $3, $4, 'queued', 0, $5, $6, $7, $8)
      RETURNING {JOB_COLUMNS}
      "#
    ))
    .bind(Uuid::new_v4())
    .bind(Json(job.workflow))
    .bind(Json(job.inputs))
    .bind(job.priority)
    .bind(job.max_attempts)
    .bind(&capabilities)
    .bind(job.tenant_id)
    .bind(Utc::now())
    .fetch_one(&self.pool)
    .await?;
    Ok(row)
  }

  async fn get(&self, job_id: Uuid) -> Result<Job, QueueError> {
    sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1"))
      .bind(job_id)
      .fetch_optional(&self.pool)
      .await?
      .ok_or(QueueError::NotFound(job_id))
  }

  async fn claim_next(&self, request: &ClaimRequest) -> Result<Option<Job>, QueueError> {
    let capabilities: Vec<String> = request.capabilities.iter().cloned().collect();
    let row = sqlx::query_as::<_, Job>(&format!(
      r#"
      UPDATE jobs
      SET state = 'claimed', assigned_robot_id = $1, lease_expires_at = now() + ($2 || ' milliseconds')::interval, claimed_at = now()
      WHERE job_id = (
        SELECT j.job_id FROM jobs j
        WHERE j.state = 'queued'
          AND j.required_capabilities <@ $3
          AND (j.tenant_id IS NULL OR j.tenant_id = $4)
          AND (j.tenant_id IS NULL OR NOT EXISTS (
            SELECT 1 FROM tenant_quotas q
            WHERE q.tenant_id = j.tenant_id
              AND q.max_concurrent_jobs <= (
                SELECT count(*) FROM jobs j2
                WHERE j2.tenant_id = j.tenant_id AND j2.state IN ('claimed', 'running', 'paused')
              )
          ))
        ORDER BY j.priority DESC, j.created_at ASC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
      )
      RETURNING {JOB_COLUMNS}
      "#
    ))
    .bind(request.robot_id)
    .bind(request.lease_ttl_ms.to_string())
    .bind(&capabilities)
    .bind(&request.tenant_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(row)
  }

  async fn mark_running(&self, job_id: Uuid, robot_id: Uuid) -> Result<(), QueueError> {
    sqlx::query(
      r#"
      UPDATE jobs SET state = 'running', started_at = now()
      WHERE job_id = $1 AND assigned_robot_id = $2 AND lease_expires_at > now()
      "#,
    )
    .bind(job_id)
    .bind(robot_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn mark_paused(&self, job_id: Uuid, robot_id: Uuid) -> Result<(), QueueError> {
    sqlx::query(
      r#"UPDATE jobs SET state = 'paused' WHERE job_id = $1 AND assigned_robot_id = $2 AND lease_expires_at > now()"#,
    )
    .bind(job_id)
    .bind(robot_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn mark_resumed(&self, job_id: Uuid, robot_id: Uuid) -> Result<(), QueueError> {
    sqlx::query(
      r#"UPDATE jobs SET state = 'running' WHERE job_id = $1 AND assigned_robot_id = $2 AND lease_expires_at > now()"#,
    )
    .bind(job_id)
    .bind(robot_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn complete(&self, job_id: Uuid, robot_id: Uuid, outcome: JobOutcome) -> Result<bool, QueueError> {
    let result = match outcome.state {
      JobState::Failed => {
        let row = sqlx::query_as::<_, Job>(&format!(
          r#"
          UPDATE jobs
          SET attempt_count = attempt_count + 1
          WHERE job_id = $1 AND assigned_robot_id = $2 AND lease_expires_at > now()
          RETURNING {JOB_COLUMNS}
          "#
        ))
        .bind(job_id)
        .bind(robot_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(job) = row else { return Ok(false) };

        if job.attempt_count < job.max_attempts {
          sqlx::query(
            r#"
            UPDATE jobs SET state = 'queued', assigned_robot_id = NULL, lease_expires_at = NULL, error = $2
            WHERE job_id = $1
            "#,
          )
          .bind(job_id)
          .bind(outcome.error.map(Json))
          .execute(&self.pool)
          .await?;
        } else {
          sqlx::query(
            r#"
            UPDATE jobs SET state = 'failed', error = $2, finished_at = now()
            WHERE job_id = $1
            "#,
          )
          .bind(job_id)
          .bind(outcome.error.map(Json))
          .execute(&self.pool)
          .await?;
        }
        true
      }
      terminal => {
        let affected = sqlx::query(
          r#"
          UPDATE jobs SET state = $3, result = $4, error = $5, finished_at = now()
          WHERE job_id = $1 AND assigned_robot_id = $2 AND lease_expires_at > now()
          "#,
        )
        .bind(job_id)
        .bind(robot_id)
        .bind(terminal)
        .bind(outcome.result.map(Json))
        .bind(outcome.error.map(Json))
        .execute(&self.pool)
        .await?
        .rows_affected();
        affected > 0
      }
    };
    Ok(result)
  }

  async fn renew_leases(&self, heartbeat: &Heartbeat) -> Result<(), QueueError> {
    if heartbeat.running_job_ids.is_empty() {
      return Ok(());
    }
    sqlx::query(
      r#"
      UPDATE jobs SET lease_expires_at = now() + ($2 || ' milliseconds')::interval
      WHERE assigned_robot_id = $1 AND job_id = ANY($3) AND state IN ('claimed', 'running', 'paused')
      "#,
    )
    .bind(heartbeat.robot_id)
    .bind(heartbeat.lease_ttl_ms.to_string())
    .bind(&heartbeat.running_job_ids)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn request_cancel(&self, job_id: Uuid) -> Result<(), QueueError> {
    sqlx::query(
      r#"
      UPDATE jobs SET state = 'cancelled', finished_at = now()
      WHERE job_id = $1 AND state NOT IN ('succeeded', 'failed', 'cancelled', 'timed_out')
      "#,
    )
    .bind(job_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn reap_expired_leases(&self) -> Result<Vec<Uuid>, QueueError> {
    let requeued: Vec<(Uuid,)> = sqlx::query_as(
      r#"
      UPDATE jobs
      SET state = 'queued', assigned_robot_id = NULL, lease_expires_at = NULL, attempt_count = attempt_count + 1
      WHERE state IN ('claimed', 'running', 'paused') AND lease_expires_at < now() AND attempt_count < max_attempts
      RETURNING job_id
      "#,
    )
    .fetch_all(&self.pool)
    .await?;

    let failed: Vec<(Uuid,)> = sqlx::query_as(
      r#"
      UPDATE jobs
      SET state = 'failed', finished_at = now(), error = jsonb_build_object('kind', 'LEASE_EXPIRED', 'message', 'lease expired and max attempts exhausted')
      WHERE state IN ('claimed', 'running', 'paused') AND lease_expires_at < now() AND attempt_count >= max_attempts
      RETURNING job_id
      "#,
    )
    .fetch_all(&self.pool)
    .await?;

    Ok(requeued.into_iter().chain(failed).map(|(id,)| id).collect())
  }

  async fn tenant_in_flight(&self, tenant_id: &str) -> Result<u32, QueueError> {
    let (count,): (i64,) = sqlx::query_as(
      r#"SELECT COUNT(*) FROM jobs WHERE tenant_id = $1 AND state IN ('claimed', 'running', 'paused')"#,
    )
    .bind(tenant_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(count as u32)
  }

  async fn set_tenant_quota(&self, tenant_id: &str, max_concurrent_jobs: Option<u32>) -> Result<(), QueueError> {
    match max_concurrent_jobs {
      Some(quota) => {
        sqlx::query(
          r#"
          INSERT INTO tenant_quotas (tenant_id, max_concurrent_jobs)
          VALUES ($1, $2)
          ON CONFLICT (tenant_id) DO UPDATE SET max_concurrent_jobs = EXCLUDED.max_concurrent_jobs
          "#,
        )
        .bind(tenant_id)
        .bind(quota as i32)
        .execute(&self.pool)
        .await?;
      }
      None => {
        sqlx::query("DELETE FROM tenant_quotas WHERE tenant_id = $1").bind(tenant_id).execute(&self.pool).await?;
      }
    }
    Ok(())
  }

  async fn queue_depth(&self) -> Result<Vec<(JobState, u32)>, QueueError> {
    let rows: Vec<(JobState, i64)> = sqlx::query_as(r#"SELECT state, COUNT(*) FROM jobs GROUP BY state"#).fetch_all(&self.pool).await?;
    Ok(rows.into_iter().map(|(state, count)| (state, count as u32)).collect())
  }

  async fn list_active(&self) -> Result<Vec<Job>, QueueError> {
    let jobs = sqlx::query_as::<_, Job>(&format!(
      "SELECT {JOB_COLUMNS} FROM jobs WHERE state NOT IN ('succeeded', 'failed', 'cancelled', 'timed_out')"
    ))
    .fetch_all(&self.pool)
    .await?;
    Ok(jobs)
  }
}
