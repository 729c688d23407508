use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::FleetError;
use crate::robot::{Robot, RobotHeartbeat, RobotStatus};

/// Durable robot fleet storage (§3 Robot, §5 "single-row upserts keyed by
/// robot-id"). A trait for the same reason `casare_queue::JobStore` is one:
/// so it can be faked in tests without a live Postgres instance.
#[async_trait]
pub trait RobotStore: Send + Sync {
  async fn heartbeat(&self, heartbeat: RobotHeartbeat) -> Result<Robot, FleetError>;

  async fn get(&self, robot_id: Uuid) -> Result<Robot, FleetError>;

  /// Fleet listing for `GET /robots` (§4.6). Implementations recompute
  /// `status` against the heartbeat timeout at read time rather than
  /// trusting the stored value.
  async fn list(&self) -> Result<Vec<Robot>, FleetError>;

  async fn set_status(&self, robot_id: Uuid, status: RobotStatus) -> Result<(), FleetError>;
}

/// Postgres-backed `RobotStore` (§6 job table schema's `robots` table).
pub struct PgRobotStore {
  pool: PgPool,
  heartbeat_timeout_secs: i64,
}

impl PgRobotStore {
  pub fn new(pool: PgPool) -> Self {
    Self::with_heartbeat_timeout(pool, crate::robot::DEFAULT_HEARTBEAT_TIMEOUT_SECS)
  }

  pub fn with_heartbeat_timeout(pool: PgPool, heartbeat_timeout_secs: i64) -> Self {
    Self { pool, heartbeat_timeout_secs }
  }
}

#[derive(sqlx::FromRow)]
struct RobotRow {
  robot_id: Uuid,
  name: String,
  capabilities: Vec<String>,
  tags: Vec<String>,
  max_concurrent_jobs: i32,
  environment: Option<String>,
  last_heartbeat_at: DateTime<Utc>,
  status: String,
  current_job_count: i32,
  tenant_scope: Option<String>,
}

fn status_to_text(status: RobotStatus) -> &'static str {
  match status {
    RobotStatus::Online => "online",
    RobotStatus::Busy => "busy",
    RobotStatus::Offline => "offline",
    RobotStatus::Error => "error",
    RobotStatus::Maintenance => "maintenance",
  }
}

fn status_from_text(text: &str) -> RobotStatus {
  match text {
    "busy" => RobotStatus::Busy,
    "offline" => RobotStatus::Offline,
    "error" => RobotStatus::Error,
    "maintenance" => RobotStatus::Maintenance,
    _ => RobotStatus::Online,
  }
}

impl From<RobotRow> for Robot {
  fn from(row: RobotRow) -> Self {
    Robot {
      robot_id: row.robot_id,
      name: row.name,
      capabilities: row.capabilities.into_iter().collect(),
      tags: row.tags.into_iter().collect(),
      max_concurrent_jobs: row.max_concurrent_jobs as u32,
      environment: row.environment,
      last_heartbeat_at: row.last_heartbeat_at,
      status: status_from_text(&row.status),
      current_job_count: row.current_job_count as u32,
      tenant_scope: row.tenant_scope,
    }
  }
}

const ROBOT_COLUMNS: &str = "robot_id, name, capabilities, tags, max_concurrent_jobs, environment, \
  last_heartbeat_at, status, current_job_count, tenant_scope";

#[async_trait]
impl RobotStore for PgRobotStore {
  async fn heartbeat(&self, heartbeat: RobotHeartbeat) -> Result<Robot, FleetError> {
    let capabilities: Vec<String> = heartbeat.capabilities.into_iter().collect();
    let tags: Vec<String> = heartbeat.tags.into_iter().collect();
    let row = sqlx::query_as::<_, RobotRow>(&format!(
      r#"
      INSERT INTO robots (robot_id, name, capabilities, tags, max_concurrent_jobs, environment, last_heartbeat_at, status, current_job_count, tenant_scope)
      VALUES ($1, $2, $3, $4, $5, $6, now(), 'online', $7, $8)
      ON CONFLICT (robot_id) DO UPDATE SET
        name = EXCLUDED.name,
        capabilities = EXCLUDED.capabilities,
        tags = EXCLUDED.tags,
        max_concurrent_jobs = EXCLUDED.max_concurrent_jobs,
        environment = EXCLUDED.environment,
        last_heartbeat_at = now(),
        current_job_count = EXCLUDED.current_job_count,
        tenant_scope = EXCLUDED.tenant_scope
      RETURNING {ROBOT_COLUMNS}
      "#
    ))
    .bind(heartbeat.robot_id)
    .bind(heartbeat.name)
    .bind(&capabilities)
    .bind(&tags)
    .bind(heartbeat.max_concurrent_jobs as i32)
    .bind(heartbeat.environment)
    .bind(heartbeat.current_job_count as i32)
    .bind(heartbeat.tenant_scope)
    .fetch_one(&self.pool)
    .await
    .map_err(FleetError::Database)?;
    Ok(row.into())
  }

  async fn get(&self, robot_id: Uuid) -> Result<Robot, FleetError> {
    let row = sqlx::query_as::<_, RobotRow>(&format!("SELECT {ROBOT_COLUMNS} FROM robots WHERE robot_id = $1"))
      .bind(robot_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(FleetError::Database)?
      .ok_or(FleetError::UnknownRobot(robot_id))?;
    Ok(row.into())
  }

  async fn list(&self) -> Result<Vec<Robot>, FleetError> {
    let rows = sqlx::query_as::<_, RobotRow>(&format!("SELECT {ROBOT_COLUMNS} FROM robots"))
      .fetch_all(&self.pool)
      .await
      .map_err(FleetError::Database)?;
    let now = Utc::now();
    Ok(
      rows
        .into_iter()
        .map(Robot::from)
        .map(|mut robot| {
          robot.status = robot.effective_status(now, self.heartbeat_timeout_secs);
          robot
        })
        .collect(),
    )
  }

  async fn set_status(&self, robot_id: Uuid, status: RobotStatus) -> Result<(), FleetError> {
    let affected = sqlx::query("UPDATE robots SET status = $2 WHERE robot_id = $1")
      .bind(robot_id)
      .bind(status_to_text(status))
      .execute(&self.pool)
      .await
      .map_err(FleetError::Database)?
      .rows_affected();
    if affected == 0 {
      return Err(FleetError::UnknownRobot(robot_id));
    }
    Ok(())
  }
}
