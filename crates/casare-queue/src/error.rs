use thiserror::Error;
use uuid::Uuid;

/// Error type for queue operations (§4.2, §4.4).
#[derive(Debug, Error)]
pub enum QueueError {
  #[error("job {0} not found")]
  NotFound(Uuid),

  /// Raised by a caller-side assertion, never by the claim query itself:
  /// every lease-guarded UPDATE is already scoped by
  /// `assigned_robot_id = $me AND lease_expires_at > now` (Q1), so a stale
  /// write silently affects zero rows rather than erroring — callers that
  /// need to know check `rows_affected()` and surface this instead.
  #[error("job {job_id} is not held by robot {robot_id} (lease expired or reassigned)")]
  LeaseNotHeld { job_id: Uuid, robot_id: Uuid },

  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}
