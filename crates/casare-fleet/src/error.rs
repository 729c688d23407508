use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FleetError {
  #[error("robot {0} is not registered")]
  UnknownRobot(Uuid),

  #[error("tenant '{0}' has exhausted its concurrency quota")]
  QuotaExhausted(String),

  #[error(transparent)]
  Database(#[from] sqlx::Error),
}
