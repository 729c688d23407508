use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// Fine-grained local state around one job slot (§12, from the original's
/// `execution_lifecycle_manager.py`). The job row itself only ever shows
/// QUEUED/CLAIMED/RUNNING/PAUSED/terminal (§4.2) — this sits underneath
/// that, inside the agent process, to make pause/resume/stop race-free
/// against each other and against a concurrently-finishing job task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
  Idle,
  Starting,
  Running,
  Pausing,
  Paused,
  Resuming,
  Stopping,
  ForceStopping,
  CleaningUp,
  Error,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
  #[error("cannot move from {from:?} to {to:?}")]
  InvalidTransition { from: LocalState, to: LocalState },
}

const VALID_TRANSITIONS: &[(LocalState, LocalState)] = &[
  (LocalState::Idle, LocalState::Starting),
  (LocalState::Starting, LocalState::Running),
  (LocalState::Starting, LocalState::Error),
  (LocalState::Running, LocalState::Pausing),
  (LocalState::Running, LocalState::Stopping),
  (LocalState::Running, LocalState::Error),
  (LocalState::Running, LocalState::CleaningUp),
  (LocalState::Pausing, LocalState::Paused),
  (LocalState::Pausing, LocalState::Error),
  (LocalState::Paused, LocalState::Resuming),
  (LocalState::Paused, LocalState::Stopping),
  (LocalState::Resuming, LocalState::Running),
  (LocalState::Stopping, LocalState::ForceStopping),
  (LocalState::Stopping, LocalState::CleaningUp),
  (LocalState::ForceStopping, LocalState::CleaningUp),
  (LocalState::CleaningUp, LocalState::Idle),
  (LocalState::Error, LocalState::CleaningUp),
];

/// Guards one job slot's local state with an async lock, so a pause
/// request racing a job's own completion can't leave the slot in an
/// inconsistent state.
pub struct ExecutionLifecycleManager {
  state: Mutex<LocalState>,
}

impl ExecutionLifecycleManager {
  pub fn new() -> Self {
    Self { state: Mutex::new(LocalState::Idle) }
  }

  pub async fn current(&self) -> LocalState {
    *self.state.lock().await
  }

  pub async fn transition(&self, to: LocalState) -> Result<(), LifecycleError> {
    let mut guard = self.state.lock().await;
    if VALID_TRANSITIONS.contains(&(*guard, to)) {
      *guard = to;
      Ok(())
    } else {
      Err(LifecycleError::InvalidTransition { from: *guard, to })
    }
  }

  /// Claim this slot for a job that is about to start. If a prior session
  /// on this slot never made it back to `Idle` — it crashed mid-execution
  /// — forces it into `CleaningUp` instead of rejecting outright, mirroring
  /// `ExecutionLifecycleManager.start_workflow`'s `force_cleanup` path. The
  /// caller must run its own resource teardown and then call
  /// `finish_cleanup` before retrying `begin`.
  pub async fn begin(&self) -> Result<(), ()> {
    let mut guard = self.state.lock().await;
    match *guard {
      LocalState::Idle => {
        *guard = LocalState::Starting;
        Ok(())
      }
      other => {
        warn!(prior_state = ?other, "forcing cleanup of a stuck slot before starting a new job");
        *guard = LocalState::CleaningUp;
        Err(())
      }
    }
  }

  pub async fn finish_cleanup(&self) {
    let mut guard = self.state.lock().await;
    *guard = LocalState::Idle;
  }
}

impl Default for ExecutionLifecycleManager {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn normal_run_transitions_start_to_idle() {
    let manager = ExecutionLifecycleManager::new();
    manager.begin().await.unwrap();
    manager.transition(LocalState::Running).await.unwrap();
    manager.transition(LocalState::CleaningUp).await.unwrap();
    manager.finish_cleanup().await;
    assert_eq!(manager.current().await, LocalState::Idle);
  }

  #[tokio::test]
  async fn invalid_transition_is_rejected() {
    let manager = ExecutionLifecycleManager::new();
    let err = manager.transition(LocalState::Paused).await.unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { from: LocalState::Idle, to: LocalState::Paused }));
  }

  #[tokio::test]
  async fn stuck_slot_forces_cleanup_before_next_begin_succeeds() {
    let manager = ExecutionLifecycleManager::new();
    manager.begin().await.unwrap();
    manager.transition(LocalState::Running).await.unwrap();
    manager.transition(LocalState::Error).await.unwrap();

    assert!(manager.begin().await.is_err());
    assert_eq!(manager.current().await, LocalState::CleaningUp);

    manager.finish_cleanup().await;
    assert!(manager.begin().await.is_ok());
  }

  #[tokio::test]
  async fn pause_resume_round_trip() {
    let manager = ExecutionLifecycleManager::new();
    manager.begin().await.unwrap();
    manager.transition(LocalState::Running).await.unwrap();
    manager.transition(LocalState::Pausing).await.unwrap();
    manager.transition(LocalState::Paused).await.unwrap();
    manager.transition(LocalState::Resuming).await.unwrap();
    manager.transition(LocalState::Running).await.unwrap();
  }
}
