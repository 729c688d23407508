use tokio::sync::watch;

/// The cooperative pause/resume signal the stepper checks at every node
/// boundary (§4.1.4). Modeled on the original's `asyncio.Event`: `pause()`
/// clears the flag, `resume()` sets it, and `wait_until_running` blocks
/// while it's clear. Pause is cooperative — an in-flight node plugin call
/// always completes (or times out) before the stepper re-checks.
#[derive(Clone)]
pub struct PauseController {
  tx: watch::Sender<bool>,
}

impl PauseController {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(true);
    Self { tx }
  }

  pub fn pause(&self) {
    let _ = self.tx.send(false);
  }

  pub fn resume(&self) {
    let _ = self.tx.send(true);
  }

  pub fn is_paused(&self) -> bool {
    !*self.tx.borrow()
  }

  /// Blocks until the controller is resumed. Returns immediately if it's
  /// already running.
  pub async fn wait_until_running(&self) {
    let mut rx = self.tx.subscribe();
    while !*rx.borrow() {
      if rx.changed().await.is_err() {
        break;
      }
    }
  }
}

impl Default for PauseController {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn starts_running_and_returns_immediately() {
    let controller = PauseController::new();
    assert!(!controller.is_paused());
    tokio::time::timeout(Duration::from_millis(50), controller.wait_until_running())
      .await
      .expect("should not block while running");
  }

  #[tokio::test]
  async fn pause_blocks_wait_until_resume() {
    let controller = PauseController::new();
    controller.pause();
    assert!(controller.is_paused());

    let waiter = controller.clone();
    let handle = tokio::spawn(async move {
      waiter.wait_until_running().await;
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!handle.is_finished());

    controller.resume();
    tokio::time::timeout(Duration::from_millis(100), handle)
      .await
      .expect("resume should unblock the waiter")
      .unwrap();
  }
}
