use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AgentError;

const KILL_GRACE: Duration = Duration::from_secs(5);

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
  nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<(), String> {
  nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), nix::sys::signal::Signal::SIGTERM).map_err(|e| e.to_string())
}

#[cfg(unix)]
fn force_kill(pid: u32) -> Result<(), String> {
  nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), nix::sys::signal::Signal::SIGKILL).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
  false
}

#[cfg(not(unix))]
fn terminate(_pid: u32) -> Result<(), String> {
  Ok(())
}

#[cfg(not(unix))]
fn force_kill(_pid: u32) -> Result<(), String> {
  Ok(())
}

/// Tracks OS process IDs of child processes a job task spawns (notably
/// browser instances, §4.3 "Orphan cleanup"). Persisted to a local file so
/// a crashed agent's children can be swept up by the next run of the same
/// agent.
pub struct OrphanTracker {
  path: PathBuf,
  pids: Mutex<HashSet<u32>>,
}

impl OrphanTracker {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      pids: Mutex::new(HashSet::new()),
    }
  }

  /// Inspect any PIDs recorded from a prior crashed run and kill the ones
  /// still alive (§4.3 "On agent startup"). Safe to call even if the file
  /// doesn't exist yet.
  pub fn reap_from_previous_run(&self) -> Result<(), AgentError> {
    let recorded = match std::fs::read_to_string(&self.path) {
      Ok(contents) => contents,
      Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
      Err(err) => return Err(AgentError::OrphanFile { path: self.path.display().to_string(), source: err }),
    };

    for line in recorded.lines() {
      let Ok(pid) = line.trim().parse::<u32>() else { continue };
      if process_alive(pid) {
        warn!(pid, "killing orphaned process left by a prior crashed run");
        self.kill_blocking(pid);
      }
    }

    self.persist()
  }

  pub fn register(&self, pid: u32) -> Result<(), AgentError> {
    self.pids.lock().unwrap().insert(pid);
    self.persist()
  }

  pub fn forget(&self, pid: u32) -> Result<(), AgentError> {
    self.pids.lock().unwrap().remove(&pid);
    self.persist()
  }

  /// Terminate every tracked process (`ExecutionContext` teardown, §4.3):
  /// SIGTERM, up to 5s grace, then SIGKILL if it's still alive.
  pub async fn kill_all(&self) -> Result<(), AgentError> {
    let pids: Vec<u32> = self.pids.lock().unwrap().iter().copied().collect();
    for pid in pids {
      self.kill(pid).await;
      self.forget(pid)?;
    }
    Ok(())
  }

  async fn kill(&self, pid: u32) {
    if let Err(err) = terminate(pid) {
      warn!(pid, error = %err, "SIGTERM failed, process likely already gone");
      return;
    }
    let deadline = tokio::time::Instant::now() + KILL_GRACE;
    while tokio::time::Instant::now() < deadline {
      if !process_alive(pid) {
        return;
      }
      tokio::time::sleep(Duration::from_millis(200)).await;
    }
    if process_alive(pid) {
      info!(pid, "process survived SIGTERM grace period, sending SIGKILL");
      let _ = force_kill(pid);
    }
  }

  /// Synchronous variant for the startup sweep, which runs before the
  /// agent's own tokio runtime work has anything else to interleave with.
  fn kill_blocking(&self, pid: u32) {
    if terminate(pid).is_err() {
      return;
    }
    let deadline = std::time::Instant::now() + KILL_GRACE;
    while std::time::Instant::now() < deadline {
      if !process_alive(pid) {
        return;
      }
      std::thread::sleep(Duration::from_millis(200));
    }
    if process_alive(pid) {
      let _ = force_kill(pid);
    }
  }

  fn persist(&self) -> Result<(), AgentError> {
    let pids = self.pids.lock().unwrap();
    let contents = pids.iter().map(|p| p.to_string()).collect::<Vec<_>>().join("\n");
    std::fs::write(&self.path, contents).map_err(|source| AgentError::OrphanFile { path: self.path.display().to_string(), source })
  }

  #[cfg(test)]
  pub fn path(&self) -> &Path {
    &self.path
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn register_persists_to_disk_and_forget_removes_it() {
    let dir = std::env::temp_dir().join(format!("casare-agent-orphan-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let tracker = OrphanTracker::new(dir.join("orphans.txt"));

    tracker.register(424242).unwrap();
    let contents = std::fs::read_to_string(tracker.path()).unwrap();
    assert!(contents.contains("424242"));

    tracker.forget(424242).unwrap();
    let contents = std::fs::read_to_string(tracker.path()).unwrap();
    assert!(!contents.contains("424242"));

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn reap_with_no_file_is_a_no_op() {
    let dir = std::env::temp_dir().join(format!("casare-agent-orphan-test-missing-{}", std::process::id()));
    let tracker = OrphanTracker::new(dir.join("orphans.txt"));
    tracker.reap_from_previous_run().unwrap();
  }
}
