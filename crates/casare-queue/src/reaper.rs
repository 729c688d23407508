use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::store::JobStore;

/// Periodically reclaims jobs whose lease has expired (§4.2 "lease
/// renewal", P7). Runs until `cancel` fires; intended to be spawned once
/// per orchestrator process, not per-agent.
pub async fn run_lease_reaper(store: Arc<dyn JobStore>, interval: Duration, cancel: CancellationToken) {
  let mut ticker = tokio::time::interval(interval);
  loop {
    tokio::select! {
      _ = cancel.cancelled() => {
        info!("lease reaper stopping");
        break;
      }
      _ = ticker.tick() => {
        match store.reap_expired_leases().await {
          Ok(swept) if !swept.is_empty() => {
            info!(count = swept.len(), "reclaimed jobs with expired leases");
          }
          Ok(_) => {}
          Err(err) => warn!(error = %err, "lease reaper sweep failed"),
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::memory::InMemoryJobStore;
  use crate::types::{ClaimRequest, NewJob};
  use uuid::Uuid;

  #[tokio::test]
  async fn reaper_reclaims_an_expired_lease_on_its_first_tick() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let job = store.submit(NewJob::default()).await.unwrap();
    store
      .claim_next(&ClaimRequest { robot_id: Uuid::new_v4(), capabilities: Default::default(), tenant_id: None, lease_ttl_ms: -1 })
      .await
      .unwrap();

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let store_clone = store.clone();
    let handle = tokio::spawn(async move { run_lease_reaper(store_clone, Duration::from_millis(5), cancel_clone).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();
    handle.await.unwrap();

    let reloaded = store.get(job.job_id).await.unwrap();
    assert_eq!(reloaded.state, crate::types::JobState::Queued);
  }
}
