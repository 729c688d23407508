use std::collections::HashMap;
use std::sync::Mutex;

/// Decides whether a job tagged with a tenant may be claimed right now
/// (§4.4 "Admission control"). Left pluggable per the open-question
/// decision: the orchestrator wires a concrete policy at startup, and
/// deployments can substitute their own.
pub trait AdmissionPolicy: Send + Sync {
  /// `None` tenant is always admitted — untagged jobs aren't subject to
  /// per-tenant quotas.
  fn admit(&self, tenant_id: Option<&str>) -> bool;

  fn on_claimed(&self, tenant_id: Option<&str>);

  fn on_terminal(&self, tenant_id: Option<&str>);
}

/// The default policy (§4.4): each tenant has a concurrency quota,
/// incremented on CLAIMED and decremented on any terminal transition.
pub struct PerTenantConcurrencyLimit {
  quota: u32,
  in_flight: Mutex<HashMap<String, u32>>,
}

impl PerTenantConcurrencyLimit {
  pub fn new(quota: u32) -> Self {
    Self { quota, in_flight: Mutex::new(HashMap::new()) }
  }
}

impl AdmissionPolicy for PerTenantConcurrencyLimit {
  fn admit(&self, tenant_id: Option<&str>) -> bool {
    let Some(tenant_id) = tenant_id else { return true };
    let in_flight = self.in_flight.lock().unwrap();
    in_flight.get(tenant_id).copied().unwrap_or(0) < self.quota
  }

  fn on_claimed(&self, tenant_id: Option<&str>) {
    let Some(tenant_id) = tenant_id else { return };
    let mut in_flight = self.in_flight.lock().unwrap();
    *in_flight.entry(tenant_id.to_string()).or_insert(0) += 1;
  }

  fn on_terminal(&self, tenant_id: Option<&str>) {
    let Some(tenant_id) = tenant_id else { return };
    let mut in_flight = self.in_flight.lock().unwrap();
    if let Some(count) = in_flight.get_mut(tenant_id) {
      *count = count.saturating_sub(1);
    }
  }
}

/// Admits everything; used where no tenant quotas are configured.
pub struct UnlimitedAdmission;

impl AdmissionPolicy for UnlimitedAdmission {
  fn admit(&self, _tenant_id: Option<&str>) -> bool {
    true
  }

  fn on_claimed(&self, _tenant_id: Option<&str>) {}

  fn on_terminal(&self, _tenant_id: Option<&str>) {}
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn untagged_jobs_are_always_admitted() {
    let policy = PerTenantConcurrencyLimit::new(0);
    assert!(policy.admit(None));
  }

  #[test]
  fn quota_blocks_once_exhausted_and_frees_on_terminal() {
    let policy = PerTenantConcurrencyLimit::new(1);
    assert!(policy.admit(Some("acme")));
    policy.on_claimed(Some("acme"));
    assert!(!policy.admit(Some("acme")));
    policy.on_terminal(Some("acme"));
    assert!(policy.admit(Some("acme")));
  }
}
