//! CasareRPA durable job queue.
//!
//! A Postgres-backed implementation of the §4.2 job state machine: atomic
//! claim with `SKIP LOCKED`, lease renewal, a background lease reaper, and
//! per-tenant in-flight counts for admission control. The `JobStore` trait
//! is the seam — `PgJobStore` is the real backend, `InMemoryJobStore` is a
//! fake usable in tests without a live database.

mod error;
mod memory;
mod reaper;
mod store;
mod types;

pub use error::QueueError;
pub use memory::InMemoryJobStore;
pub use reaper::run_lease_reaper;
pub use store::{JobStore, PgJobStore};
pub use types::{ClaimRequest, Heartbeat, Job, JobOutcome, JobState, NewJob, TenantConcurrency};
