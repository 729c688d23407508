mod admission;
mod error;
mod memory;
mod override_rule;
mod robot;
mod store;

pub use admission::{AdmissionPolicy, PerTenantConcurrencyLimit, UnlimitedAdmission};
pub use error::FleetError;
pub use memory::InMemoryRobotStore;
pub use override_rule::{NodeOverride, OverrideTable};
pub use robot::{Capability, Robot, RobotHeartbeat, RobotStatus, DEFAULT_HEARTBEAT_TIMEOUT_SECS};
pub use store::{PgRobotStore, RobotStore};
