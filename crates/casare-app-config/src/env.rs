use std::collections::HashSet;
use std::time::Duration;

use uuid::Uuid;

use crate::error::ConfigError;

fn read_var(name: &'static str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
  read_var(name).ok_or(ConfigError::MissingVar(name))
}

fn parse_u64_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
  match read_var(name) {
    None => Ok(default),
    Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
      var: name,
      message: format!("'{raw}' is not a non-negative integer"),
    }),
  }
}

/// Process configuration for the robot agent binary, loaded from the
/// environment (§6): `POSTGRES_URL`, `ROBOT_ID`, `ROBOT_CAPABILITIES`,
/// `HEARTBEAT_INTERVAL`, `LEASE_TTL`, `MAX_CONCURRENT_JOBS`, `VAULT_ADDR`.
#[derive(Debug, Clone)]
pub struct AgentConfig {
  pub postgres_url: String,
  pub robot_id: Uuid,
  /// Raw capability labels, comma-separated in `ROBOT_CAPABILITIES`. Kept
  /// as strings here — validating them against the closed vocabulary is
  /// `casare-fleet::Capability`'s job, not this crate's, since app-config
  /// sits below the domain crates in the dependency order.
  pub robot_capabilities: HashSet<String>,
  pub heartbeat_interval: Duration,
  pub lease_ttl: Duration,
  pub max_concurrent_jobs: u32,
  pub vault_addr: Option<String>,
}

impl AgentConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let postgres_url = require_var("POSTGRES_URL")?;

    let robot_id = match read_var("ROBOT_ID") {
      Some(raw) => Uuid::parse_str(&raw).map_err(|_| ConfigError::InvalidVar {
        var: "ROBOT_ID",
        message: format!("'{raw}' is not a valid UUID"),
      })?,
      None => Uuid::new_v4(),
    };

    let robot_capabilities = read_var("ROBOT_CAPABILITIES")
      .map(|raw| {
        raw
          .split(',')
          .map(|s| s.trim().to_string())
          .filter(|s| !s.is_empty())
          .collect()
      })
      .unwrap_or_default();

    let heartbeat_interval = Duration::from_secs(parse_u64_var("HEARTBEAT_INTERVAL", 30)?);
    let lease_ttl = Duration::from_secs(parse_u64_var("LEASE_TTL", 60)?);
    let max_concurrent_jobs = parse_u64_var("MAX_CONCURRENT_JOBS", 1)? as u32;
    let vault_addr = read_var("VAULT_ADDR");

    Ok(Self {
      postgres_url,
      robot_id,
      robot_capabilities,
      heartbeat_interval,
      lease_ttl,
      max_concurrent_jobs,
      vault_addr,
    })
  }
}

/// Process configuration for the orchestrator binary: `POSTGRES_URL` plus
/// the bearer secret robots authenticate with (`API_SECRET`, §4.6).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
  pub postgres_url: String,
  pub api_secret: Option<String>,
  pub bind_addr: String,
}

impl OrchestratorConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    Ok(Self {
      postgres_url: require_var("POSTGRES_URL")?,
      api_secret: read_var("API_SECRET"),
      bind_addr: read_var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  static ENV_LOCK: Mutex<()> = Mutex::new(());

  fn clear_agent_vars() {
    for var in [
      "POSTGRES_URL",
      "ROBOT_ID",
      "ROBOT_CAPABILITIES",
      "HEARTBEAT_INTERVAL",
      "LEASE_TTL",
      "MAX_CONCURRENT_JOBS",
      "VAULT_ADDR",
    ] {
      unsafe { std::env::remove_var(var) };
    }
  }

  #[test]
  fn missing_postgres_url_is_a_config_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_agent_vars();
    assert!(matches!(
      AgentConfig::from_env(),
      Err(ConfigError::MissingVar("POSTGRES_URL"))
    ));
  }

  #[test]
  fn defaults_apply_when_optional_vars_are_absent() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_agent_vars();
    unsafe { std::env::set_var("POSTGRES_URL", "postgres://localhost/casare") };
    let config = AgentConfig::from_env().unwrap();
    assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    assert_eq!(config.lease_ttl, Duration::from_secs(60));
    assert_eq!(config.max_concurrent_jobs, 1);
    assert!(config.robot_capabilities.is_empty());
    clear_agent_vars();
  }

  #[test]
  fn parses_comma_separated_capabilities() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_agent_vars();
    unsafe {
      std::env::set_var("POSTGRES_URL", "postgres://localhost/casare");
      std::env::set_var("ROBOT_CAPABILITIES", "browser, gpu,desktop");
    }
    let config = AgentConfig::from_env().unwrap();
    assert!(config.robot_capabilities.contains("browser"));
    assert!(config.robot_capabilities.contains("gpu"));
    assert!(config.robot_capabilities.contains("desktop"));
    clear_agent_vars();
  }

  #[test]
  fn rejects_non_numeric_heartbeat_interval() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_agent_vars();
    unsafe {
      std::env::set_var("POSTGRES_URL", "postgres://localhost/casare");
      std::env::set_var("HEARTBEAT_INTERVAL", "soon");
    }
    assert!(matches!(
      AgentConfig::from_env(),
      Err(ConfigError::InvalidVar { var: "HEARTBEAT_INTERVAL", .. })
    ));
    clear_agent_vars();
  }
}
