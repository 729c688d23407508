/// Process exit codes for the robot agent CLI (§6).
///
/// The orchestrator binary uses only `NORMAL` and `CONFIG_ERROR` — the
/// vault/DB-unreachable-at-startup codes are specific to the agent, which is
/// the process required to have both reachable before it starts claiming
/// jobs.
pub struct ExitCode;

impl ExitCode {
  pub const NORMAL: i32 = 0;
  pub const CONFIG_ERROR: i32 = 1;
  pub const VAULT_UNREACHABLE: i32 = 2;
  pub const DB_UNREACHABLE: i32 = 3;
  pub const SIGINT: i32 = 130;
}
