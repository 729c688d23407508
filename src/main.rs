use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use casare_app_config::ExitCode;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// CasareRPA - distributed RPA workflow execution
#[derive(Parser)]
#[command(name = "casare")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a robot agent process: polls the queue, executes workflows,
  /// reports heartbeats (§4.3). Configured entirely from the environment.
  Agent,

  /// Run the orchestrator: the HTTP/WS API, override application, and
  /// admission control (§6). Configured entirely from the environment.
  Orchestrator,
}

/// Exit-code contract for this binary (§6): 0 normal, 1 config error, 2
/// vault unreachable at startup, 3 DB unreachable at startup, 130 on
/// SIGINT. A graceful shutdown that was *requested* via SIGINT always
/// reports 130, even though the run future itself returns `Ok`.
fn main() {
  tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

  let cli = Cli::parse();
  let rt = match tokio::runtime::Runtime::new() {
    Ok(rt) => rt,
    Err(err) => {
      error!(error = %err, "failed to start tokio runtime");
      std::process::exit(ExitCode::CONFIG_ERROR);
    }
  };

  let sigint_received = Arc::new(AtomicBool::new(false));
  let result = match cli.command {
    Commands::Agent => rt.block_on(run_agent(sigint_received.clone())),
    Commands::Orchestrator => rt.block_on(run_orchestrator(sigint_received.clone())),
  };

  let exit_code = if sigint_received.load(Ordering::SeqCst) {
    ExitCode::SIGINT
  } else {
    match result {
      Ok(()) => ExitCode::NORMAL,
      Err(err) => {
        error!(error = %err, "process exited with an error");
        exit_code_for(&err)
      }
    }
  };
  std::process::exit(exit_code);
}

/// Downcasts an `anyhow::Error` back to the library error type it was
/// built from so the binary boundary can still report the exact §6 exit
/// code, even though everything above this point is plain `anyhow`.
fn exit_code_for(err: &anyhow::Error) -> i32 {
  if err.downcast_ref::<casare_app_config::ConfigError>().is_some() {
    return ExitCode::CONFIG_ERROR;
  }
  match err.downcast_ref::<casare_agent::AgentError>() {
    Some(casare_agent::AgentError::Config(_)) => ExitCode::CONFIG_ERROR,
    Some(casare_agent::AgentError::VaultUnreachable { .. }) => ExitCode::VAULT_UNREACHABLE,
    Some(casare_agent::AgentError::DbUnreachable(_)) => ExitCode::DB_UNREACHABLE,
    Some(_) => ExitCode::CONFIG_ERROR,
    None => ExitCode::CONFIG_ERROR,
  }
}

async fn run_agent(sigint_received: Arc<AtomicBool>) -> Result<()> {
  let config = casare_app_config::AgentConfig::from_env()?;
  let shutdown = CancellationToken::new();
  spawn_signal_watcher(shutdown.clone(), sigint_received);
  casare_agent::run(config, shutdown).await?;
  Ok(())
}

async fn run_orchestrator(sigint_received: Arc<AtomicBool>) -> Result<()> {
  let config = casare_app_config::OrchestratorConfig::from_env()?;
  let shutdown = CancellationToken::new();
  spawn_signal_watcher(shutdown.clone(), sigint_received);
  casare_orchestrator::run(config, shutdown).await?;
  Ok(())
}

fn spawn_signal_watcher(shutdown: CancellationToken, sigint_received: Arc<AtomicBool>) {
  tokio::spawn(async move {
    let _ = tokio::signal::ctrl_c().await;
    sigint_received.store(true, Ordering::SeqCst);
    shutdown.cancel();
  });
}
