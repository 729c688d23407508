use thiserror::Error;

/// Errors raised while loading process configuration from the environment
/// (§6 Environment variables). Surfaced at the CLI boundary as exit code
/// [`crate::ExitCode::CONFIG_ERROR`].
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("missing required environment variable: {0}")]
  MissingVar(&'static str),

  #[error("invalid value for environment variable {var}: {message}")]
  InvalidVar { var: &'static str, message: String },
}
