use std::path::PathBuf;
use thiserror::Error;

/// OS-level refusal to create a service process.
///
/// Everything here is discovered synchronously while issuing the launch.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The configured working directory does not exist or is not a directory.
    #[error("Working directory {path} for service '{service}' does not exist")]
    MissingWorkingDirectory { service: String, path: PathBuf },

    /// The service was configured with nothing to run.
    #[error("Service '{0}' has an empty command")]
    EmptyCommand(String),

    /// The OS rejected process creation (missing executable, permissions, ...).
    #[error("Failed to spawn service '{service}': {source}")]
    Spawn {
        service: String,
        source: std::io::Error,
    },

    /// The log handle could not be shared with the child.
    #[error("Failed to attach log to service '{service}': {source}")]
    LogAttach {
        service: String,
        source: std::io::Error,
    },
}

impl LaunchError {
    pub fn service(&self) -> &str {
        match self {
            LaunchError::MissingWorkingDirectory { service, .. }
            | LaunchError::Spawn { service, .. }
            | LaunchError::LogAttach { service, .. } => service,
            LaunchError::EmptyCommand(service) => service,
        }
    }
}

/// Failure to discover or terminate the owner of a port. Never fatal.
#[derive(Error, Debug)]
pub enum ReapError {
    /// The owner lookup tool could not be run or produced garbage.
    #[error("Could not discover owners of port {port}: {reason}")]
    Discovery { port: u16, reason: String },

    /// The kill signal was refused for a reason other than the process being gone.
    #[error("Failed to kill PID {pid}: {source}")]
    Signal { pid: u32, source: std::io::Error },
}

/// Top level error type for a launcher run.
#[derive(Error, Debug)]
pub enum LauncherError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    /// Configuration loaded but is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The shared service log could not be opened or written.
    #[error("Service log {path} unavailable: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl LauncherError {
    /// Process exit code for a run that could not get as far as launching.
    ///
    /// Distinct from the code of a run whose required launch failed (1).
    pub fn exit_code(&self) -> u8 {
        match self {
            LauncherError::Config(_) | LauncherError::InvalidConfig(_) => 2,
            LauncherError::LogFile { .. } => 2,
        }
    }
}

/// A specialized Result type for launcher operations.
pub type Result<T> = std::result::Result<T, LauncherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_failures_exit_2() {
        let errors = [
            LauncherError::Config(::config::ConfigError::NotFound("launcher.toml".into())),
            LauncherError::InvalidConfig("services must not be empty".into()),
            LauncherError::LogFile {
                path: PathBuf::from("/nope/service_log.txt"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
        ];
        for e in &errors {
            assert_eq!(e.exit_code(), 2, "{}", e);
        }
    }
}
