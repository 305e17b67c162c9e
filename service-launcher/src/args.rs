use clap::Parser;
use std::path::PathBuf;

use crate::config::{LauncherConfig, ReadinessMode};

/// Frees the dev ports, launches the services detached and checks they bind.
///
/// Everything is optional: without flags the compiled-in defaults, an
/// optional `launcher.toml` and `LAUNCHER_*` variables are used.
#[derive(Parser, Debug, Clone)]
#[command(name = "service-launcher", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML). Must exist when given.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory that relative service directories and the log file resolve against.
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Shared append-only log for all service output.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Seconds to wait after launching before probing ports.
    #[arg(long)]
    pub settle_secs: Option<f64>,

    /// Keep re-probing inactive ports after the settle delay instead of checking once.
    #[arg(long)]
    pub poll: bool,

    /// How long `--poll` keeps trying [default: 30].
    #[arg(long, requires = "poll")]
    pub poll_timeout_secs: Option<f64>,

    /// Interval between `--poll` attempts [default: 500].
    #[arg(long, requires = "poll")]
    pub poll_interval_ms: Option<u64>,
}

const DEFAULT_POLL_TIMEOUT_SECS: f64 = 30.0;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

impl Cli {
    /// Flags win over file and environment values.
    pub fn apply(&self, config: &mut LauncherConfig) {
        if let Some(dir) = &self.base_dir {
            config.base_dir = Some(dir.clone());
        }
        if let Some(path) = &self.log_file {
            config.log_file = path.clone();
        }
        if let Some(secs) = self.settle_secs {
            config.settle_delay_secs = secs;
        }
        if self.poll {
            config.readiness = ReadinessMode::Poll {
                interval_ms: self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
                timeout_secs: self.poll_timeout_secs.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            };
        }
    }
}
