use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LauncherError, Result};
use crate::process::models::Port;

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "launcher.toml";

/// Prefix for environment overrides, e.g. `LAUNCHER_SETTLE_DELAY_SECS=2`.
pub const ENV_PREFIX: &str = "LAUNCHER";

fn default_required() -> bool {
    true
}

/// What to execute for a service.
///
/// A plain string is handed to `sh -c`; an array is exec'd as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Shell(String),
    Argv(Vec<String>),
}

impl CommandLine {
    pub fn shell(line: impl Into<String>) -> Self {
        CommandLine::Shell(line.into())
    }

    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::Argv(args.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CommandLine::Shell(line) => line.trim().is_empty(),
            CommandLine::Argv(args) => args.first().map_or(true, |p| p.is_empty()),
        }
    }

    /// Program and arguments as they will be passed to the OS.
    pub fn program_and_args(&self) -> (&str, Vec<&str>) {
        match self {
            CommandLine::Shell(line) => ("sh", vec!["-c", line.as_str()]),
            CommandLine::Argv(args) => match args.split_first() {
                Some((program, rest)) => {
                    (program.as_str(), rest.iter().map(String::as_str).collect())
                }
                None => ("", Vec::new()),
            },
        }
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandLine::Shell(line) => write!(f, "{}", line),
            CommandLine::Argv(args) => write!(f, "{}", args.join(" ")),
        }
    }
}

/// Immutable description of one service to launch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSpec {
    name: String,
    command: CommandLine,
    working_directory: PathBuf,
    port: Port,
    /// A failed launch of a required service aborts the run.
    #[serde(default = "default_required")]
    required: bool,
}

impl ServiceSpec {
    pub fn new(
        name: impl Into<String>,
        command: CommandLine,
        working_directory: impl Into<PathBuf>,
        port: Port,
    ) -> Self {
        Self {
            name: name.into(),
            command,
            working_directory: working_directory.into(),
            port,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Same spec with its working directory anchored under `base`.
    pub fn resolved_against(&self, base: &Path) -> Self {
        let mut spec = self.clone();
        if spec.working_directory.is_relative() {
            spec.working_directory = base.join(&self.working_directory);
        }
        spec
    }
}

/// How readiness is checked once every launch has been issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReadinessMode {
    /// Wait the settle delay, probe every port once.
    #[default]
    SingleShot,
    /// Wait the settle delay, then re-probe inactive ports every
    /// `interval_ms` until they are up or `timeout_secs` has elapsed.
    Poll { interval_ms: u64, timeout_secs: f64 },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LauncherConfig {
    /// Ports to reap before launching and to probe afterwards.
    /// Empty means "the ports of the configured services".
    pub ports: Vec<Port>,
    /// Launched in order.
    pub services: Vec<ServiceSpec>,
    /// Anchor for relative paths. Defaults to the current directory.
    pub base_dir: Option<PathBuf>,
    /// Shared append-only log receiving every child's stdout and stderr.
    pub log_file: PathBuf,
    pub settle_delay_secs: f64,
    pub readiness: ReadinessMode,
    /// Upper bound on a single connection attempt while probing.
    pub probe_timeout_ms: u64,
    /// Runtime whose version is reported for diagnostics.
    pub runtime_binary: String,
    pub runtime_version_arg: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            ports: vec![3000, 5173],
            services: vec![
                ServiceSpec::new("server", CommandLine::shell("node index.js"), "server", 3000),
                ServiceSpec::new(
                    "client",
                    CommandLine::shell("npm run dev -- --host"),
                    "client",
                    5173,
                ),
            ],
            base_dir: None,
            log_file: PathBuf::from("service_log.txt"),
            settle_delay_secs: 5.0,
            readiness: ReadinessMode::SingleShot,
            probe_timeout_ms: 500,
            runtime_binary: "node".to_string(),
            runtime_version_arg: "-v".to_string(),
        }
    }
}

impl LauncherConfig {
    /// Layers compiled defaults, the TOML file and `LAUNCHER_*` environment variables.
    ///
    /// An explicit `path` must exist; the implicit `launcher.toml` may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p.to_path_buf()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: LauncherConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(LauncherError::InvalidConfig(
                "at least one service must be configured".into(),
            ));
        }

        let mut names = HashSet::new();
        for service in &self.services {
            if !names.insert(service.name()) {
                return Err(LauncherError::InvalidConfig(format!(
                    "duplicate service name '{}'",
                    service.name()
                )));
            }
            if service.command().is_empty() {
                return Err(LauncherError::InvalidConfig(format!(
                    "service '{}' has an empty command",
                    service.name()
                )));
            }
        }

        if Duration::try_from_secs_f64(self.settle_delay_secs).is_err() {
            return Err(LauncherError::InvalidConfig(format!(
                "settle delay must be a non-negative, representable number of seconds, got {}",
                self.settle_delay_secs
            )));
        }

        if let ReadinessMode::Poll {
            interval_ms,
            timeout_secs,
        } = self.readiness
        {
            if interval_ms == 0 || Duration::try_from_secs_f64(timeout_secs).is_err() {
                return Err(LauncherError::InvalidConfig(format!(
                    "poll readiness needs a positive interval and a non-negative, representable \
                     timeout, got {}ms / {}s",
                    interval_ms, timeout_secs
                )));
            }
        }

        Ok(())
    }

    pub fn base_dir(&self) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        if self.log_file.is_absolute() {
            self.log_file.clone()
        } else {
            self.base_dir().join(&self.log_file)
        }
    }

    /// Ports to reap and probe: the configured `ports` followed by every
    /// service port not already listed, without duplicates.
    ///
    /// Every service port is always included, so no service is launched onto
    /// a port that was not reaped first.
    pub fn effective_ports(&self) -> Vec<Port> {
        let mut seen = HashSet::new();
        self.ports
            .iter()
            .copied()
            .chain(self.services.iter().map(ServiceSpec::port))
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// Saturates instead of panicking on values `validate` would reject.
    pub fn settle_delay(&self) -> Duration {
        secs_to_duration(self.settle_delay_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Seconds to a `Duration`: negative or NaN becomes zero, too large becomes `Duration::MAX`.
pub fn secs_to_duration(secs: f64) -> Duration {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) => d,
        Err(_) if secs > 0.0 => Duration::MAX,
        Err(_) => Duration::ZERO,
    }
}
