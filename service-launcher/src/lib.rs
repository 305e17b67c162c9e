//! Local dev-stack launcher.
//!
//! Kills whatever holds the configured ports, starts each service as a
//! detached child writing into one shared append-only log, waits a settle
//! delay and reports which ports have a listener. Launched services are never
//! supervised or stopped afterwards.

pub mod args;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod readiness;
pub mod runtime;
pub mod service_log;

pub use config::{CommandLine, LauncherConfig, ReadinessMode, ServiceSpec};
pub use error::{LaunchError, LauncherError, ReapError};
pub use orchestrator::{Orchestrator, RunOutcome, RunReport, Stage};
