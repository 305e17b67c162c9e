//! Launch-and-verify sequencing.
//!
//! `Idle -> Reaping -> Launching(each service, in order) -> Settling -> Probing -> Done`
//!
//! Every stage reports its outcome and the run always moves on, except that a
//! launch failure of a required service ends the run as `Done(Failed)` with
//! later services never started.

use log::{info, warn};
use std::time::Duration;

use crate::config::{secs_to_duration, LauncherConfig, ReadinessMode};
use crate::error::{LaunchError, Result};
use crate::process::models::{Port, PortProbeResult, ProcessHandle, ReapOutcome, ReapStatus};
use crate::process::{PortReaper, ProcessLauncher};
use crate::readiness::ReadinessProber;
use crate::runtime::probe_runtime_version;
use crate::service_log::ServiceLog;

/// Pause before re-checking ports whose owners were just killed.
const REAP_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every required service was launched.
    Succeeded,
    /// A required service could not be launched.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Reaping,
    Launching(String),
    Settling,
    Probing,
    Done(RunOutcome),
}

/// Everything a run observed.
#[derive(Debug)]
pub struct RunReport {
    reaped: Vec<ReapOutcome>,
    runtime_version: Option<String>,
    launched: Vec<ProcessHandle>,
    launch_failures: Vec<LaunchError>,
    probes: Vec<PortProbeResult>,
    stages: Vec<Stage>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            reaped: Vec::new(),
            runtime_version: None,
            launched: Vec::new(),
            launch_failures: Vec::new(),
            probes: Vec::new(),
            stages: vec![Stage::Idle],
        }
    }

    pub fn reaped(&self) -> &[ReapOutcome] {
        &self.reaped
    }

    pub fn runtime_version(&self) -> Option<&str> {
        self.runtime_version.as_deref()
    }

    pub fn launched(&self) -> &[ProcessHandle] {
        &self.launched
    }

    pub fn launch_failures(&self) -> &[LaunchError] {
        &self.launch_failures
    }

    pub fn probes(&self) -> &[PortProbeResult] {
        &self.probes
    }

    pub fn probe(&self, port: Port) -> Option<&PortProbeResult> {
        self.probes.iter().find(|p| p.port() == port)
    }

    /// Stages in the order they were entered, starting with `Idle`.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn outcome(&self) -> RunOutcome {
        match self.stages.last() {
            Some(Stage::Done(outcome)) => *outcome,
            _ => RunOutcome::Failed,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self.outcome() {
            RunOutcome::Succeeded => 0,
            RunOutcome::Failed => 1,
        }
    }
}

/// Single-shot launcher: reap, launch, settle, probe, report.
pub struct Orchestrator {
    config: LauncherConfig,
    reaper: PortReaper,
}

impl Orchestrator {
    pub fn new(config: LauncherConfig) -> Self {
        Self {
            config,
            reaper: PortReaper::new(),
        }
    }

    /// Replaces the default `lsof` based reaper.
    pub fn with_reaper(mut self, reaper: PortReaper) -> Self {
        self.reaper = reaper;
        self
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Runs the whole sequence once.
    ///
    /// Only an unusable log file is returned as `Err`; a failed required
    /// launch is recorded in the report, whose `exit_code` is then non-zero.
    pub async fn run(&self) -> Result<RunReport> {
        let log = ServiceLog::open(self.config.log_path())?;
        let mut report = RunReport::new();

        log.status("Starting service launcher...");

        // 1. Free the ports
        let ports = self.config.effective_ports();
        enter(&mut report, Stage::Reaping);
        report.reaped = self.reaper.reap(&ports).await;
        for outcome in &report.reaped {
            log.status(&outcome.describe());
        }
        self.verify_reaped(&log, &report.reaped).await;
        log.status("Ports cleared.");

        // 2. Runtime diagnostics
        report.runtime_version =
            probe_runtime_version(&self.config.runtime_binary, &self.config.runtime_version_arg)
                .await;
        match &report.runtime_version {
            Some(v) => log.status(&format!("{} version: {}", self.config.runtime_binary, v)),
            None => log.status(&format!(
                "{} not found in PATH, services may fail to start.",
                self.config.runtime_binary
            )),
        }

        // 3. Launch, strictly in configured order
        let base = self.config.base_dir();
        let launcher = ProcessLauncher::new(&log);

        for service in &self.config.services {
            enter(&mut report, Stage::Launching(service.name().to_string()));
            log.status(&format!("Starting {}...", service.name()));

            match launcher.launch(&service.resolved_against(&base)) {
                Ok(handle) => {
                    log.status(&format!(
                        "{} started with PID {} (port {}).",
                        service.name(),
                        handle.pid(),
                        service.port()
                    ));
                    report.launched.push(handle);
                }
                Err(e) => {
                    log.status(&format!("Failed to start {}: {}", service.name(), e));
                    report.launch_failures.push(e);

                    if service.is_required() {
                        log.status(&format!(
                            "Aborting: required service '{}' did not launch.",
                            service.name()
                        ));
                        enter(&mut report, Stage::Done(RunOutcome::Failed));
                        return Ok(report);
                    }
                    warn!("Orchestrator: optional service '{}' skipped", service.name());
                }
            }
        }

        // 4. Settle
        enter(&mut report, Stage::Settling);
        let settle = self.config.settle_delay();
        log.status(&format!(
            "Services launched in background. Monitoring for {} seconds...",
            settle.as_secs_f64()
        ));
        tokio::time::sleep(settle).await;

        // 5. Probe
        enter(&mut report, Stage::Probing);
        let prober = ReadinessProber::new(self.config.probe_timeout());
        report.probes = match self.config.readiness {
            ReadinessMode::SingleShot => prober.probe_all(&ports).await,
            ReadinessMode::Poll {
                interval_ms,
                timeout_secs,
            } => {
                prober
                    .poll_until_active(
                        &ports,
                        Duration::from_millis(interval_ms),
                        secs_to_duration(timeout_secs),
                    )
                    .await
            }
        };
        for probe in &report.probes {
            if probe.is_active() {
                log.status(&format!("Port {} Active!", probe.port()));
            } else {
                log.status(&format!("Port {} Inactive.", probe.port()));
            }
        }

        enter(&mut report, Stage::Done(RunOutcome::Succeeded));
        log.status("Done.");
        Ok(report)
    }

    /// Reports ports that still have a listener after their owners were killed.
    async fn verify_reaped(&self, log: &ServiceLog, reaped: &[ReapOutcome]) {
        let killed: Vec<Port> = reaped
            .iter()
            .filter(|o| matches!(o.status(), ReapStatus::Killed(_)))
            .map(ReapOutcome::port)
            .collect();
        if killed.is_empty() {
            return;
        }

        tokio::time::sleep(REAP_GRACE).await;
        let prober = ReadinessProber::new(self.config.probe_timeout());
        for probe in prober.probe_all(&killed).await {
            if probe.is_active() {
                log.status(&format!("Port {} is still in use after reaping.", probe.port()));
            }
        }
    }
}

fn enter(report: &mut RunReport, stage: Stage) {
    info!("Orchestrator: -> {:?}", stage);
    report.stages.push(stage);
}
