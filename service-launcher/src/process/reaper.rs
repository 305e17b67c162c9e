use async_trait::async_trait;
use log::{debug, info, warn};
use std::process::Stdio;
use tokio::process::Command;

use super::models::{Port, ReapOutcome, ReapStatus};
use crate::error::ReapError;

/// Finds the processes holding a port.
#[async_trait]
pub trait OwnerLookup: Send + Sync {
    /// PIDs with a listening or connected socket on `port`, on any local interface.
    /// An empty list means the port is free.
    async fn owners(&self, port: Port) -> Result<Vec<u32>, ReapError>;
}

/// Owner discovery through `lsof -t -i :PORT`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LsofLookup;

#[async_trait]
impl OwnerLookup for LsofLookup {
    async fn owners(&self, port: Port) -> Result<Vec<u32>, ReapError> {
        let output = Command::new("lsof")
            .arg("-t")
            .arg(format!("-i:{}", port))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ReapError::Discovery {
                port,
                reason: format!("could not run lsof: {}", e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        // lsof exits 1 when nothing matches.
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                debug!("Reaper: lsof on port {} said: {}", port, stderr.trim());
            }
            return Ok(Vec::new());
        }

        parse_pids(&stdout).map_err(|reason| ReapError::Discovery { port, reason })
    }
}

/// Parses one PID per line, dropping duplicates.
fn parse_pids(text: &str) -> Result<Vec<u32>, String> {
    let mut pids = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let pid: u32 = line
            .parse()
            .map_err(|_| format!("unexpected lsof output line '{}'", line))?;
        // 0 and anything beyond pid_t would address process groups or wrap.
        if pid == 0 || pid > i32::MAX as u32 {
            return Err(format!("invalid PID {}", pid));
        }
        if !pids.contains(&pid) {
            pids.push(pid);
        }
    }
    Ok(pids)
}

/// Sends SIGKILL. `Ok(false)` means the process was already gone.
fn kill_hard(pid: u32) -> Result<bool, ReapError> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    if rc == 0 {
        return Ok(true);
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(false)
    } else {
        Err(ReapError::Signal { pid, source: err })
    }
}

/// Frees ports by killing whatever holds them.
///
/// One SIGKILL per discovered owner, no retries. Failures come back as
/// [`ReapStatus::Failed`] and never abort the caller.
pub struct PortReaper {
    lookup: Box<dyn OwnerLookup>,
}

impl Default for PortReaper {
    fn default() -> Self {
        Self::new()
    }
}

impl PortReaper {
    pub fn new() -> Self {
        Self::with_lookup(Box::new(LsofLookup))
    }

    pub fn with_lookup(lookup: Box<dyn OwnerLookup>) -> Self {
        Self { lookup }
    }

    pub async fn reap(&self, ports: &[Port]) -> Vec<ReapOutcome> {
        let mut outcomes = Vec::with_capacity(ports.len());
        for port in ports {
            outcomes.push(self.reap_port(*port).await);
        }
        outcomes
    }

    pub async fn reap_port(&self, port: Port) -> ReapOutcome {
        let own_pid = std::process::id();

        let owners = match self.lookup.owners(port).await {
            Ok(pids) => pids,
            Err(e) => {
                warn!("Reaper: {}", e);
                return ReapOutcome::new(port, ReapStatus::Failed(e));
            }
        };

        let owners: Vec<u32> = owners.into_iter().filter(|pid| *pid != own_pid).collect();
        if owners.is_empty() {
            debug!("Reaper: port {} has no owner", port);
            return ReapOutcome::new(port, ReapStatus::NoOwner);
        }

        let mut killed = Vec::with_capacity(owners.len());
        let mut first_error = None;

        for pid in owners {
            match kill_hard(pid) {
                Ok(true) => {
                    info!("Reaper: killed PID {} holding port {}", pid, port);
                    killed.push(pid);
                }
                Ok(false) => {
                    debug!("Reaper: PID {} on port {} exited before the signal", pid, port);
                    killed.push(pid);
                }
                Err(e) => {
                    warn!("Reaper: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => ReapOutcome::new(port, ReapStatus::Failed(e)),
            None => ReapOutcome::new(port, ReapStatus::Killed(killed)),
        }
    }
}
