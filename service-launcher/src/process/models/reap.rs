use super::port::Port;
use crate::error::ReapError;

/// What happened when a port was reaped.
#[derive(Debug)]
pub enum ReapStatus {
    /// Nothing held the port.
    NoOwner,
    /// These PIDs were sent SIGKILL (or had already exited when signalled).
    Killed(Vec<u32>),
    /// Discovery or signalling failed. The run continues regardless.
    Failed(ReapError),
}

#[derive(Debug)]
pub struct ReapOutcome {
    port: Port,
    status: ReapStatus,
}

impl ReapOutcome {
    pub fn new(port: Port, status: ReapStatus) -> Self {
        Self { port, status }
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn status(&self) -> &ReapStatus {
        &self.status
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, ReapStatus::Failed(_))
    }

    /// Human readable status line.
    pub fn describe(&self) -> String {
        match &self.status {
            ReapStatus::NoOwner => format!("Port {}: no process found.", self.port),
            ReapStatus::Killed(pids) => format!(
                "Port {}: cleared (killed PID {}).",
                self.port,
                pids.iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ReapStatus::Failed(e) => format!("Port {}: could not be cleared ({}).", self.port, e),
        }
    }
}
