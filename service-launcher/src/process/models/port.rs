use chrono::{DateTime, Local};

pub type Port = u16;

/// Snapshot of whether anything was listening on a port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortProbeResult {
    port: Port,
    active: bool,
    sampled_at: DateTime<Local>,
}

impl PortProbeResult {
    pub fn new(port: Port, active: bool) -> Self {
        Self {
            port,
            active,
            sampled_at: Local::now(),
        }
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sampled_at(&self) -> DateTime<Local> {
        self.sampled_at
    }
}
