use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Runtime record of a launched service.
///
/// Holding a handle does not keep the process alive and dropping it does not
/// stop the process: launched services outlive the launcher.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    service: String,
    pid: u32,
    process_group_id: u32,
    log_path: PathBuf,
    started_at: DateTime<Local>,
}

impl ProcessHandle {
    pub fn new(service: String, pid: u32, process_group_id: u32, log_path: PathBuf) -> Self {
        Self {
            service,
            pid,
            process_group_id,
            log_path,
            started_at: Local::now(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn process_group_id(&self) -> u32 {
        self.process_group_id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }
}
