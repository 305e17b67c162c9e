use log::warn;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{LauncherError, Result};

/// Marker in front of the launcher's own lines in the shared log.
pub const STATUS_PREFIX: &str = "[launcher]";

/// The run's shared append-only log.
///
/// Every launched child gets a duplicate of this handle as stdout and stderr,
/// so their output lands in arrival order. The launcher's status lines go
/// into the same file. The handle is released when the value drops.
#[derive(Debug)]
pub struct ServiceLog {
    path: PathBuf,
    file: File,
}

impl ServiceLog {
    /// Opens (creating if needed) `path` in append mode. Never truncates.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LauncherError::LogFile {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A second descriptor on the same open file, for a child's stdio.
    pub fn attach(&self) -> std::io::Result<File> {
        self.file.try_clone()
    }

    /// Appends one prefixed line with a single write.
    pub fn write_line(&self, line: &str) -> std::io::Result<()> {
        let record = format!("{} {}\n", STATUS_PREFIX, line);
        (&self.file).write_all(record.as_bytes())
    }

    /// Prints a status line for the operator and mirrors it into the log.
    pub fn status(&self, line: &str) {
        println!("{}", line);
        if let Err(e) = self.write_line(line) {
            warn!("ServiceLog: could not append to {:?}: {}", self.path, e);
        }
    }
}
