use log::{error, info};
use std::io;
use std::process::Stdio;
use tokio::process::Command;

use super::models::ProcessHandle;
use crate::config::ServiceSpec;
use crate::error::LaunchError;
use crate::service_log::ServiceLog;

/// Starts services as detached, fire-and-forget children.
///
/// Each child:
/// - runs in a new session, so it leads its own process group and has no
///   controlling terminal,
/// - reads from `/dev/null`,
/// - writes stdout and stderr into the shared [`ServiceLog`].
///
/// `launch` returns as soon as the OS has created the process. Readiness is
/// checked elsewhere.
pub struct ProcessLauncher<'a> {
    log: &'a ServiceLog,
}

impl<'a> ProcessLauncher<'a> {
    pub fn new(log: &'a ServiceLog) -> Self {
        Self { log }
    }

    pub fn launch(&self, spec: &ServiceSpec) -> Result<ProcessHandle, LaunchError> {
        let name = spec.name();

        if spec.command().is_empty() {
            return Err(LaunchError::EmptyCommand(name.to_string()));
        }

        let cwd = spec.working_directory();
        if !cwd.is_dir() {
            return Err(LaunchError::MissingWorkingDirectory {
                service: name.to_string(),
                path: cwd.to_path_buf(),
            });
        }

        let attach = || {
            self.log.attach().map_err(|source| LaunchError::LogAttach {
                service: name.to_string(),
                source,
            })
        };
        let stdout = attach()?;
        let stderr = attach()?;

        let (program, args) = spec.command().program_and_args();
        info!("Launcher: spawning [{}]: {} in {:?}", name, spec.command(), cwd);

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(false);

        // Runs in the child between fork and exec: only async-signal-safe calls.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(|source| {
            error!("Launcher: failed to spawn [{}]: {}", name, source);
            LaunchError::Spawn {
                service: name.to_string(),
                source,
            }
        })?;

        let pid = child.id().ok_or_else(|| LaunchError::Spawn {
            service: name.to_string(),
            source: io::Error::new(io::ErrorKind::Other, "child exited before its PID was read"),
        })?;

        // setsid() made the child leader of a group named after itself.
        let handle = ProcessHandle::new(name.to_string(), pid, pid, self.log.path().to_path_buf());
        info!(
            "Launcher: [{}] started with PID {} at {}",
            name,
            pid,
            handle.started_at().format("%H:%M:%S")
        );

        // Dropping the tokio handle neither waits for nor kills the child.
        drop(child);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandLine;
    use std::time::Duration;

    fn alive(pid: u32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    fn kill_group(pgid: u32) {
        unsafe {
            libc::killpg(pgid as libc::pid_t, libc::SIGKILL);
        }
    }

    #[tokio::test]
    async fn test_launched_child_is_detached_and_survives_handle_drop() {
        let dir = tempfile::tempdir().unwrap();
        let log = ServiceLog::open(dir.path().join("service_log.txt")).unwrap();
        let launcher = ProcessLauncher::new(&log);

        let spec = ServiceSpec::new("sleeper", CommandLine::argv(["sleep", "30"]), dir.path(), 0);
        let handle = launcher.launch(&spec).unwrap();
        let pid = handle.pid();

        assert_eq!(handle.process_group_id(), pid);
        assert_eq!(handle.log_path(), log.path());

        // Give the pre_exec hook time to run.
        tokio::time::sleep(Duration::from_millis(100)).await;

        unsafe {
            assert_eq!(libc::getpgid(pid as libc::pid_t), pid as libc::pid_t);
            assert_eq!(libc::getsid(pid as libc::pid_t), pid as libc::pid_t);
            assert_ne!(libc::getpgid(pid as libc::pid_t), libc::getpgrp());
        }

        drop(handle);
        drop(launcher);
        assert!(alive(pid));

        kill_group(pid);
    }

    #[tokio::test]
    async fn test_child_output_goes_to_shared_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("service_log.txt");
        let log = ServiceLog::open(&log_path).unwrap();
        let launcher = ProcessLauncher::new(&log);

        let spec = ServiceSpec::new(
            "echo",
            CommandLine::shell("echo to-stdout; echo to-stderr 1>&2"),
            dir.path(),
            0,
        );
        launcher.launch(&spec).unwrap();

        let mut contents = String::new();
        for _ in 0..50 {
            contents = std::fs::read_to_string(&log_path).unwrap();
            if contents.contains("to-stdout") && contents.contains("to-stderr") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(contents.contains("to-stdout"));
        assert!(contents.contains("to-stderr"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = ServiceLog::open(dir.path().join("log")).unwrap();
        let launcher = ProcessLauncher::new(&log);

        let spec = ServiceSpec::new(
            "ghost",
            CommandLine::argv(["/nonexistent/bin/server"]),
            dir.path(),
            3000,
        );
        let err = launcher.launch(&spec).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert_eq!(err.service(), "ghost");
    }

    #[tokio::test]
    async fn test_missing_working_directory_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = ServiceLog::open(dir.path().join("log")).unwrap();
        let launcher = ProcessLauncher::new(&log);

        let spec = ServiceSpec::new(
            "server",
            CommandLine::shell("node index.js"),
            dir.path().join("server"),
            3000,
        );
        let err = launcher.launch(&spec).unwrap_err();
        assert!(matches!(err, LaunchError::MissingWorkingDirectory { .. }));
    }
}
