//! Diagnostic check for the JavaScript runtime the services need.

use log::{debug, warn};
use std::process::Stdio;
use tokio::process::Command;

/// Asks `binary` for its version (e.g. `node -v`).
///
/// Returns `None` when the binary is not on `PATH`, fails, or prints nothing.
/// Purely informational: callers report the result and carry on.
pub async fn probe_runtime_version(binary: &str, version_arg: &str) -> Option<String> {
    let output = match Command::new(binary)
        .arg(version_arg)
        .stdin(Stdio::null())
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            warn!("Runtime: '{}' not found on PATH: {}", binary, e);
            return None;
        }
    };

    if !output.status.success() {
        warn!("Runtime: '{} {}' exited with {}", binary, version_arg, output.status);
        return None;
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if version.is_empty() {
        debug!("Runtime: '{}' printed no version", binary);
        return None;
    }
    Some(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_runtime_is_none() {
        assert_eq!(
            probe_runtime_version("definitely-not-a-runtime-binary", "-v").await,
            None
        );
    }

    #[tokio::test]
    async fn test_version_is_trimmed() {
        // `echo v20.11.1` stands in for `node -v`.
        assert_eq!(
            probe_runtime_version("echo", "v20.11.1").await,
            Some("v20.11.1".to_string())
        );
    }

    #[tokio::test]
    async fn test_failing_runtime_is_none() {
        assert_eq!(probe_runtime_version("false", "-v").await, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_version_check_does_not_stall_other_tasks() {
        // A slow runtime must not block timers on the same single-threaded runtime.
        let ticker = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            std::time::Instant::now()
        });
        let started = std::time::Instant::now();
        let slow = probe_runtime_version("sleep", "1").await;
        assert_eq!(slow, None);
        let ticked_at = ticker.await.unwrap();
        assert!(ticked_at.duration_since(started) < std::time::Duration::from_millis(900));
    }
}
