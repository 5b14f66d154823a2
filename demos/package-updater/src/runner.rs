//! Command execution behind the package tools.

use std::process::Stdio;

use async_trait::async_trait;
use capcall::tools::{CancellationToken, ExecutorError, ExecutorResult};
use tokio::process::Command;
use tracing::{debug, info};

/// Captured result of a finished script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status was zero.
    pub success: bool,
    /// Combined stdout and stderr.
    pub output: String,
}

/// Runs package scripts and probes for installed binaries.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Returns `true` when `command` resolves on `PATH`.
    async fn is_available(&self, command: &str) -> bool;

    /// Runs `script` until it exits or `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Cancelled`] when the token flips first, or an
    /// internal error when the process cannot be spawned.
    async fn run(&self, script: &str, token: &CancellationToken) -> ExecutorResult<CommandOutput>;
}

/// Runs scripts through `sh -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn is_available(&self, command: &str) -> bool {
        Command::new("sh")
            .args(["-c", "command -v \"$1\"", "sh", command])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|status| status.success())
    }

    async fn run(&self, script: &str, token: &CancellationToken) -> ExecutorResult<CommandOutput> {
        token.check()?;
        let child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ExecutorError::Internal(anyhow::Error::new(err).context("failed to spawn sh")))?;
        debug!(pid = ?child.id(), "script started");

        // Dropping the pending wait on cancellation drops the child, which kills it.
        let output = match token.run_until_cancelled(child.wait_with_output()).await {
            Ok(output) => output.map_err(|err| {
                ExecutorError::Internal(anyhow::Error::new(err).context("failed to collect script output"))
            })?,
            Err(cancelled) => {
                info!("script killed after cancellation");
                return Err(cancelled);
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(CommandOutput {
            success: output.status.success(),
            output: combined,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::{Duration, Instant};

    use capcall::tools::CancelReason;

    use super::*;

    #[tokio::test]
    async fn captures_output_and_status() {
        let token = CancellationToken::new();
        let ok = ShellRunner.run("echo out; echo err >&2", &token).await.unwrap();
        assert!(ok.success);
        assert!(ok.output.contains("out"));
        assert!(ok.output.contains("err"));

        let failed = ShellRunner.run("exit 3", &token).await.unwrap();
        assert!(!failed.success);
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel_with(CancelReason::Disconnected);
        });

        let started = Instant::now();
        let err = ShellRunner.run("sleep 30", &token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn detects_binaries_on_path() {
        assert!(ShellRunner.is_available("sh").await);
        assert!(!ShellRunner.is_available("definitely-not-a-real-binary-4242").await);
    }
}
