//! Timeout-bounded invocation of the container engine CLI
//!
//! Every engine interaction goes through [`CommandRunner`], so the lifecycle
//! manager can be exercised without a Docker daemon.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Result, SandboxError};

/// Budget for the `--version` startup probe
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one engine invocation that managed to start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code, `None` when killed by a signal or on timeout
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The wall-clock budget ran out and the process was killed
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn completed(status: Option<i32>, stdout: String, stderr: String, elapsed: Duration) -> Self {
        Self {
            status,
            stdout,
            stderr,
            timed_out: false,
            elapsed,
        }
    }

    pub fn timed_out(limit: Duration) -> Self {
        Self {
            timed_out: true,
            elapsed: limit,
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.status == Some(0)
    }

    /// Captured stdout, or the failure this result represents
    pub fn into_stdout(self) -> Result<String> {
        if self.timed_out {
            return Err(SandboxError::CommandTimedOut {
                timeout: self.elapsed,
            });
        }
        if self.status != Some(0) {
            return Err(SandboxError::CommandFailed {
                status: self.status,
                stderr: self.stderr,
            });
        }
        Ok(self.stdout)
    }
}

/// Runs engine commands; `args` excludes the engine program itself
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the engine with `args`, killing it once `limit` elapses.
    ///
    /// Only a launch failure is an `Err`; non-zero exits and timeouts are
    /// reported through the returned [`ExecutionResult`].
    async fn output(&self, args: Vec<String>, limit: Duration) -> Result<ExecutionResult>;
}

/// Engine CLI runner backed by `tokio::process`
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
}

impl DockerCli {
    pub fn new(runtime: &str) -> Self {
        // Fall back to the bare name so spawn errors mention what was asked for
        let program = which::which(runtime).unwrap_or_else(|_| PathBuf::from(runtime));
        Self { program }
    }

    /// Build a runner and verify the engine answers `--version`.
    ///
    /// The server calls this once at startup and refuses to start on error.
    pub async fn detect(config: &EngineConfig) -> Result<(Self, String)> {
        let cli = Self::new(&config.runtime);
        let version = cli.version().await?;
        info!(
            program = %cli.program.display(),
            engine_version = %version,
            "Container engine available"
        );
        Ok((cli, version))
    }

    /// Engine version string, e.g. `Docker version 24.0.7, build afdd53b`
    pub async fn version(&self) -> Result<String> {
        let result = self
            .output(vec!["--version".to_string()], VERSION_PROBE_TIMEOUT)
            .await?;
        Ok(result.into_stdout()?.trim().to_string())
    }

    fn invocation_error(&self, source: std::io::Error) -> SandboxError {
        SandboxError::Invocation {
            program: self.program.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl CommandRunner for DockerCli {
    async fn output(&self, args: Vec<String>, limit: Duration) -> Result<ExecutionResult> {
        debug!(args = ?args, timeout_secs = limit.as_secs(), "Running engine command");
        let started = Instant::now();

        // kill_on_drop reclaims the child when the timeout drops the wait future
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.invocation_error(e))?;

        match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = ExecutionResult::completed(
                    output.status.code(),
                    String::from_utf8_lossy(&output.stdout).to_string(),
                    String::from_utf8_lossy(&output.stderr).to_string(),
                    started.elapsed(),
                );
                debug!(
                    status = ?result.status,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "Engine command finished"
                );
                Ok(result)
            }
            Ok(Err(e)) => Err(self.invocation_error(e)),
            Err(_) => {
                warn!(args = ?args, timeout_secs = limit.as_secs(), "Engine command timed out, killed");
                Ok(ExecutionResult::timed_out(limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_stdout_success() {
        let result = ExecutionResult::completed(
            Some(0),
            "abc123\n".to_string(),
            String::new(),
            Duration::from_millis(5),
        );
        assert!(result.success());
        assert_eq!(result.into_stdout().unwrap(), "abc123\n");
    }

    #[test]
    fn test_into_stdout_non_zero_keeps_stderr() {
        let result = ExecutionResult::completed(
            Some(1),
            "partial".to_string(),
            "boom".to_string(),
            Duration::from_millis(5),
        );
        assert!(!result.success());
        match result.into_stdout() {
            Err(SandboxError::CommandFailed { status, stderr }) => {
                assert_eq!(status, Some(1));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_into_stdout_timeout() {
        let result = ExecutionResult::timed_out(Duration::from_secs(5));
        assert!(!result.success());
        assert!(matches!(
            result.into_stdout(),
            Err(SandboxError::CommandTimedOut { timeout }) if timeout == Duration::from_secs(5)
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_invocation_error() {
        let cli = DockerCli::new("dockbox-no-such-engine-binary");
        let err = cli
            .output(vec!["ps".to_string()], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::Invocation { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        // `sh -c "sleep 5"` stands in for a hung engine call
        let cli = DockerCli::new("sh");
        let result = cli
            .output(
                vec!["-c".to_string(), "sleep 5".to_string()],
                Duration::from_millis(200),
            )
            .await
            .unwrap();
        assert!(result.timed_out);
        assert!(result.status.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_both_streams() {
        let cli = DockerCli::new("sh");
        let result = cli
            .output(
                vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(result.status, Some(3));
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }
}
