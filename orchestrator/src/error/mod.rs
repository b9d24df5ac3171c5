//! Error kinds shared by the process invoker, resolver and lifecycle manager
//!
//! Operations return these typed errors; they are only turned into text at
//! the tool boundary via [`SandboxError::render`].

use std::time::Duration;

use thiserror::Error;

/// Failure of a sandbox operation
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The engine executable is missing or could not be launched
    #[error("failed to invoke `{program}`: {source}")]
    Invocation {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine command exited with a non-zero status
    #[error("{stderr}")]
    CommandFailed { status: Option<i32>, stderr: String },

    /// The engine command exceeded its wall-clock budget and was killed
    #[error("command timed out after {} seconds", .timeout.as_secs())]
    CommandTimedOut { timeout: Duration },

    #[error("Container '{name}' is not running or does not exist")]
    ContainerNotRunning { name: String },

    #[error("No supported package managers found in the container")]
    NoPackageManagerFound,

    /// A command string could not be split into an argument vector
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;

/// Operation a failure happened in, used to phrase the reply text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateContainer,
    ExecuteCommand,
    ExecuteScript,
    InstallDependencies,
    ListContainers,
    CleanupContainer,
}

impl Operation {
    pub fn action(&self) -> &'static str {
        match self {
            Operation::CreateContainer => "creating container",
            Operation::ExecuteCommand => "executing command",
            Operation::ExecuteScript => "executing script",
            Operation::InstallDependencies => "installing dependencies",
            Operation::ListContainers => "listing containers",
            Operation::CleanupContainer => "cleaning up container",
        }
    }
}

impl SandboxError {
    /// Text reply for this failure, always carrying the engine diagnostics
    pub fn render(&self, operation: Operation) -> String {
        match self {
            SandboxError::CommandFailed { stderr, .. } => {
                format!("Error {}: {}", operation.action(), stderr.trim_end())
            }
            SandboxError::CommandTimedOut { .. } => format!(
                "Timeout while {}. Operation took too long.",
                operation.action()
            ),
            SandboxError::Invocation { .. } => {
                format!("Unexpected error {}: {}", operation.action(), self)
            }
            SandboxError::InvalidCommand(_) => format!("Error {}: {}", operation.action(), self),
            SandboxError::ContainerNotRunning { .. } | SandboxError::NoPackageManagerFound => {
                self.to_string()
            }
        }
    }

    /// Whether the failure came from the engine rather than from this process
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            SandboxError::CommandFailed { .. } | SandboxError::CommandTimedOut { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_command_failed_includes_stderr() {
        let err = SandboxError::CommandFailed {
            status: Some(125),
            stderr: "Error: No such container: web\n".to_string(),
        };
        assert_eq!(
            err.render(Operation::ExecuteCommand),
            "Error executing command: Error: No such container: web"
        );
    }

    #[test]
    fn test_render_timeout() {
        let err = SandboxError::CommandTimedOut {
            timeout: Duration::from_secs(30),
        };
        assert_eq!(
            err.render(Operation::CreateContainer),
            "Timeout while creating container. Operation took too long."
        );
    }

    #[test]
    fn test_render_domain_errors_ignore_operation() {
        let err = SandboxError::ContainerNotRunning {
            name: "box".to_string(),
        };
        assert_eq!(
            err.render(Operation::InstallDependencies),
            "Container 'box' is not running or does not exist"
        );
        assert_eq!(
            SandboxError::NoPackageManagerFound.render(Operation::CreateContainer),
            "No supported package managers found in the container"
        );
    }
}
