//! Data models for Dockbox
//!
//! Typed outcomes of lifecycle operations, rendered to text only at the tool
//! boundary, plus the HTTP health payload.

use serde::{Deserialize, Serialize};

use crate::error::SandboxError;
use crate::packages::{PackageManagerKind, ResolutionMode};

// ============================================================================
// Lifecycle Outcomes
// ============================================================================

/// Result of `create_container`
#[derive(Debug)]
pub struct CreateOutcome {
    /// Engine-assigned container ID
    pub container_id: String,

    /// Install result, present only when dependencies were requested.
    /// A failed install never removes the container.
    pub dependencies: Option<Result<InstallReport, SandboxError>>,
}

/// A successful dependency installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub manager: PackageManagerKind,
    pub resolved_by: ResolutionMode,
    /// Dependency list as passed to the manager
    pub dependencies: String,
}

/// How a container was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// `stop` then `rm` succeeded
    Removed,
    /// Graceful removal failed; `kill` + `rm -f` succeeded
    ForceRemoved,
}

/// Result of `list_containers`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerListing {
    pub show_all: bool,
    /// Engine table including its header, `None` when there are no rows
    pub table: Option<String>,
}

// ============================================================================
// Health Models
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub engine_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}
