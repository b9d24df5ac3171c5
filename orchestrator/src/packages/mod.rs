//! Package-manager resolution for sandbox containers
//!
//! A manager is picked either from the image name (static mode) or by asking
//! a running container which manager binaries answer `--version` (probe mode).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::container::exec_args;
use crate::process::CommandRunner;

/// Package managers the sandbox knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageManagerKind {
    Npm,
    Pip,
    AptGet,
    Apk,
}

/// How a manager was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    Static,
    Probe,
}

/// Image-name rules, first match wins
const IMAGE_RULES: &[(&[&str], PackageManagerKind)] = &[
    (&["node", "javascript"], PackageManagerKind::Npm),
    (&["python"], PackageManagerKind::Pip),
    (&["ubuntu", "debian"], PackageManagerKind::AptGet),
    (&["alpine"], PackageManagerKind::Apk),
];

/// Order in which a running container is probed
pub const PROBE_ORDER: [PackageManagerKind; 4] = [
    PackageManagerKind::Npm,
    PackageManagerKind::Pip,
    PackageManagerKind::AptGet,
    PackageManagerKind::Apk,
];

/// Preference when several managers respond
pub const PRIORITY: [PackageManagerKind; 4] = [
    PackageManagerKind::Npm,
    PackageManagerKind::Pip,
    PackageManagerKind::AptGet,
    PackageManagerKind::Apk,
];

impl PackageManagerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManagerKind::Npm => "npm",
            PackageManagerKind::Pip => "pip",
            PackageManagerKind::AptGet => "apt-get",
            PackageManagerKind::Apk => "apk",
        }
    }

    /// Argument vector asking the manager for its version
    pub fn version_probe(&self) -> Vec<String> {
        vec![self.as_str().to_string(), "--version".to_string()]
    }

    /// Shell command installing `dependencies`.
    ///
    /// The dependency list is inserted verbatim; it is run through `sh -c`.
    pub fn install_command(&self, dependencies: &str) -> String {
        match self {
            PackageManagerKind::Npm => format!("npm install -g {}", dependencies),
            PackageManagerKind::Pip => format!("pip install {}", dependencies),
            PackageManagerKind::AptGet => {
                format!("apt-get update && apt-get install -y {}", dependencies)
            }
            PackageManagerKind::Apk => format!("apk add --no-cache {}", dependencies),
        }
    }
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick a manager from the image identifier alone
pub fn resolve_static(image: &str) -> Option<PackageManagerKind> {
    let image = image.to_lowercase();
    IMAGE_RULES
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| image.contains(p)))
        .map(|(_, kind)| *kind)
}

/// Pick the highest-priority manager among those available
pub fn select(available: &[PackageManagerKind]) -> Option<PackageManagerKind> {
    PRIORITY.into_iter().find(|kind| available.contains(kind))
}

/// Ask a running container which managers respond.
///
/// Each probe is bounded by `limit`; failures of any kind only mean the
/// manager is treated as absent.
pub async fn probe_available(
    runner: &dyn CommandRunner,
    container: &str,
    limit: Duration,
) -> Vec<PackageManagerKind> {
    let mut available = Vec::new();

    for kind in PROBE_ORDER {
        let args = exec_args(container, kind.version_probe());
        match runner.output(args, limit).await {
            Ok(result) if result.success() => {
                info!(
                    container = %container,
                    manager = %kind,
                    version = %result.stdout.trim(),
                    "Found package manager"
                );
                available.push(kind);
            }
            Ok(result) => {
                debug!(
                    container = %container,
                    manager = %kind,
                    status = ?result.status,
                    timed_out = result.timed_out,
                    "Package manager not available"
                );
            }
            Err(e) => {
                debug!(container = %container, manager = %kind, error = %e, "Probe failed");
            }
        }
    }

    available
}
