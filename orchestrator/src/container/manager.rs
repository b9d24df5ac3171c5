//! Container lifecycle management

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{ScriptConfig, TimeoutConfig};
use crate::error::{Result, SandboxError};
use crate::models::{CleanupOutcome, ContainerListing, CreateOutcome, InstallReport};
use crate::packages::{self, PackageManagerKind, ResolutionMode};
use crate::process::CommandRunner;

use super::command::{exec_args, parse_command, script_write_command, split_args};

/// Go template for `ps`; the engine renders it as a tab-separated table
const LIST_FORMAT: &str = "table {{.ID}}\t{{.Names}}\t{{.Status}}\t{{.Image}}\t{{.RunningFor}}";

/// First column header of the `ps` table
const LIST_HEADER: &str = "CONTAINER ID";

/// Manages sandbox containers through the engine CLI.
///
/// Holds no container registry: the engine is the only source of truth and
/// every call addresses containers by name.
pub struct ContainerManager {
    /// Engine command runner
    runner: Arc<dyn CommandRunner>,

    /// Per-operation budgets
    timeouts: TimeoutConfig,

    /// Where and how scripts run
    script: ScriptConfig,
}

impl ContainerManager {
    pub fn new(runner: Arc<dyn CommandRunner>, timeouts: TimeoutConfig, script: ScriptConfig) -> Self {
        Self {
            runner,
            timeouts,
            script,
        }
    }

    /// Create a detached keep-alive container, optionally installing dependencies.
    ///
    /// Install failures are reported in the outcome; the container is kept.
    pub async fn create_container(
        &self,
        image: &str,
        name: &str,
        dependencies: &str,
    ) -> Result<CreateOutcome> {
        info!(container = %name, image = %image, "Creating container");

        let args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            name.to_string(),
            image.to_string(),
            "sleep".to_string(),
            "infinity".to_string(),
        ];

        let stdout = self
            .run(args, self.timeouts.create)
            .await
            .map_err(|e| {
                error!(container = %name, error = %e, "Container creation failed");
                e
            })?;
        let container_id = stdout.trim().to_string();
        info!(container = %name, container_id = %container_id, "Container created");

        let dependencies = dependencies.trim();
        let dependencies = if dependencies.is_empty() {
            None
        } else {
            Some(self.install(name, Some(image), dependencies).await)
        };

        Ok(CreateOutcome {
            container_id,
            dependencies,
        })
    }

    /// Run a command string inside a container and return its stdout
    pub async fn execute_command(&self, name: &str, command: &str) -> Result<String> {
        let argv = parse_command(command)?;
        info!(container = %name, argv = ?argv, "Executing command");

        self.run(exec_args(name, argv), self.timeouts.exec).await
    }

    /// Write `body` to the script path inside the container and run it
    pub async fn execute_script(&self, name: &str, body: &str, args: &str) -> Result<String> {
        let script_args = split_args(args)?;
        let path = &self.script.path;

        debug!(container = %name, path = %path, bytes = body.len(), "Writing script");
        let write = vec![
            "sh".to_string(),
            "-c".to_string(),
            script_write_command(body, path),
        ];
        self.run(exec_args(name, write), self.timeouts.script_write)
            .await?;

        let mut argv = vec![self.script.interpreter.clone(), path.clone()];
        argv.extend(script_args);
        info!(container = %name, argv = ?argv, "Running script");

        self.run(exec_args(name, argv), self.timeouts.script_run)
            .await
    }

    /// Install dependencies into a running container of unknown provenance
    pub async fn add_dependencies(&self, name: &str, dependencies: &str) -> Result<InstallReport> {
        info!(container = %name, dependencies = %dependencies, "Adding dependencies");

        if !self.is_running(name).await? {
            warn!(container = %name, "Container is not running");
            return Err(SandboxError::ContainerNotRunning {
                name: name.to_string(),
            });
        }

        let dependencies = dependencies.trim();
        if dependencies.is_empty() {
            return Err(SandboxError::InvalidCommand(
                "dependency list is empty".to_string(),
            ));
        }

        self.install(name, None, dependencies).await
    }

    /// List containers; `show_all` includes stopped ones
    pub async fn list_containers(&self, show_all: bool) -> Result<ContainerListing> {
        let mut args = vec!["ps".to_string()];
        if show_all {
            args.push("-a".to_string());
        }
        args.push("--format".to_string());
        args.push(LIST_FORMAT.to_string());

        let stdout = self.run(args, self.timeouts.list).await?;
        let table = stdout.trim();

        let has_rows = table.starts_with(LIST_HEADER)
            && table.lines().skip(1).any(|line| !line.trim().is_empty());

        debug!(show_all, has_rows, "Listed containers");

        Ok(ContainerListing {
            show_all,
            table: has_rows.then(|| table.to_string()),
        })
    }

    /// Stop and remove a container, escalating to kill + force-remove on failure
    pub async fn cleanup_container(&self, name: &str) -> Result<CleanupOutcome> {
        info!(container = %name, "Cleaning up container");

        match self.stop_and_remove(name).await {
            Ok(()) => {
                info!(container = %name, "Container stopped and removed");
                Ok(CleanupOutcome::Removed)
            }
            Err(e) if e.is_engine_failure() => {
                warn!(container = %name, error = %e, "Graceful cleanup failed, forcing removal");
                self.force_remove(name, e).await
            }
            Err(e) => Err(e),
        }
    }

    async fn stop_and_remove(&self, name: &str) -> Result<()> {
        let stop = vec![
            "stop".to_string(),
            "--time".to_string(),
            self.timeouts.stop_grace.to_string(),
            name.to_string(),
        ];
        self.run(stop, self.timeouts.stop).await?;

        let remove = vec!["rm".to_string(), name.to_string()];
        self.run(remove, self.timeouts.remove).await?;

        Ok(())
    }

    /// Kill then `rm -f`; only the removal decides success.
    ///
    /// On failure the original graceful-path error is returned.
    async fn force_remove(&self, name: &str, cause: SandboxError) -> Result<CleanupOutcome> {
        let kill = vec!["kill".to_string(), name.to_string()];
        match self.runner.output(kill, secs(self.timeouts.kill)).await {
            Ok(result) if result.success() => debug!(container = %name, "Container killed"),
            Ok(result) => debug!(container = %name, stderr = %result.stderr.trim(), "Kill failed"),
            Err(e) => debug!(container = %name, error = %e, "Kill failed"),
        }

        let remove = vec!["rm".to_string(), "-f".to_string(), name.to_string()];
        match self.runner.output(remove, secs(self.timeouts.force_remove)).await {
            Ok(result) if result.success() => {
                info!(container = %name, "Container forcibly removed");
                Ok(CleanupOutcome::ForceRemoved)
            }
            Ok(result) => {
                error!(container = %name, stderr = %result.stderr.trim(), "Forced removal failed");
                Err(cause)
            }
            Err(e) => {
                error!(container = %name, error = %e, "Forced removal failed");
                Err(cause)
            }
        }
    }

    /// Whether the engine reports the container's running flag as `true`
    async fn is_running(&self, name: &str) -> Result<bool> {
        let args = vec![
            "container".to_string(),
            "inspect".to_string(),
            "-f".to_string(),
            "{{.State.Running}}".to_string(),
            name.to_string(),
        ];
        let stdout = self.run(args, self.timeouts.inspect).await?;
        Ok(stdout.trim() == "true")
    }

    /// Resolve a package manager and install `dependencies` with it.
    ///
    /// With an image name the static rules are tried first; otherwise, or
    /// when no rule matches, the container is probed.
    async fn install(
        &self,
        name: &str,
        image: Option<&str>,
        dependencies: &str,
    ) -> Result<InstallReport> {
        let (manager, resolved_by) = self.resolve_manager(name, image).await?;
        let command = manager.install_command(dependencies);
        info!(
            container = %name,
            manager = %manager,
            resolved_by = ?resolved_by,
            command = %command,
            "Installing dependencies"
        );

        let argv = vec!["sh".to_string(), "-c".to_string(), command];
        self.run(exec_args(name, argv), self.timeouts.install)
            .await
            .map_err(|e| {
                error!(container = %name, error = %e, "Dependency installation failed");
                e
            })?;

        info!(container = %name, "Dependencies installed");
        Ok(InstallReport {
            manager,
            resolved_by,
            dependencies: dependencies.to_string(),
        })
    }

    async fn resolve_manager(
        &self,
        name: &str,
        image: Option<&str>,
    ) -> Result<(PackageManagerKind, ResolutionMode)> {
        if let Some(kind) = image.and_then(packages::resolve_static) {
            debug!(container = %name, manager = %kind, "Package manager chosen from image name");
            return Ok((kind, ResolutionMode::Static));
        }

        if image.is_some() {
            warn!(container = %name, "Image type not recognized, probing package managers");
        }

        let available =
            packages::probe_available(self.runner.as_ref(), name, secs(self.timeouts.probe)).await;
        let kind = packages::select(&available).ok_or_else(|| {
            error!(container = %name, "No supported package managers found");
            SandboxError::NoPackageManagerFound
        })?;

        Ok((kind, ResolutionMode::Probe))
    }

    /// Run an engine command that must succeed, returning its stdout
    async fn run(&self, args: Vec<String>, timeout_secs: u64) -> Result<String> {
        self.runner
            .output(args, secs(timeout_secs))
            .await?
            .into_stdout()
    }
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use crate::process::{ExecutionResult, MockCommandRunner};

    type Calls = Arc<Mutex<Vec<(Vec<String>, Duration)>>>;

    fn ok(stdout: &str) -> Result<ExecutionResult> {
        Ok(ExecutionResult::completed(
            Some(0),
            stdout.to_string(),
            String::new(),
            Duration::from_millis(1),
        ))
    }

    fn failed(stderr: &str) -> Result<ExecutionResult> {
        Ok(ExecutionResult::completed(
            Some(1),
            String::new(),
            stderr.to_string(),
            Duration::from_millis(1),
        ))
    }

    /// Manager whose engine answers through `respond`, recording every call
    fn scripted<F>(respond: F) -> (ContainerManager, Calls)
    where
        F: Fn(&[String]) -> Result<ExecutionResult> + Send + 'static,
    {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();

        let mut runner = MockCommandRunner::new();
        runner.expect_output().returning(move |args, limit| {
            let response = respond(&args);
            seen.lock().unwrap().push((args, limit));
            response
        });

        let manager = ContainerManager::new(
            Arc::new(runner),
            TimeoutConfig::default(),
            ScriptConfig::default(),
        );
        (manager, calls)
    }

    fn argv(calls: &Calls) -> Vec<Vec<String>> {
        calls.lock().unwrap().iter().map(|(args, _)| args.clone()).collect()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_without_dependencies() {
        let (manager, calls) = scripted(|_| ok("3f2a9c\n"));

        let outcome = manager.create_container("alpine:latest", "box", "  ").await.unwrap();

        assert_eq!(outcome.container_id, "3f2a9c");
        assert!(outcome.dependencies.is_none());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            strings(&["run", "-d", "--name", "box", "alpine:latest", "sleep", "infinity"])
        );
        assert_eq!(calls[0].1, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_create_with_dependencies_uses_image_rule() {
        let (manager, calls) = scripted(|_| ok("id1\n"));

        let outcome = manager
            .create_container("python:3.9-slim", "py", "numpy pandas")
            .await
            .unwrap();

        let report = outcome.dependencies.unwrap().unwrap();
        assert_eq!(report.manager, PackageManagerKind::Pip);
        assert_eq!(report.resolved_by, ResolutionMode::Static);

        let calls = calls.lock().unwrap();
        // No probing when the image name decides
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1].0,
            strings(&["exec", "py", "sh", "-c", "pip install numpy pandas"])
        );
        assert_eq!(calls[1].1, Duration::from_secs(180));
    }

    #[tokio::test]
    async fn test_create_unknown_image_probes_and_keeps_container_on_failure() {
        let (manager, calls) = scripted(|args| match args[0].as_str() {
            "run" => ok("id2\n"),
            _ => failed("executable file not found in $PATH"),
        });

        let outcome = manager.create_container("busybox", "bb", "curl").await.unwrap();

        assert_eq!(outcome.container_id, "id2");
        assert!(matches!(
            outcome.dependencies,
            Some(Err(SandboxError::NoPackageManagerFound))
        ));

        let calls = argv(&calls);
        assert_eq!(calls.len(), 5);
        let probed: Vec<&str> = calls[1..].iter().map(|args| args[2].as_str()).collect();
        assert_eq!(probed, vec!["npm", "pip", "apt-get", "apk"]);
        assert!(calls.iter().all(|args| args[0] != "rm"));
    }

    #[tokio::test]
    async fn test_create_failure_surfaces_stderr() {
        let (manager, _) = scripted(|_| failed("Conflict. The container name \"/box\" is already in use"));

        let err = manager.create_container("alpine", "box", "").await.unwrap_err();
        match err {
            SandboxError::CommandFailed { stderr, .. } => assert!(stderr.contains("already in use")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_python_inline_code() {
        let (manager, calls) = scripted(|_| ok("2\n"));

        let output = manager.execute_command("box", "python -c print(1+1)").await.unwrap();

        assert_eq!(output, "2\n");
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0, strings(&["exec", "box", "python", "-c", "print(1+1)"]));
        assert_eq!(calls[0].1, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_execute_splits_plain_commands() {
        let (manager, calls) = scripted(|_| ok("hello world\n"));

        manager.execute_command("box", "echo hello world").await.unwrap();

        assert_eq!(argv(&calls)[0], strings(&["exec", "box", "echo", "hello", "world"]));
    }

    #[tokio::test]
    async fn test_execute_invalid_command_never_reaches_engine() {
        let manager = ContainerManager::new(
            Arc::new(MockCommandRunner::new()),
            TimeoutConfig::default(),
            ScriptConfig::default(),
        );

        let err = manager.execute_command("box", "echo \"oops").await.unwrap_err();
        assert!(matches!(err, SandboxError::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let (manager, _) = scripted(|_| Ok(ExecutionResult::timed_out(Duration::from_secs(30))));

        let err = manager.execute_command("box", "sleep 100").await.unwrap_err();
        assert!(matches!(err, SandboxError::CommandTimedOut { .. }));
    }

    #[tokio::test]
    async fn test_execute_script_writes_then_runs() {
        let (manager, calls) = scripted(|_| ok("done\n"));

        let output = manager
            .execute_script("box", "print('hi')", "--count 2 'a b'")
            .await
            .unwrap();

        assert_eq!(output, "done\n");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].0,
            strings(&[
                "exec",
                "box",
                "sh",
                "-c",
                r#"printf '%s\n' 'print('\''hi'\'')' > /tmp/script.py && chmod +x /tmp/script.py"#,
            ])
        );
        assert_eq!(calls[0].1, Duration::from_secs(30));
        assert_eq!(
            calls[1].0,
            strings(&["exec", "box", "python", "/tmp/script.py", "--count", "2", "a b"])
        );
        assert_eq!(calls[1].1, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_execute_script_stops_when_write_fails() {
        let (manager, calls) = scripted(|_| failed("read-only file system"));

        let err = manager.execute_script("box", "print(1)", "").await.unwrap_err();

        assert!(matches!(err, SandboxError::CommandFailed { .. }));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_dependencies_requires_running_container() {
        let (manager, calls) = scripted(|_| ok("false\n"));

        let err = manager.add_dependencies("box", "requests").await.unwrap_err();

        assert!(matches!(err, SandboxError::ContainerNotRunning { ref name } if name == "box"));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            strings(&["container", "inspect", "-f", "{{.State.Running}}", "box"])
        );
        assert_eq!(calls[0].1, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_add_dependencies_prefers_npm_over_pip() {
        let (manager, calls) = scripted(|args| match args.get(2).map(String::as_str) {
            Some("-f") => ok("true\n"),
            Some("npm") | Some("pip") => ok("9.0.0\n"),
            Some("sh") => ok(""),
            _ => failed("not found"),
        });

        let report = manager.add_dependencies("box", "lodash").await.unwrap();

        assert_eq!(report.manager, PackageManagerKind::Npm);
        assert_eq!(report.resolved_by, ResolutionMode::Probe);
        let calls = calls.lock().unwrap();
        // inspect, four probes, install
        assert_eq!(calls.len(), 6);
        assert!(calls[1..5].iter().all(|(_, limit)| *limit == Duration::from_secs(5)));
        assert_eq!(
            calls[5].0,
            strings(&["exec", "box", "sh", "-c", "npm install -g lodash"])
        );
    }

    #[tokio::test]
    async fn test_add_dependencies_without_manager_skips_install() {
        let (manager, calls) = scripted(|args| match args.get(2).map(String::as_str) {
            Some("-f") => ok("true"),
            _ => failed("not found"),
        });

        let err = manager.add_dependencies("box", "curl").await.unwrap_err();

        assert!(matches!(err, SandboxError::NoPackageManagerFound));
        assert!(argv(&calls).iter().all(|args| args.get(2).map(String::as_str) != Some("sh")));
    }

    #[tokio::test]
    async fn test_list_running_only_empty_table() {
        let (manager, calls) = scripted(|_| {
            ok("CONTAINER ID   NAMES     STATUS    IMAGE     CREATED\n")
        });

        let listing = manager.list_containers(false).await.unwrap();

        assert_eq!(listing.table, None);
        assert!(!listing.show_all);
        let calls = calls.lock().unwrap();
        assert_eq!(
            calls[0].0,
            strings(&[
                "ps",
                "--format",
                "table {{.ID}}\t{{.Names}}\t{{.Status}}\t{{.Image}}\t{{.RunningFor}}",
            ])
        );
        assert_eq!(calls[0].1, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_list_all_with_rows() {
        let table = "CONTAINER ID   NAMES   STATUS         IMAGE           CREATED\n\
                     3f2a9c1d2e4b   box     Up 2 minutes   alpine:latest   2 minutes ago";
        let (manager, calls) = scripted(move |_| ok(table));

        let listing = manager.list_containers(true).await.unwrap();

        assert_eq!(listing.table.as_deref(), Some(table));
        assert_eq!(argv(&calls)[0][1], "-a");
    }

    #[tokio::test]
    async fn test_list_output_without_header_is_empty() {
        let (manager, _) = scripted(|_| ok(""));
        assert_eq!(manager.list_containers(true).await.unwrap().table, None);
    }

    #[tokio::test]
    async fn test_cleanup_graceful() {
        let (manager, calls) = scripted(|args| ok(&args[args.len() - 1]));

        let outcome = manager.cleanup_container("box").await.unwrap();

        assert_eq!(outcome, CleanupOutcome::Removed);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, strings(&["stop", "--time", "5", "box"]));
        assert_eq!(calls[0].1, Duration::from_secs(10));
        assert_eq!(calls[1].0, strings(&["rm", "box"]));
        assert_eq!(calls[1].1, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cleanup_falls_back_to_force_when_stop_fails() {
        let (manager, calls) = scripted(|args| match args[0].as_str() {
            "stop" => failed("Error response from daemon: cannot stop container"),
            _ => ok("box"),
        });

        let outcome = manager.cleanup_container("box").await.unwrap();

        assert_eq!(outcome, CleanupOutcome::ForceRemoved);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].0, strings(&["kill", "box"]));
        assert_eq!(calls[1].1, Duration::from_secs(5));
        assert_eq!(calls[2].0, strings(&["rm", "-f", "box"]));
        assert_eq!(calls[2].1, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cleanup_reports_failure_when_force_remove_fails() {
        let (manager, calls) = scripted(|args| match (args[0].as_str(), args.len()) {
            ("stop", _) => ok("box"),
            ("rm", 2) => Ok(ExecutionResult::timed_out(Duration::from_secs(10))),
            _ => failed("No such container: box"),
        });

        let err = manager.cleanup_container("box").await.unwrap_err();

        // The graceful-path failure is what gets reported
        assert!(matches!(err, SandboxError::CommandTimedOut { .. }));
        assert_eq!(
            argv(&calls),
            vec![
                strings(&["stop", "--time", "5", "box"]),
                strings(&["rm", "box"]),
                strings(&["kill", "box"]),
                strings(&["rm", "-f", "box"]),
            ]
        );
    }
}
