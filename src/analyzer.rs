//! External static-analysis engine.
//!
//! The engine runs in an isolated container, reads a bytecode file from a mounted
//! directory and prints its report on stdout. The time budget is passed through to
//! the tool; nothing here kills an overrunning process.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

const CONTAINER_MOUNT: &str = "/scratch";

/// A contract waiting for (or undergoing) analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisJob {
    pub address: String,
    pub bytecode: String,
    pub time_budget: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Completed,
    Failed { exit_code: Option<i32> },
    TimedOut,
    SpawnFailed(String),
}

impl AnalysisOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
            Self::TimedOut => "timed_out",
            Self::SpawnFailed(_) => "spawn_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    /// Whatever the tool printed, partial output included.
    pub output: String,
    pub outcome: AnalysisOutcome,
    pub elapsed: Duration,
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze the bytecode stored at `bytecode_path`. Never fails: a broken run is
    /// reported through [`AnalysisOutcome`] with whatever output was captured.
    async fn run(&self, bytecode_path: &Path, time_budget: Duration) -> AnalysisReport;

    /// Reclaim exited resources of the isolation runtime.
    async fn prune(&self) {}
}

#[derive(Debug, Clone)]
pub struct DockerAnalyzer {
    docker_bin: String,
    image: String,
    mount_dir: PathBuf,
    modules: Option<String>,
}

impl DockerAnalyzer {
    pub fn new(
        docker_bin: impl Into<String>,
        image: impl Into<String>,
        mount_dir: impl Into<PathBuf>,
        modules: Option<String>,
    ) -> Self {
        Self {
            docker_bin: docker_bin.into(),
            image: image.into(),
            mount_dir: mount_dir.into(),
            modules,
        }
    }

    /// `docker run` arguments for one job. The scratch directory is mounted at
    /// `/scratch` and the file is addressed by name inside it.
    pub fn run_args(&self, bytecode_path: &Path, time_budget: Duration) -> Vec<String> {
        let file_name = bytecode_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mount_source = std::path::absolute(&self.mount_dir).unwrap_or_else(|_| self.mount_dir.clone());

        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:{CONTAINER_MOUNT}", mount_source.display()),
            self.image.clone(),
            "a".to_string(),
            "-f".to_string(),
            format!("{CONTAINER_MOUNT}/{file_name}"),
            "--execution-timeout".to_string(),
            time_budget.as_secs().max(1).to_string(),
        ];
        if let Some(modules) = &self.modules {
            args.push("-m".to_string());
            args.push(modules.clone());
        }
        args
    }
}

/// Container start and teardown on top of the tool's own execution timeout.
pub const CONTAINER_OVERHEAD_GRACE: Duration = Duration::from_secs(30);

/// A clean exit is always `Completed`. A failing run only counts as timed out once
/// it has outlived the budget plus [`CONTAINER_OVERHEAD_GRACE`].
pub fn classify_exit(exit_code: Option<i32>, elapsed: Duration, time_budget: Duration) -> AnalysisOutcome {
    match exit_code {
        Some(0) => AnalysisOutcome::Completed,
        _ if elapsed > time_budget.saturating_add(CONTAINER_OVERHEAD_GRACE) => {
            AnalysisOutcome::TimedOut
        }
        other => AnalysisOutcome::Failed { exit_code: other },
    }
}

#[async_trait]
impl Analyzer for DockerAnalyzer {
    async fn run(&self, bytecode_path: &Path, time_budget: Duration) -> AnalysisReport {
        let started = Instant::now();
        let output = Command::new(&self.docker_bin)
            .args(self.run_args(bytecode_path, time_budget))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;
        let elapsed = started.elapsed();

        match output {
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    tracing::debug!(
                        "[ANALYZER] stderr for {}: {}",
                        bytecode_path.display(),
                        stderr.trim()
                    );
                }
                AnalysisReport {
                    output: String::from_utf8_lossy(&output.stdout).into_owned(),
                    outcome: classify_exit(output.status.code(), elapsed, time_budget),
                    elapsed,
                }
            }
            Err(err) => {
                tracing::error!(
                    "[ANALYZER] failed to spawn `{}`: {}",
                    self.docker_bin,
                    err
                );
                AnalysisReport {
                    output: String::new(),
                    outcome: AnalysisOutcome::SpawnFailed(err.to_string()),
                    elapsed,
                }
            }
        }
    }

    async fn prune(&self) {
        let result = Command::new(&self.docker_bin)
            .args(["container", "prune", "-f"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;
        match result {
            Ok(output) if output.status.success() => {}
            Ok(output) => tracing::warn!(
                "[ANALYZER] container prune exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(err) => tracing::warn!("[ANALYZER] container prune failed to spawn: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_mount_scratch_and_pass_budget() {
        let analyzer = DockerAnalyzer::new("docker", "mythril/myth", "/srv/scan/tmp", None);
        let args = analyzer.run_args(
            Path::new("/srv/scan/tmp/0xdef0000000000000000000000000000000000001"),
            Duration::from_secs(1800),
        );
        assert_eq!(
            args,
            vec![
                "run",
                "--rm",
                "-v",
                "/srv/scan/tmp:/scratch",
                "mythril/myth",
                "a",
                "-f",
                "/scratch/0xdef0000000000000000000000000000000000001",
                "--execution-timeout",
                "1800",
            ]
        );
    }

    #[test]
    fn run_args_append_modules() {
        let analyzer = DockerAnalyzer::new(
            "docker",
            "mythril/myth",
            "/srv/scan/tmp",
            Some("ether_thief,external_calls".to_string()),
        );
        let args = analyzer.run_args(Path::new("/srv/scan/tmp/x"), Duration::from_millis(10));
        assert_eq!(args[9], "1");
        assert_eq!(&args[10..], ["-m", "ether_thief,external_calls"]);
    }

    #[test]
    fn exit_classification() {
        let budget = Duration::from_secs(60);
        assert_eq!(
            classify_exit(Some(0), Duration::from_secs(5), budget),
            AnalysisOutcome::Completed
        );
        assert_eq!(
            classify_exit(Some(1), Duration::from_secs(5), budget),
            AnalysisOutcome::Failed { exit_code: Some(1) }
        );
        assert_eq!(
            classify_exit(None, Duration::from_secs(5), budget),
            AnalysisOutcome::Failed { exit_code: None }
        );
        assert_eq!(
            classify_exit(Some(1), Duration::from_secs(120), budget),
            AnalysisOutcome::TimedOut
        );
    }

    #[test]
    fn clean_exit_past_budget_is_still_completed() {
        let budget = Duration::from_secs(60);
        assert_eq!(
            classify_exit(Some(0), Duration::from_secs(75), budget),
            AnalysisOutcome::Completed
        );
        assert_eq!(
            classify_exit(Some(0), Duration::from_secs(3_600), budget),
            AnalysisOutcome::Completed
        );
        // Inside the container overhead window a failing exit keeps its code.
        assert_eq!(
            classify_exit(Some(137), budget + Duration::from_secs(10), budget),
            AnalysisOutcome::Failed { exit_code: Some(137) }
        );
    }

    #[tokio::test]
    async fn missing_binary_reports_spawn_failure() {
        let analyzer = DockerAnalyzer::new(
            "/nonexistent/contract-sweeper-docker",
            "mythril/myth",
            "/tmp",
            None,
        );
        let report = analyzer
            .run(Path::new("/tmp/0xabc"), Duration::from_secs(1))
            .await;
        assert!(matches!(report.outcome, AnalysisOutcome::SpawnFailed(_)));
        assert!(report.output.is_empty());
    }
}
