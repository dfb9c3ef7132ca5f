use crate::analyzer::{AnalysisOutcome, AnalysisReport};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const STATUS_SUFFIX: &str = ".status.json";

/// Scratch bytecode files and per-address reports.
///
/// A scratch file is owned by the single worker holding that address; the
/// coordinator's ledger check guarantees no two workers ever share one.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    scratch_dir: PathBuf,
    report_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatus {
    pub address: String,
    pub status: String,
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
    pub bytecode_bytes: usize,
    pub output_bytes: usize,
    pub finished_at_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl ArtifactPaths {
    pub fn new(scratch_dir: impl Into<PathBuf>, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            report_dir: report_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.scratch_dir)?;
        fs::create_dir_all(&self.report_dir)
    }

    pub fn scratch_path(&self, address: &str) -> PathBuf {
        self.scratch_dir.join(address)
    }

    pub fn report_path(&self, address: &str) -> PathBuf {
        self.report_dir.join(address)
    }

    pub fn status_path(&self, address: &str) -> PathBuf {
        self.report_dir.join(format!("{address}{STATUS_SUFFIX}"))
    }

    pub fn write_scratch(&self, address: &str, bytecode: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.scratch_dir)?;
        let path = self.scratch_path(address);
        fs::write(&path, bytecode)?;
        Ok(path)
    }

    pub fn remove_scratch(&self, address: &str) -> io::Result<()> {
        match fs::remove_file(self.scratch_path(address)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    /// Raw analyzer output goes to `data/<address>`; the outcome sidecar goes next to it.
    pub fn write_report(
        &self,
        address: &str,
        report: &AnalysisReport,
        bytecode_bytes: usize,
    ) -> io::Result<ReportStatus> {
        fs::create_dir_all(&self.report_dir)?;
        fs::write(self.report_path(address), report.output.as_bytes())?;

        let status = ReportStatus {
            address: address.to_string(),
            status: report.outcome.as_str().to_string(),
            exit_code: match report.outcome {
                AnalysisOutcome::Failed { exit_code } => exit_code,
                AnalysisOutcome::Completed => Some(0),
                _ => None,
            },
            elapsed_ms: report.elapsed.as_millis() as u64,
            bytecode_bytes,
            output_bytes: report.output.len(),
            finished_at_ms: now_ms(),
        };
        let json = serde_json::to_vec_pretty(&status).map_err(io::Error::other)?;
        fs::write(self.status_path(address), json)?;
        Ok(status)
    }

    pub fn read_status(&self, address: &str) -> io::Result<ReportStatus> {
        let raw = fs::read(self.status_path(address))?;
        serde_json::from_slice(&raw).map_err(io::Error::other)
    }

    /// Remove every leftover scratch file. Returns how many were deleted.
    pub fn clear_scratch(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.scratch_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };
        let mut removed = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn paths(dir: &TempDir) -> ArtifactPaths {
        ArtifactPaths::new(dir.path().join("tmp"), dir.path().join("data"))
    }

    #[test]
    fn failed_analysis_is_distinguishable_on_disk() {
        let dir = TempDir::new().expect("tempdir");
        let artifacts = paths(&dir);
        let addr = "0xdef0000000000000000000000000000000000001";
        let report = AnalysisReport {
            output: "partial".to_string(),
            outcome: AnalysisOutcome::Failed { exit_code: Some(2) },
            elapsed: Duration::from_millis(1500),
        };
        let status = artifacts.write_report(addr, &report, 42).expect("write");
        assert_eq!(status.status, "failed");
        assert_eq!(status.exit_code, Some(2));
        assert_eq!(
            fs::read_to_string(artifacts.report_path(addr)).expect("report"),
            "partial"
        );
        assert_eq!(artifacts.read_status(addr).expect("status"), status);
    }

    #[test]
    fn clear_scratch_only_touches_scratch_dir() {
        let dir = TempDir::new().expect("tempdir");
        let artifacts = paths(&dir);
        assert_eq!(artifacts.clear_scratch().expect("missing dir is fine"), 0);
        artifacts.ensure_dirs().expect("dirs");
        artifacts.write_scratch("0xa", "0x60").expect("scratch");
        artifacts.write_scratch("0xb", "0x61").expect("scratch");
        fs::write(artifacts.report_path("0xc"), "keep").expect("report");
        assert_eq!(artifacts.clear_scratch().expect("clear"), 2);
        assert!(artifacts.report_path("0xc").exists());
        artifacts.remove_scratch("0xa").expect("already gone is ok");
    }
}
