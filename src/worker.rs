use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::analyzer::{AnalysisOutcome, AnalysisReport, Analyzer};
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::storage::artifacts::ArtifactPaths;
use crate::utils::hex::bytecode_len;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Fetching = 1,
    Classifying = 2,
    Analyzing = 3,
    Reporting = 4,
    Cancelled = 5,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Fetching,
            2 => Self::Classifying,
            3 => Self::Analyzing,
            4 => Self::Reporting,
            5 => Self::Cancelled,
            _ => Self::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Classifying => "classifying",
            Self::Analyzing => "analyzing",
            Self::Reporting => "reporting",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Per-slot state visible to the supervisor.
#[derive(Debug, Default)]
pub struct SlotState(AtomicU8);

impl SlotState {
    pub fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Everything a worker needs, shared by every slot.
pub struct WorkerContext {
    pub coordinator: Arc<Coordinator>,
    pub analyzer: Arc<dyn Analyzer>,
    pub artifacts: ArtifactPaths,
    pub time_budget: Duration,
    pub shutdown: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Analyzed {
        address: String,
        outcome: AnalysisOutcome,
    },
    /// A contract was claimed but shutdown arrived before analysis started.
    Skipped { address: String },
    /// Nothing was claimed before shutdown.
    Drained,
}

/// One pass of the pipeline: claim a contract, analyze it, write the report.
///
/// A worker handles exactly one job and returns; the supervisor relaunches the slot.
pub async fn run_once(ctx: &WorkerContext, slot: usize, state: &SlotState) -> Result<WorkerOutcome> {
    state.set(WorkerState::Fetching);
    let claimed = ctx
        .coordinator
        .claim_for_slot(ctx.time_budget, &ctx.shutdown, Some(state))
        .await;
    let job = match claimed {
        Ok(Some(job)) => job,
        Ok(None) => {
            state.set(WorkerState::Cancelled);
            return Ok(WorkerOutcome::Drained);
        }
        Err(err) => {
            state.set(WorkerState::Idle);
            return Err(err);
        }
    };

    // Classification is already persisted; only the expensive step is dropped.
    if ctx.shutdown.is_cancelled() {
        tracing::info!(
            "[WORKER {}] Shutdown observed, skipping analysis of {}",
            slot,
            job.address
        );
        state.set(WorkerState::Cancelled);
        return Ok(WorkerOutcome::Skipped {
            address: job.address,
        });
    }

    state.set(WorkerState::Analyzing);
    let started = Instant::now();
    let bytecode_bytes = bytecode_len(&job.bytecode);
    let scratch = match ctx.artifacts.write_scratch(&job.address, &job.bytecode) {
        Ok(path) => path,
        Err(err) => {
            // The ledger already says "contract"; leave a sidecar so the miss is visible.
            let report = AnalysisReport {
                output: String::new(),
                outcome: AnalysisOutcome::SpawnFailed(format!("scratch write failed: {err}")),
                elapsed: started.elapsed(),
            };
            let recorded = ctx
                .artifacts
                .write_report(&job.address, &report, bytecode_bytes);
            if let Err(report_err) = recorded {
                tracing::error!(
                    "[WORKER {}] No status recorded for {}: {}",
                    slot,
                    job.address,
                    report_err
                );
            }
            state.set(WorkerState::Idle);
            return Err(err.into());
        }
    };
    tracing::info!(
        "[WORKER {}] Scanning {} ({} bytes, budget {}s)",
        slot,
        job.address,
        bytecode_bytes,
        job.time_budget.as_secs()
    );
    let report = ctx.analyzer.run(&scratch, job.time_budget).await;

    state.set(WorkerState::Reporting);
    let written = ctx
        .artifacts
        .write_report(&job.address, &report, bytecode_bytes);
    if let Err(err) = ctx.artifacts.remove_scratch(&job.address) {
        tracing::warn!(
            "[WORKER {}] Could not remove scratch file for {}: {}",
            slot,
            job.address,
            err
        );
    }
    if let Err(err) = written {
        state.set(WorkerState::Idle);
        return Err(err.into());
    }

    if report.outcome.is_success() {
        tracing::info!(
            "[WORKER {}] Finished {}: {} bytes of bytecode, {} bytes of report in {:.1}s",
            slot,
            job.address,
            bytecode_bytes,
            report.output.len(),
            started.elapsed().as_secs_f64()
        );
    } else {
        tracing::warn!(
            "[WORKER {}] Analyzer {} for {} after {:.1}s ({} bytes of bytecode, {} bytes captured)",
            slot,
            report.outcome.as_str(),
            job.address,
            started.elapsed().as_secs_f64(),
            bytecode_bytes,
            report.output.len()
        );
    }

    state.set(WorkerState::Idle);
    Ok(WorkerOutcome::Analyzed {
        address: job.address,
        outcome: report.outcome,
    })
}
