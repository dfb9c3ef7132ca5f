//! Fixed-size worker pool with reconciliation.
//!
//! The supervisor keeps `desired` slots alive. Each slot runs one worker pass at a
//! time; when the pass ends (normally, with an error, or by panicking) a monitor task
//! reports the exit and the slot is relaunched. Every `interval` the supervisor also
//! prunes exited analyzer containers and re-runs reconciliation, so a lost slot is
//! repaired within one interval at worst.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;

use crate::error::{Result, SweepError};
use crate::worker::{run_once, SlotState, WorkerContext, WorkerOutcome, WorkerState};

pub const DEFAULT_SUPERVISE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub launches: usize,
    pub analyzed: usize,
    pub failed_analyses: usize,
    pub skipped: usize,
    pub worker_errors: usize,
    pub crashes: usize,
}

struct SlotExit {
    slot: usize,
    result: std::result::Result<Result<WorkerOutcome>, JoinError>,
}

pub struct Supervisor {
    ctx: Arc<WorkerContext>,
    desired: usize,
    interval: Duration,
    alive: Vec<bool>,
    live: Arc<AtomicUsize>,
    states: Vec<Arc<SlotState>>,
    exit_tx: mpsc::UnboundedSender<SlotExit>,
    exit_rx: mpsc::UnboundedReceiver<SlotExit>,
    phase: SupervisorPhase,
    report: SupervisorReport,
    fatal: Option<SweepError>,
}

impl Supervisor {
    pub fn new(ctx: Arc<WorkerContext>, desired: usize, interval: Duration) -> Self {
        let desired = desired.max(1);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Self {
            ctx,
            desired,
            interval,
            alive: vec![false; desired],
            live: Arc::new(AtomicUsize::new(0)),
            states: (0..desired).map(|_| Arc::new(SlotState::default())).collect(),
            exit_tx,
            exit_rx,
            phase: SupervisorPhase::Running,
            report: SupervisorReport::default(),
            fatal: None,
        }
    }

    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|alive| **alive).count()
    }

    /// Live-slot gauge that stays readable while [`Supervisor::run`] owns the pool.
    pub fn live_gauge(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live)
    }

    fn set_alive(&mut self, slot: usize, alive: bool) {
        self.alive[slot] = alive;
        self.live.store(self.alive_count(), Ordering::Release);
    }

    /// Current state of every slot, by index.
    pub fn slot_states(&self) -> Vec<WorkerState> {
        self.states.iter().map(|state| state.get()).collect()
    }

    fn launch(&mut self, slot: usize) {
        let ctx = Arc::clone(&self.ctx);
        let state = Arc::clone(&self.states[slot]);
        let worker = tokio::spawn(async move { run_once(&ctx, slot, &state).await });

        let exit_tx = self.exit_tx.clone();
        tokio::spawn(async move {
            let result = worker.await;
            let _ = exit_tx.send(SlotExit { slot, result });
        });

        self.set_alive(slot, true);
        self.report.launches += 1;
    }

    /// Spawn a worker for every dead slot. Returns how many were launched.
    fn reconcile(&mut self) -> usize {
        if self.phase != SupervisorPhase::Running || self.ctx.shutdown.is_cancelled() {
            return 0;
        }
        let dead: Vec<usize> = (0..self.desired).filter(|slot| !self.alive[*slot]).collect();
        for slot in &dead {
            self.launch(*slot);
        }
        dead.len()
    }

    fn handle_exit(&mut self, exit: SlotExit) {
        self.set_alive(exit.slot, false);
        match exit.result {
            Ok(Ok(WorkerOutcome::Analyzed { outcome, .. })) => {
                self.report.analyzed += 1;
                if !outcome.is_success() {
                    self.report.failed_analyses += 1;
                }
            }
            Ok(Ok(WorkerOutcome::Skipped { .. })) => self.report.skipped += 1,
            Ok(Ok(WorkerOutcome::Drained)) => {}
            Ok(Err(err)) if err.is_fatal() => {
                tracing::error!(
                    "[SUPERVISOR] Slot {} hit a fatal error: {}. Stopping the pool.",
                    exit.slot,
                    err
                );
                self.report.worker_errors += 1;
                if self.fatal.is_none() {
                    self.fatal = Some(err);
                }
                self.ctx.shutdown.cancel();
            }
            Ok(Err(err)) => {
                tracing::warn!("[SUPERVISOR] Slot {} failed its job: {}", exit.slot, err);
                self.report.worker_errors += 1;
            }
            Err(join_err) => {
                tracing::error!("[SUPERVISOR] Slot {} crashed: {}", exit.slot, join_err);
                self.states[exit.slot] = Arc::new(SlotState::default());
                self.report.crashes += 1;
            }
        }
    }

    /// Run the pool until the shutdown token fires, then drain.
    ///
    /// Returns once every slot has exited. A fatal worker error is returned after
    /// the drain completes.
    pub async fn run(mut self) -> Result<SupervisorReport> {
        self.ctx.analyzer.prune().await;
        let launched = self.reconcile();
        tracing::info!("[SUPERVISOR] Launched {} worker slots", launched);

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.ctx.shutdown.cancelled() => break,
                exit = self.exit_rx.recv() => {
                    // The supervisor holds a sender, so the channel never closes here.
                    if let Some(exit) = exit {
                        self.handle_exit(exit);
                    }
                }
                _ = ticker.tick() => {
                    self.ctx.analyzer.prune().await;
                    let alive = self.alive_count();
                    if alive < self.desired {
                        tracing::warn!(
                            "[SUPERVISOR] {} of {} slots alive at tick",
                            alive,
                            self.desired
                        );
                    }
                }
            }
            self.reconcile();
        }

        self.phase = SupervisorPhase::Draining;
        let in_flight = self
            .slot_states()
            .iter()
            .filter(|state| matches!(state, WorkerState::Analyzing | WorkerState::Reporting))
            .count();
        tracing::info!(
            "[SUPERVISOR] Draining {} live slots ({} mid-analysis)",
            self.alive_count(),
            in_flight
        );
        for (slot, state) in self.slot_states().iter().enumerate() {
            tracing::debug!("[SUPERVISOR] Slot {} is {}", slot, state.as_str());
        }
        while self.alive_count() > 0 {
            match self.exit_rx.recv().await {
                Some(exit) => self.handle_exit(exit),
                None => break,
            }
        }

        self.ctx.analyzer.prune().await;
        match self.ctx.artifacts.clear_scratch() {
            Ok(0) => {}
            Ok(removed) => tracing::info!("[SUPERVISOR] Removed {} stale scratch files", removed),
            Err(err) => tracing::warn!("[SUPERVISOR] Final scratch cleanup failed: {}", err),
        }
        self.phase = SupervisorPhase::Stopped;
        tracing::info!("[SUPERVISOR] Stopped: {:?}", self.report);

        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(self.report),
        }
    }
}
