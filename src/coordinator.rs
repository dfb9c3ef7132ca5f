use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::analyzer::AnalysisJob;
use crate::error::Result;
use crate::explorer::ChainSource;
use crate::storage::ledger::Ledger;
use crate::utils::hex::is_empty_code;
use crate::work_queue::WorkQueue;
use crate::worker::{SlotState, WorkerState};

/// Shared state guarded by the stage lock.
#[derive(Debug)]
pub struct ScanState {
    pub ledger: Ledger,
    pub queue: WorkQueue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub known_addresses: usize,
    pub known_contracts: usize,
    pub pending: usize,
    pub cursor: Option<u64>,
}

/// Owns the ledger and the pending pool behind one mutex.
///
/// The whole fetch/classify stage runs under that lock: dequeue, ledger check,
/// bytecode fetch and ledger write. Two workers can therefore never classify, or
/// be handed, the same address.
pub struct Coordinator {
    state: Mutex<ScanState>,
    chain: Arc<dyn ChainSource>,
}

impl Coordinator {
    pub fn new(ledger: Ledger, queue: WorkQueue, chain: Arc<dyn ChainSource>) -> Self {
        Self {
            state: Mutex::new(ScanState { ledger, queue }),
            chain,
        }
    }

    /// Classify pending addresses until one turns out to be an unanalyzed contract.
    ///
    /// Every classified address is recorded in the ledger before the lock is
    /// released, contract or not. `Ok(None)` means shutdown was observed.
    pub async fn claim_next_contract(
        &self,
        time_budget: Duration,
        shutdown: &CancellationToken,
    ) -> Result<Option<AnalysisJob>> {
        self.claim_for_slot(time_budget, shutdown, None).await
    }

    /// [`Coordinator::claim_next_contract`] that also moves `slot` between
    /// `Fetching` and `Classifying` as addresses are dequeued and looked up.
    pub async fn claim_for_slot(
        &self,
        time_budget: Duration,
        shutdown: &CancellationToken,
        slot: Option<&SlotState>,
    ) -> Result<Option<AnalysisJob>> {
        let mark = |state: WorkerState| {
            if let Some(slot) = slot {
                slot.set(state);
            }
        };
        let mut guard = self.state.lock().await;
        let ScanState { ledger, queue } = &mut *guard;

        loop {
            if shutdown.is_cancelled() {
                return Ok(None);
            }
            let Some(address) = queue.next(self.chain.as_ref(), ledger, shutdown).await? else {
                return Ok(None);
            };
            if ledger.contains(&address) {
                continue;
            }

            mark(WorkerState::Classifying);
            let code = self.chain.code_at(&address).await;
            mark(WorkerState::Fetching);
            let code = match code {
                Ok(code) => code,
                Err(err) if !err.is_fatal() => {
                    tracing::warn!(
                        "[CLASSIFY] Skipping {} after transport failure: {}",
                        address,
                        err
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let is_contract = !is_empty_code(&code);
            ledger.record(&address, is_contract)?;
            if !is_contract {
                tracing::debug!("[CLASSIFY] {} is not a contract", address);
                continue;
            }

            tracing::info!(
                "[CLASSIFY] {} is a contract ({} pending, {} known)",
                address,
                queue.len(),
                ledger.len()
            );
            return Ok(Some(AnalysisJob {
                address,
                bytecode: code,
                time_budget,
            }));
        }
    }

    pub async fn stats(&self) -> ScanStats {
        let guard = self.state.lock().await;
        ScanStats {
            known_addresses: guard.ledger.len(),
            known_contracts: guard.ledger.contract_count(),
            pending: guard.queue.len(),
            cursor: guard.queue.cursor(),
        }
    }

    /// Run `f` against the state under the stage lock.
    pub async fn with_state<R>(&self, f: impl FnOnce(&ScanState) -> R) -> R {
        let guard = self.state.lock().await;
        f(&guard)
    }
}
