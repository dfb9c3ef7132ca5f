use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::explorer::ChainSource;
use crate::storage::ledger::Ledger;

pub const DEFAULT_STALL_INTERVAL: Duration = Duration::from_secs(60);

/// Result of a single head poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A strictly newer block was harvested.
    Advanced { block: u64, added: usize },
    /// The head has not moved past the cursor.
    Stalled { head: u64 },
    /// The head moved but its body is not served yet; the cursor stays put.
    BlockUnavailable { head: u64 },
    /// The head could not be read over the network.
    Unreachable,
}

/// Pending addresses harvested from blocks, plus the block cursor.
///
/// Not synchronized; callers hold the coordinator lock. Refills run network I/O
/// while that lock is held, so only one worker ever fetches a block at a time.
#[derive(Debug)]
pub struct WorkQueue {
    pending: VecDeque<String>,
    queued: HashSet<String>,
    cursor: Option<u64>,
    stall_interval: Duration,
}

impl WorkQueue {
    pub fn new(stall_interval: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            queued: HashSet::new(),
            cursor: None,
            stall_interval,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Last block whose transactions were harvested.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Queue an address. Addresses already known to the ledger or already pending
    /// are dropped here; consumers still re-check the ledger.
    pub fn push(&mut self, address: String, ledger: &Ledger) -> bool {
        if ledger.contains(&address) || self.queued.contains(&address) {
            return false;
        }
        self.queued.insert(address.clone());
        self.pending.push_back(address);
        true
    }

    fn pop(&mut self) -> Option<String> {
        let address = self.pending.pop_front()?;
        self.queued.remove(&address);
        Some(address)
    }

    /// Pop the next pending address, pulling new blocks while the pool is empty.
    ///
    /// `Ok(None)` only after cancellation. Fatal provider errors are returned.
    pub async fn next(
        &mut self,
        chain: &dyn ChainSource,
        ledger: &Ledger,
        shutdown: &CancellationToken,
    ) -> Result<Option<String>, ProviderError> {
        loop {
            if let Some(address) = self.pop() {
                return Ok(Some(address));
            }
            if self.refill_from_next_block(chain, ledger, shutdown).await?.is_none() {
                return Ok(None);
            }
        }
    }

    /// One head poll, no sleeping. The cursor only moves when a strictly newer
    /// block is both announced and served.
    pub async fn try_advance(
        &mut self,
        chain: &dyn ChainSource,
        ledger: &Ledger,
    ) -> Result<PollOutcome, ProviderError> {
        let head = match chain.latest_block_number().await {
            Ok(head) => head,
            Err(err) if !err.is_fatal() => {
                tracing::warn!("[QUEUE] Head poll failed: {}", err);
                return Ok(PollOutcome::Unreachable);
            }
            Err(err) => return Err(err),
        };
        if self.cursor.is_some_and(|cursor| head <= cursor) {
            return Ok(PollOutcome::Stalled { head });
        }

        let block = match chain.block_by_number(head).await {
            Ok(Some(block)) => block,
            Ok(None) => {
                tracing::debug!("[QUEUE] Block {} announced but not served yet", head);
                return Ok(PollOutcome::BlockUnavailable { head });
            }
            Err(err) if !err.is_fatal() => {
                tracing::warn!("[QUEUE] Fetching block {} failed: {}", head, err);
                return Ok(PollOutcome::Unreachable);
            }
            Err(err) => return Err(err),
        };

        self.cursor = Some(head);
        let mut added = 0usize;
        for address in block.candidate_addresses() {
            if self.push(address, ledger) {
                added += 1;
            }
        }
        tracing::info!(
            "[QUEUE] Block {} harvested: {} txs, {} new candidates, {} pending",
            head,
            block.transactions.len(),
            added,
            self.pending.len()
        );
        Ok(PollOutcome::Advanced { block: head, added })
    }

    /// Poll until a strictly newer block is harvested, sleeping `stall_interval`
    /// between polls that do not advance.
    ///
    /// Returns the harvested block number, or `None` if cancelled while waiting.
    pub async fn refill_from_next_block(
        &mut self,
        chain: &dyn ChainSource,
        ledger: &Ledger,
        shutdown: &CancellationToken,
    ) -> Result<Option<u64>, ProviderError> {
        loop {
            if shutdown.is_cancelled() {
                return Ok(None);
            }
            match self.try_advance(chain, ledger).await? {
                PollOutcome::Advanced { block, .. } => return Ok(Some(block)),
                PollOutcome::Stalled { head } => {
                    tracing::info!("[QUEUE] Waiting for a new block (head={})...", head);
                }
                PollOutcome::BlockUnavailable { .. } | PollOutcome::Unreachable => {}
            }
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(None),
                _ = tokio::time::sleep(self.stall_interval) => {}
            }
        }
    }
}
