use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Conventional exit status for a process ended by SIGINT.
pub const FORCE_QUIT_EXIT_CODE: i32 = 130;

/// First interrupt starts a graceful drain; a second one asks for a hard exit.
///
/// `next_interrupt` resolves to `true` per delivered interrupt and `false` once the
/// signal source is gone. Returns `true` when the caller should exit immediately.
pub async fn escalate_interrupts<F, Fut>(
    mut next_interrupt: F,
    shutdown: CancellationToken,
    drain_minutes: u64,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !next_interrupt().await {
        return false;
    }
    tracing::warn!(
        "[SHUTDOWN] Interrupt received. Draining in-flight analyses, this can take up to {} min. Press Ctrl+C again to quit now.",
        drain_minutes
    );
    shutdown.cancel();

    if !next_interrupt().await {
        return false;
    }
    tracing::error!("[SHUTDOWN] Second interrupt received. Abandoning the drain.");
    true
}
