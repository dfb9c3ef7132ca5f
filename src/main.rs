//! Scan coordinator binary: follows the chain head and feeds new contracts to the analyzer.

use std::sync::Arc;

use contract_sweeper::analyzer::DockerAnalyzer;
use contract_sweeper::coordinator::Coordinator;
use contract_sweeper::explorer::ExplorerClient;
use contract_sweeper::runtime::{
    emit_config_status, emit_ledger_status, escalate_interrupts, parse_runtime_args,
    FORCE_QUIT_EXIT_CODE,
};
use contract_sweeper::storage::artifacts::ArtifactPaths;
use contract_sweeper::storage::ledger::Ledger;
use contract_sweeper::supervisor::Supervisor;
use contract_sweeper::utils::config::ScanConfig;
use contract_sweeper::work_queue::WorkQueue;
use contract_sweeper::worker::WorkerContext;
use tokio_util::sync::CancellationToken;

fn spawn_signal_handlers(shutdown: &CancellationToken, drain_minutes: u64) {
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        let interrupts = || async { tokio::signal::ctrl_c().await.is_ok() };
        if escalate_interrupts(interrupts, on_ctrl_c, drain_minutes).await {
            std::process::exit(FORCE_QUIT_EXIT_CODE);
        }
    });

    #[cfg(unix)]
    {
        let on_term = shutdown.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let Ok(mut term_signal) = signal(SignalKind::terminate()) else {
                return;
            };
            let _ = term_signal.recv().await;
            tracing::warn!(
                "[SHUTDOWN] SIGTERM received. Draining in-flight analyses, this can take up to {} min...",
                drain_minutes
            );
            on_term.cancel();
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `.env` must be loaded before clap reads its env fallbacks.
    contract_sweeper::utils::env_guard::harden_env_setup();
    let runtime_args = parse_runtime_args();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ScanConfig::from_args(&runtime_args)?;
    emit_config_status(&config);
    if runtime_args.explain_config {
        tracing::info!("[OPS] --explain-config requested; configuration resolved, exiting.");
        return Ok(());
    }

    let artifacts = ArtifactPaths::new(&config.scratch_dir, &config.report_dir);
    artifacts.ensure_dirs()?;
    let stale = artifacts.clear_scratch()?;
    if stale > 0 {
        tracing::info!("[STARTUP] Removed {} scratch files left by a previous run", stale);
    }

    let ledger = Ledger::load(&config.ledger_path)?;
    emit_ledger_status(&ledger);

    let chain = Arc::new(ExplorerClient::new(
        config.explorer_url.clone(),
        config.api_key.clone(),
        config.http_timeout,
    )?);
    let analyzer = Arc::new(DockerAnalyzer::new(
        config.docker_bin.clone(),
        config.analyzer_image.clone(),
        config.scratch_dir.clone(),
        config.analyzer_modules.clone(),
    ));
    let coordinator = Arc::new(Coordinator::new(
        ledger,
        WorkQueue::new(config.poll_interval),
        chain,
    ));

    let shutdown = CancellationToken::new();
    spawn_signal_handlers(&shutdown, config.time_budget.as_secs().div_ceil(60));

    let ctx = Arc::new(WorkerContext {
        coordinator: Arc::clone(&coordinator),
        analyzer,
        artifacts,
        time_budget: config.time_budget,
        shutdown,
    });
    tracing::info!(
        "[STARTUP] Starting {} workers with a {}s analysis budget",
        config.threads,
        config.time_budget.as_secs()
    );

    let report = Supervisor::new(ctx, config.threads, config.supervise_interval)
        .run()
        .await?;

    let stats = coordinator.stats().await;
    tracing::info!(
        "[SHUTDOWN] Done. analyzed={} failed={} skipped={} crashes={} | ledger: {} addresses, {} contracts, cursor={:?}",
        report.analyzed,
        report.failed_analyses,
        report.skipped,
        report.crashes,
        stats.known_addresses,
        stats.known_contracts,
        stats.cursor
    );
    Ok(())
}
