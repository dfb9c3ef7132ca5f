use crate::storage::ledger::Ledger;
use crate::utils::config::ScanConfig;

/// Hide all but the last four characters of a credential.
pub fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

pub fn emit_config_status(config: &ScanConfig) {
    tracing::info!(
        "[OPS] Config resolved: threads={} budget={}m explorer={} api_key={} poll={}s supervise={}s",
        config.threads,
        config.time_budget.as_secs() / 60,
        config.explorer_url,
        redact(&config.api_key),
        config.poll_interval.as_secs(),
        config.supervise_interval.as_secs()
    );
    tracing::info!(
        "[OPS] Artifacts: ledger={} scratch={} reports={}",
        config.ledger_path.display(),
        config.scratch_dir.display(),
        config.report_dir.display()
    );
    tracing::info!(
        "[OPS] Analyzer: {} run {}{}",
        config.docker_bin,
        config.analyzer_image,
        config
            .analyzer_modules
            .as_deref()
            .map(|m| format!(" -m {m}"))
            .unwrap_or_default()
    );
}

pub fn emit_ledger_status(ledger: &Ledger) {
    tracing::info!(
        "[OPS] Ledger loaded from {}: {} addresses known ({} contracts)",
        ledger.path().display(),
        ledger.len(),
        ledger.contract_count()
    );
}
