use std::fs;
use std::path::Path;

const ENV_EXAMPLE_TEMPLATE: &str = "\
# Copy to `.env` and fill in. Variables already set in the environment win.

# Explorer proxy API credential (required).
API_KEY=\"CHANGE_ME\"
EXPLORER_API_URL=\"https://api.etherscan.io/api\"

# Worker slots and per-contract analysis budget.
SCAN_THREADS=8
ANALYSIS_EXECUTION_MINUTES=30

RUST_LOG=\"info,contract_sweeper=info\"
";

/// Load `path` into the process environment without overriding existing values.
/// Returns `Ok(false)` when the file does not exist.
pub fn load_env_file(path: &Path) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(err) if err.not_found() => Ok(false),
        Err(err) => Err(err),
    }
}

fn ensure_env_example_exists(path: &Path) {
    if path.exists() {
        return;
    }
    if let Err(err) = fs::write(path, ENV_EXAMPLE_TEMPLATE) {
        eprintln!("[ENV] Could not write {}: {}", path.display(), err);
    }
}

/// Runs before argument parsing so `.env` values feed clap's env fallbacks.
pub fn harden_env_setup() {
    ensure_env_example_exists(Path::new(".env.example"));
    if let Err(err) = load_env_file(Path::new(".env")) {
        eprintln!("[ENV] Ignoring unreadable .env: {}", err);
    }
    if std::env::var_os("API_KEY").is_none() {
        eprintln!("[ENV] WARN: API_KEY is not set");
    }
}
