use clap::Parser;
use std::path::PathBuf;

use crate::supervisor::DEFAULT_SUPERVISE_INTERVAL;
use crate::work_queue::DEFAULT_STALL_INTERVAL;

pub const DEFAULT_THREADS: usize = 8;
pub const DEFAULT_EXECUTION_MINUTES: u64 = 30;
pub const DEFAULT_EXPLORER_API_URL: &str = "https://api.etherscan.io/api";
pub const DEFAULT_ANALYZER_IMAGE: &str = "mythril/myth";

/// Operator surface. Every flag falls back to an environment key so `.env` works unchanged.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "contract-sweeper",
    about = "Follow new blocks, find fresh contracts and run them through a sandboxed analyzer"
)]
pub struct RuntimeArgs {
    /// Number of concurrent worker slots.
    #[arg(long, env = "SCAN_THREADS", default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Analysis time budget per contract, in minutes.
    #[arg(long, env = "ANALYSIS_EXECUTION_MINUTES", default_value_t = DEFAULT_EXECUTION_MINUTES)]
    pub execution_minutes: u64,

    /// Explorer API key.
    #[arg(long, env = "API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    #[arg(long, env = "EXPLORER_API_URL", default_value = DEFAULT_EXPLORER_API_URL)]
    pub explorer_url: String,

    /// Directory holding `history.json`, `tmp/` and `data/`.
    #[arg(long, env = "SCAN_WORK_DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Sleep between polls when the chain head has not moved.
    #[arg(long, env = "BLOCK_POLL_INTERVAL_SECS", default_value_t = DEFAULT_STALL_INTERVAL.as_secs())]
    pub poll_interval_secs: u64,

    #[arg(long, env = "SUPERVISE_INTERVAL_SECS", default_value_t = DEFAULT_SUPERVISE_INTERVAL.as_secs())]
    pub supervise_interval_secs: u64,

    #[arg(long, env = "ANALYZER_IMAGE", default_value = DEFAULT_ANALYZER_IMAGE)]
    pub analyzer_image: String,

    #[arg(long, env = "DOCKER_BIN", default_value = "docker")]
    pub docker_bin: String,

    /// Comma-separated analyzer module list passed through as `-m`.
    #[arg(long, env = "ANALYZER_MODULES")]
    pub analyzer_modules: Option<String>,

    /// Print the resolved configuration and exit.
    #[arg(long, default_value_t = false)]
    pub explain_config: bool,
}

pub fn parse_runtime_args() -> RuntimeArgs {
    RuntimeArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_scan_env() {
        for key in [
            "SCAN_THREADS",
            "ANALYSIS_EXECUTION_MINUTES",
            "API_KEY",
            "EXPLORER_API_URL",
            "SCAN_WORK_DIR",
            "BLOCK_POLL_INTERVAL_SECS",
            "SUPERVISE_INTERVAL_SECS",
            "ANALYZER_IMAGE",
            "DOCKER_BIN",
            "ANALYZER_MODULES",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn defaults_apply_without_flags() {
        let _guard = env_lock().lock().expect("env lock");
        clear_scan_env();
        let args = RuntimeArgs::try_parse_from(["contract-sweeper"]).expect("parse");
        assert_eq!(args.threads, DEFAULT_THREADS);
        assert_eq!(args.execution_minutes, DEFAULT_EXECUTION_MINUTES);
        assert_eq!(args.explorer_url, DEFAULT_EXPLORER_API_URL);
        assert_eq!(args.analyzer_image, DEFAULT_ANALYZER_IMAGE);
        assert!(args.api_key.is_empty());
        assert!(args.analyzer_modules.is_none());
        assert!(!args.explain_config);
    }

    #[test]
    fn flags_override_environment() {
        let _guard = env_lock().lock().expect("env lock");
        clear_scan_env();
        std::env::set_var("SCAN_THREADS", "4");
        std::env::set_var("API_KEY", "from-env");
        let args = RuntimeArgs::try_parse_from([
            "contract-sweeper",
            "--threads",
            "12",
            "--execution-minutes",
            "5",
        ])
        .expect("parse");
        assert_eq!(args.threads, 12);
        assert_eq!(args.execution_minutes, 5);
        assert_eq!(args.api_key, "from-env");
        clear_scan_env();
    }

    #[test]
    fn rejects_non_numeric_threads() {
        let _guard = env_lock().lock().expect("env lock");
        clear_scan_env();
        let err = RuntimeArgs::try_parse_from(["contract-sweeper", "--threads", "many"])
            .expect_err("parse should fail");
        assert!(err.to_string().contains("--threads"));
    }
}
