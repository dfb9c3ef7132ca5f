use crate::error::{ConfigError, Result};
use crate::runtime::RuntimeArgs;
use std::path::PathBuf;
use std::time::Duration;

pub const LEDGER_FILE_NAME: &str = "history.json";
pub const SCRATCH_DIR_NAME: &str = "tmp";
pub const REPORT_DIR_NAME: &str = "data";
pub const PROVIDER_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_THREADS: usize = 64;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub threads: usize,
    pub time_budget: Duration,
    pub api_key: String,
    pub explorer_url: String,
    pub ledger_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub report_dir: PathBuf,
    pub poll_interval: Duration,
    pub supervise_interval: Duration,
    pub http_timeout: Duration,
    pub analyzer_image: String,
    pub docker_bin: String,
    pub analyzer_modules: Option<String>,
}

fn validate_http_url(name: &str, raw: &str) -> Result<()> {
    let parsed = raw.parse::<reqwest::Url>().map_err(|e| {
        ConfigError::Invalid(format!("{name} must be a valid URL, got `{raw}`: {e}"))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(
            ConfigError::Invalid(format!("{name} must use http(s) scheme, got `{other}`")).into(),
        ),
    }
}

impl ScanConfig {
    pub fn from_args(args: &RuntimeArgs) -> Result<Self> {
        let api_key = args.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(ConfigError::Missing(
                "API_KEY must be set (or pass --api-key)".to_string(),
            )
            .into());
        }

        let explorer_url = args.explorer_url.trim().to_string();
        validate_http_url("EXPLORER_API_URL", &explorer_url)?;

        if args.execution_minutes == 0 {
            return Err(ConfigError::Invalid(
                "ANALYSIS_EXECUTION_MINUTES must be at least 1".to_string(),
            )
            .into());
        }

        let analyzer_image = args.analyzer_image.trim().to_string();
        if analyzer_image.is_empty() {
            return Err(ConfigError::Invalid("ANALYZER_IMAGE must not be empty".to_string()).into());
        }

        let analyzer_modules = args
            .analyzer_modules
            .as_deref()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            threads: args.threads.clamp(1, MAX_THREADS),
            time_budget: Duration::from_secs(args.execution_minutes.saturating_mul(60)),
            api_key,
            explorer_url,
            ledger_path: args.work_dir.join(LEDGER_FILE_NAME),
            scratch_dir: args.work_dir.join(SCRATCH_DIR_NAME),
            report_dir: args.work_dir.join(REPORT_DIR_NAME),
            poll_interval: Duration::from_secs(args.poll_interval_secs.max(1)),
            supervise_interval: Duration::from_secs(args.supervise_interval_secs.max(1)),
            http_timeout: PROVIDER_HTTP_TIMEOUT,
            analyzer_image,
            docker_bin: args.docker_bin.trim().to_string(),
            analyzer_modules,
        })
    }
}
