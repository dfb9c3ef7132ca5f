use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SweepError>;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SweepError {
    /// Fatal errors stop the whole pool. Scratch/report I/O only costs the current job.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Provider(err) => err.is_fatal(),
            Self::Ledger(_) | Self::Config(_) => true,
            Self::Io(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("provider returned HTTP {status}: {reason}")]
    HttpStatus { status: u16, reason: String },
    #[error("provider rejected request: {0}")]
    Rejected(String),
    #[error("malformed provider payload: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Only transport failures are worth another poll; everything else points at
    /// a bad key or a malformed query.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io failure at `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger file `{path}` is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_the_only_recoverable_provider_errors() {
        assert!(!ProviderError::Transport("timeout".into()).is_fatal());
        assert!(ProviderError::HttpStatus {
            status: 403,
            reason: "Forbidden".into()
        }
        .is_fatal());
        assert!(ProviderError::Rejected("Invalid API Key".into()).is_fatal());
        assert!(ProviderError::Malformed("not json".into()).is_fatal());
    }

    #[test]
    fn io_errors_stay_worker_local() {
        let io = SweepError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(!io.is_fatal());
        let ledger = SweepError::Ledger(LedgerError::Malformed {
            path: PathBuf::from("history.json"),
            reason: "expected object".into(),
        });
        assert!(ledger.is_fatal());
        let transport = SweepError::from(ProviderError::Transport("reset".into()));
        assert!(!transport.is_fatal());
    }
}
