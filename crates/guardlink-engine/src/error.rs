use guardlink_core::types::Region;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a provider implementation.
///
/// Providers classify their own failures; the engine only cares whether a
/// failure is worth retrying. Throttling and unavailability are transient,
/// everything else is permanent for the current run.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("throttled: {0}")]
    Throttled(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Throttled(_) | ProviderError::Unavailable(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// The one fatal condition: without the administrator's own session
    /// nothing at all can run.
    #[error("cannot obtain administrator base session: {0}")]
    BaseSession(String),

    #[error("{op} failed: {source}")]
    Failed {
        op: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("{op} failed after {attempts} attempts: {source}")]
    Exhausted {
        op: &'static str,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("{op} timed out after {timeout:?}")]
    Timeout {
        op: &'static str,
        timeout: Duration,
    },

    #[error("region {region} exceeded the run deadline")]
    DeadlineExceeded { region: Region },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Core(#[from] guardlink_core::GuardlinkError),
}
