use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardlinkError {
    #[error("invalid relationship state: {0}")]
    InvalidRelationshipState(String),

    #[error("invalid duration '{0}': expected seconds or suffixed value like 30s, 5m")]
    InvalidDuration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GuardlinkError>;
