//! Error types for the netwatch service

/// Errors that can occur in the netwatch service
///
/// An unreachable host is a [`ProbeOutcome`](crate::probe::ProbeOutcome),
/// not an error.
#[derive(Debug, thiserror::Error)]
pub enum NetwatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Prober error: {0}")]
    Probe(String),

    #[error("History store error: {0}")]
    History(String),

    #[error("API error: {0}")]
    Api(String),
}

impl From<rusqlite::Error> for NetwatchError {
    fn from(e: rusqlite::Error) -> Self {
        NetwatchError::History(e.to_string())
    }
}

/// Result type alias for netwatch operations
pub type Result<T> = std::result::Result<T, NetwatchError>;
