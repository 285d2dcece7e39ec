//! Electorate Error Types

use thiserror::Error;

/// Result type alias for electorate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Electorate error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Election errors
    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Candidate {candidate} missing from membership snapshot")]
    InconsistentState { candidate: String },

    #[error("Coordination session expired")]
    SessionExpired,

    // Coordination service errors
    #[error("Coordination error: {0}")]
    Coordination(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Session is closed")]
    SessionClosed,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl Error {
    /// Check if this error ends the candidate's participation for good.
    ///
    /// A fatal error means the candidate's identity is unusable: it must
    /// either exit or start over with a brand-new registration.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Registration(_)
                | Error::InconsistentState { .. }
                | Error::SessionExpired
                | Error::SessionClosed
        )
    }
}
