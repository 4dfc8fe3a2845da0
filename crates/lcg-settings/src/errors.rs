//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to produce a usable [`GatewaySettings`](crate::GatewaySettings).
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file or the merged document is not valid settings JSON.
    #[error("malformed settings in {}: {source}", path.display())]
    Parse {
        /// File the document came from.
        path: PathBuf,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// Values that parse but cannot run together.
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl SettingsError {
    /// Stable category string for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Parse { .. } => "parse",
            Self::Invalid(_) => "invalid",
        }
    }
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
