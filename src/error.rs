// Application error types for setup code (config, logging)
//
// Service control failures never surface here; the sync engine recovers
// them and reports notices instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration in {path}: {source}")]
    ConfigInvalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to initialize logging: {message}")]
    Logging { message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}
