//! Error types for server startup and configuration.
//!
//! Protocol level outcomes (dropped messages, NoBinding) are not errors, see
//! `NoResponseReason` in the v6 handlers.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or file I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed.
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration parsed but holds values the server cannot offer.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Interface lookup or binding failed.
    #[error("Interface {name}: {reason}")]
    Interface { name: String, reason: String },

    /// Bad command line.
    #[error("Argument error: {0}")]
    Args(#[from] pico_args::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
