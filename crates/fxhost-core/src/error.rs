//! Error types for fxhost-core.

use thiserror::Error;

/// Error type for fxhost-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid descriptor \"{path}\": {reason}")]
    InvalidDescriptor { path: String, reason: String },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid option value for '{key}': {value}")]
    InvalidOption { key: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
