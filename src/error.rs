//! Error types for itemtrack

use std::io;

use thiserror::Error;

/// Result type alias for itemtrack
pub type Result<T> = std::result::Result<T, Error>;

/// Process-level errors (configuration, startup, serving).
///
/// Per-request failures live next to the code that raises them:
/// [`crate::store::StoreError`] and [`crate::gateway::auth::Unauthorized`].
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
