//! CLI error types and conversions

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::sync::{SyncError, TokenParseError};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Config file could not be read or written
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Upstream API error
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Sync run failed
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Malformed resume token on the command line
    #[error("resume token error: {0}")]
    ResumeToken(#[from] TokenParseError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
