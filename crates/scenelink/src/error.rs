//! Error types for scenelink.

use scenelink_comm::CommunicationError;
use scenelink_core::CoreError;
use thiserror::Error;

/// Errors that can occur when using scenelink.
#[derive(Debug, Error)]
pub enum ScenelinkError {
    /// Chunk codec error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Communication error.
    #[error("communication error: {0}")]
    Communication(#[from] CommunicationError),

    /// Configuration file could not be read.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration is well-formed but unusable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl ScenelinkError {
    /// Whether this error reports an unconnected session or peer.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, ScenelinkError::Communication(e) if e.is_not_connected())
    }
}

/// Result type for scenelink operations.
pub type Result<T> = std::result::Result<T, ScenelinkError>;
