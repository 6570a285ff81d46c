//! Error types for the communication layer.

use thiserror::Error;

use scenelink_core::{CoreError, ParticipantId};

/// Errors that can occur in communication operations.
#[derive(Debug, Error)]
pub enum CommunicationError {
    /// The session itself is not connected.
    #[error("communication session is not connected")]
    SessionNotConnected,

    /// The addressed participant is not currently connected.
    #[error("participant not connected: {participant}")]
    NotConnected { participant: ParticipantId },

    /// A peer sent data that violates the protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The transport failed to connect, disconnect or accept a frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// A local message breaks a protocol limit and was not sent.
    #[error("message rejected before sending: {0}")]
    InvalidMessage(String),

    /// Frame encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// An encoded frame exceeds the transport's maximum message size.
    #[error("message of {size} bytes exceeds transport limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Chunk codec error.
    #[error("chunk error: {0}")]
    Chunk(#[from] CoreError),
}

impl CommunicationError {
    /// Whether this error stems from missing connectivity rather than bad data.
    pub fn is_not_connected(&self) -> bool {
        matches!(
            self,
            CommunicationError::SessionNotConnected | CommunicationError::NotConnected { .. }
        )
    }
}

/// Result type for communication operations.
pub type Result<T> = std::result::Result<T, CommunicationError>;
