//! Error types for scenelink core.

use thiserror::Error;

use crate::types::ResourceContentHash;

/// Errors raised by the chunk codec.
///
/// Every variant other than `InvalidChunkSize` describes a peer that sent an
/// inconsistent chunk stream. The offending stream is dropped by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("chunk for {resource} out of bounds: offset {offset} + len {len} > total {total}")]
    ChunkOutOfBounds {
        resource: ResourceContentHash,
        offset: u64,
        len: u64,
        total: u64,
    },

    #[error("total size mismatch for {resource}: pending {expected}, chunk declares {declared}")]
    TotalSizeMismatch {
        resource: ResourceContentHash,
        expected: u64,
        declared: u64,
    },

    #[error("chunk for {resource} at offset {offset} overlaps data already received")]
    OverlappingChunk {
        resource: ResourceContentHash,
        offset: u64,
    },

    #[error("declared payload size {declared} for {resource} exceeds limit {limit}")]
    PayloadTooLarge {
        resource: ResourceContentHash,
        declared: u64,
        limit: u64,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
