//! # Scenelink Core
//!
//! Pure primitives shared by every scenelink participant: identities, scene
//! metadata, resources and the chunk codec that moves large resources across
//! a transport with a bounded message size.
//!
//! This crate contains no I/O and no networking.
//!
//! ## Key Types
//!
//! - [`ParticipantId`] - 128-bit address of one participant process
//! - [`SceneId`] / [`SceneInfo`] - scene identity and published metadata
//! - [`Resource`] / [`ResourceContentHash`] - content-addressed binary blob
//! - [`ResourceChunk`] - bounded slice of a resource with positional metadata
//! - [`Reassembler`] - per-sender accumulator turning chunks back into payloads
//!
//! ## Chunking
//!
//! ```rust
//! use scenelink_core::{chunk, ParticipantId, Reassembler, Resource};
//!
//! let resource = Resource::new(vec![7u8; 10_000]);
//! let chunks = chunk::split(&resource.data, resource.hash, 4096).unwrap();
//! assert_eq!(chunks.len(), 3);
//!
//! let sender = ParticipantId::generate();
//! let mut reassembler = Reassembler::new(1 << 20);
//! let mut delivered = None;
//! for c in chunks.into_iter().rev() {
//!     delivered = reassembler.ingest(sender, c).unwrap();
//! }
//! assert_eq!(delivered.unwrap(), resource.data);
//! ```

pub mod chunk;
pub mod error;
pub mod scene;
pub mod types;

pub use chunk::{split, Reassembler, ResourceChunk};
pub use error::{CoreError, Result};
pub use scene::{PublicationMode, Resource, SceneAction, SceneActionCollection, SceneInfo};
pub use types::{ParticipantId, ResourceContentHash, SceneId};
