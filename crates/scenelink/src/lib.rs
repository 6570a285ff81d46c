//! # Scenelink
//!
//! The unified API for scenelink - the communication layer connecting the
//! participants of a distributed scene-rendering system.
//!
//! ## Overview
//!
//! Scene providers publish scenes, renderers subscribe to them and receive a
//! stream of scene actions, and resources referenced by those actions are
//! requested and transferred on demand. Scenelink provides:
//!
//! - **Identity**: 128-bit participant ids addressing one process each
//! - **Connection status**: a per-peer state machine with exactly-once
//!   connect/disconnect notifications
//! - **Chunking**: resources of any size carried over a transport with a
//!   bounded message size
//! - **Dispatch**: decoded messages routed to the handler registered for their
//!   category
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scenelink::{MemoryNetwork, ParticipantId, ScenelinkConfig, SceneId};
//!
//! async fn example() -> scenelink::Result<()> {
//!     let config = ScenelinkConfig::from_json_str(r#"{"session": {}}"#)?;
//!     let network = MemoryNetwork::new();
//!     let session = config.build_session(network.create_transport(ParticipantId::generate()))?;
//!
//!     session.connect_services().await?;
//!     for peer in session.connected_participants() {
//!         session.send_subscribe_scene(&peer, SceneId::new(7))?;
//!     }
//!     session.disconnect_services().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `scenelink::core` - Identity, scene metadata and the chunk codec
//! - `scenelink::comm` - Messages, transport contract and the session engine

pub mod config;
pub mod error;

// Re-export component crates
pub use scenelink_comm as comm;
pub use scenelink_core as core;

// Re-export main types for convenience
pub use config::ScenelinkConfig;
pub use error::{Result, ScenelinkError};

pub use scenelink_comm::{
    CommunicationError, CommunicationSession, ConnectionState, ConnectionStatusListener,
    MemoryNetwork, MemoryTransport, ResourceConsumerHandler, ResourceProviderHandler,
    SceneConsumerHandler, SceneProviderHandler, SendDataSizes, SessionConfig, Transport,
};
pub use scenelink_core::{
    ParticipantId, PublicationMode, Resource, ResourceContentHash, SceneAction,
    SceneActionCollection, SceneId, SceneInfo,
};
