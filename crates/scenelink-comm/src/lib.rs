//! # Scenelink Comm
//!
//! Participant-to-participant communication for distributed scene rendering.
//!
//! ## Overview
//!
//! A [`CommunicationSession`] connects one participant to its peers over a
//! [`Transport`]. It tracks which peers are reachable, notifies registered
//! listeners when peers come and go, encodes protocol messages into frames,
//! splits large resources into bounded chunks and reassembles them on the
//! receiving side, and routes every decoded message to the handler registered
//! for its category.
//!
//! ## Key Properties
//!
//! - **Fail fast**: sends to an unconnected session or peer return an error and
//!   perform no I/O
//! - **Exactly once**: each connect and disconnect episode is reported once per
//!   listener
//! - **Whole resources**: a resource is delivered once, fully reassembled, no
//!   matter how many chunks it travelled in
//! - **Non-owning callbacks**: handlers and listeners are held by weak
//!   reference and are never called after they are dropped or unregistered
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scenelink_comm::{CommunicationSession, MemoryNetwork, SessionConfig};
//! use scenelink_core::{ParticipantId, SceneId};
//!
//! async fn example() -> scenelink_comm::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let transport = network.create_transport(ParticipantId::generate());
//!     let session = CommunicationSession::new(transport, SessionConfig::default())?;
//!
//!     session.connect_services().await?;
//!     for peer in session.connected_participants() {
//!         session.send_subscribe_scene(&peer, SceneId::new(1))?;
//!     }
//!     session.disconnect_services().await
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Consumer                            Provider
//!   |<------- ScenesAvailable ---------|
//!   |-------- SubscribeScene --------->|
//!   |<------- InitializeScene ---------|
//!   |<------- SceneActionList ---------|
//!   |-------- RequestResources ------->|
//!   |<------- SendResources (chunks) --|
//!   |-------- UnsubscribeScene ------->|
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod session;
mod sync_util;
pub mod transport;

pub use codec::{
    action_flush_key, decode_action_flush, decode_frame, encode_action_flush, encode_frame,
};
pub use config::{SendDataSizes, SessionConfig, FRAME_OVERHEAD_RESERVE};
pub use connection::{
    ConnectionRegistry, ConnectionState, ConnectionStatusListener, ListenerSet, Transition,
};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{CommunicationError, Result};
pub use handlers::{
    ResourceConsumerHandler, ResourceProviderHandler, SceneConsumerHandler, SceneProviderHandler,
};
pub use messages::{limits, HandlerCategory, MessageKind, ProtocolMessage, PROTOCOL_VERSION};
pub use session::CommunicationSession;
pub use transport::{
    memory::MemoryNetwork, memory::MemoryTransport, EventReceiver, Transport, TransportEvent,
};
