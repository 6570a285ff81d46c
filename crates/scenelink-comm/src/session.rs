//! Communication session: the façade over registry, codec, chunking and dispatch.
//!
//! ## Locking
//!
//! - Listener set and handler slots share one lock. Notification, dispatch and
//!   (un)registration are mutually exclusive, so a listener never hears a
//!   callback after its unregistration has returned. Handlers and listeners
//!   must therefore not (un)register from inside a callback.
//! - Inbound reassembly (resources and scene action flushes) has its own lock.
//!   Chunk ingestion and disconnect cleanup for the same sender are serialized
//!   through it.
//! - Peer connection state lives in the [`ConnectionRegistry`] and is consulted
//!   by every send-family operation.
//!
//! ## Message Flow
//!
//! ```text
//! caller -> send_* -> [split] -> validate + encode (all frames) -> Transport::send
//!                                                                     |
//! handler <- Dispatcher <- [reassemble + verify] <- decode <- delivery task
//! ```
//!
//! Resources and scene action list flushes both travel as chunks. Either is
//! handed to its handler once, after every chunk arrived and the payload
//! matched its key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use scenelink_core::{
    split, ParticipantId, Reassembler, Resource, ResourceContentHash, SceneActionCollection,
    SceneId, SceneInfo,
};

use crate::codec::{
    action_flush_key, decode_action_flush, decode_frame, encode_action_flush, encode_frame,
};
use crate::config::{SendDataSizes, SessionConfig};
use crate::connection::{
    ConnectionRegistry, ConnectionState, ConnectionStatusListener, ListenerSet, Transition,
};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::{CommunicationError, Result};
use crate::handlers::{
    ResourceConsumerHandler, ResourceProviderHandler, SceneConsumerHandler, SceneProviderHandler,
};
use crate::messages::{limits, HandlerCategory, MessageKind, ProtocolMessage};
use crate::sync_util::{lock, read_lock, write_lock};
use crate::transport::{EventReceiver, Transport, TransportEvent};

/// Everything guarded by the session's callback lock.
#[derive(Default)]
struct Callbacks {
    listeners: ListenerSet,
    dispatcher: Dispatcher,
}

/// Partial inbound transfers, one reassembler per chunked message kind.
struct Inbound {
    resources: Reassembler,
    action_flushes: Reassembler,
}

impl Inbound {
    fn new(max_total_bytes: u64) -> Self {
        Self {
            resources: Reassembler::new(max_total_bytes),
            action_flushes: Reassembler::new(max_total_bytes),
        }
    }

    fn discard_sender(&mut self, sender: &ParticipantId) -> usize {
        self.resources.discard_sender(sender) + self.action_flushes.discard_sender(sender)
    }

    fn evict_idle(&mut self, now: Instant, timeout: Duration) -> usize {
        self.resources.evict_idle(now, timeout) + self.action_flushes.evict_idle(now, timeout)
    }

    fn clear(&mut self) {
        self.resources.clear();
        self.action_flushes.clear();
    }

    fn pending_count(&self) -> usize {
        self.resources.pending_count() + self.action_flushes.pending_count()
    }
}

struct SessionInner<T: Transport> {
    transport: T,
    config: SessionConfig,
    /// Session-live flag. Written with Release, read with Acquire.
    connected: AtomicBool,
    registry: ConnectionRegistry,
    callbacks: Mutex<Callbacks>,
    inbound: Mutex<Inbound>,
    send_data_sizes: RwLock<SendDataSizes>,
    /// Delivery task of the live connection. Also serializes connect/disconnect.
    delivery: AsyncMutex<Option<JoinHandle<()>>>,
}

/// A participant's communication endpoint.
///
/// Every send-family operation fails fast with [`CommunicationError::SessionNotConnected`]
/// or [`CommunicationError::NotConnected`] and performs no I/O unless both the
/// session and the addressed participant are connected. Nothing is ever queued
/// for an unconnected peer.
pub struct CommunicationSession<T: Transport> {
    inner: Arc<SessionInner<T>>,
}

impl<T: Transport> CommunicationSession<T> {
    /// Create a session over `transport`.
    pub fn new(transport: T, config: SessionConfig) -> Result<Self> {
        config.validate(transport.max_message_size())?;
        let inbound = Inbound::new(config.max_reassembly_bytes);
        let send_data_sizes = config.send_data_sizes.clone();
        Ok(Self {
            inner: Arc::new(SessionInner {
                transport,
                config,
                connected: AtomicBool::new(false),
                registry: ConnectionRegistry::new(),
                callbacks: Mutex::new(Callbacks::default()),
                inbound: Mutex::new(inbound),
                send_data_sizes: RwLock::new(send_data_sizes),
                delivery: AsyncMutex::new(None),
            }),
        })
    }

    pub fn local_participant_id(&self) -> ParticipantId {
        self.inner.transport.local_participant_id()
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Bring up the transport and start delivering events.
    ///
    /// Calling this on a connected session succeeds without side effects.
    pub async fn connect_services(&self) -> Result<()> {
        let mut delivery = self.inner.delivery.lock().await;
        if delivery.is_some() {
            return Ok(());
        }

        let events = self.inner.transport.connect().await.map_err(|e| {
            tracing::warn!(participant = %self.local_participant_id(), error = %e, "connect failed");
            e
        })?;
        self.inner.connected.store(true, Ordering::Release);

        let inner = Arc::clone(&self.inner);
        *delivery = Some(tokio::spawn(delivery_loop(inner, events)));

        tracing::info!(participant = %self.local_participant_id(), "communication services connected");
        Ok(())
    }

    /// Tear the transport down.
    ///
    /// Pending reassemblies are dropped and every connected peer is reported
    /// as disconnected. Sends fail until the session is connected again.
    pub async fn disconnect_services(&self) -> Result<()> {
        let mut delivery = self.inner.delivery.lock().await;
        let Some(handle) = delivery.take() else {
            return Ok(());
        };

        self.inner.connected.store(false, Ordering::Release);
        let result = self.inner.transport.disconnect().await;

        handle.abort();
        let _ = handle.await;

        lock(&self.inner.inbound).clear();
        for transition in self.inner.registry.disconnect_all() {
            self.inner.notify(transition);
        }

        match &result {
            Ok(()) => tracing::info!(
                participant = %self.local_participant_id(),
                "communication services disconnected"
            ),
            Err(e) => tracing::warn!(
                participant = %self.local_participant_id(),
                error = %e,
                "transport disconnect failed"
            ),
        }
        result
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    pub fn connection_state(&self, participant: &ParticipantId) -> ConnectionState {
        self.inner.registry.state(participant)
    }

    /// Whether point-to-point sends to `participant` can currently succeed.
    pub fn is_peer_connected(&self, participant: &ParticipantId) -> bool {
        self.is_connected() && self.inner.registry.is_connected(participant)
    }

    pub fn connected_participants(&self) -> Vec<ParticipantId> {
        self.inner.registry.connected()
    }

    /// Number of incomplete inbound transfers, resources and action flushes.
    pub fn pending_reassemblies(&self) -> usize {
        lock(&self.inner.inbound).pending_count()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────────

    pub fn send_data_sizes(&self) -> SendDataSizes {
        read_lock(&self.inner.send_data_sizes).clone()
    }

    /// Replace the outgoing size limits.
    ///
    /// Applies to transfers started after this call returns.
    pub fn set_send_data_sizes(&self, sizes: SendDataSizes) -> Result<()> {
        sizes.validate(self.inner.transport.max_message_size())?;
        *write_lock(&self.inner.send_data_sizes) = sizes;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    pub fn register_for_connection_updates<L: ConnectionStatusListener + 'static>(
        &self,
        listener: &Arc<L>,
    ) {
        lock(&self.inner.callbacks).listeners.register(listener);
    }

    /// After this returns, `listener` receives no further callbacks.
    pub fn unregister_for_connection_updates<L: ConnectionStatusListener + 'static>(
        &self,
        listener: &Arc<L>,
    ) {
        lock(&self.inner.callbacks).listeners.unregister(listener);
    }

    pub fn set_scene_provider_handler<H: SceneProviderHandler + 'static>(&self, handler: &Arc<H>) {
        lock(&self.inner.callbacks)
            .dispatcher
            .set_scene_provider_handler(handler);
    }

    pub fn set_scene_consumer_handler<H: SceneConsumerHandler + 'static>(&self, handler: &Arc<H>) {
        lock(&self.inner.callbacks)
            .dispatcher
            .set_scene_consumer_handler(handler);
    }

    pub fn set_resource_provider_handler<H: ResourceProviderHandler + 'static>(
        &self,
        handler: &Arc<H>,
    ) {
        lock(&self.inner.callbacks)
            .dispatcher
            .set_resource_provider_handler(handler);
    }

    pub fn set_resource_consumer_handler<H: ResourceConsumerHandler + 'static>(
        &self,
        handler: &Arc<H>,
    ) {
        lock(&self.inner.callbacks)
            .dispatcher
            .set_resource_consumer_handler(handler);
    }

    pub fn clear_handler(&self, category: HandlerCategory) {
        lock(&self.inner.callbacks).dispatcher.clear_handler(category);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scene provider -> consumer
    // ─────────────────────────────────────────────────────────────────────────

    /// Tell `to` which scenes are published, typically right after it connected.
    pub fn send_scenes_available(&self, to: &ParticipantId, scenes: &[SceneInfo]) -> Result<()> {
        self.ensure_peer(to)?;
        let max = self.send_data_sizes().max_scene_infos_per_message;
        let frames = self.encode_all(scenes.chunks(max).map(|batch| {
            ProtocolMessage::ScenesAvailable {
                scenes: batch.to_vec(),
            }
        }))?;
        self.send_frames(to, frames)
    }

    pub fn send_initialize_scene(&self, to: &ParticipantId, scene: &SceneInfo) -> Result<()> {
        self.ensure_peer(to)?;
        self.send_message(to, &ProtocolMessage::InitializeScene { scene: scene.clone() })
    }

    pub fn send_scene_not_available(&self, to: &ParticipantId, scene_id: SceneId) -> Result<()> {
        self.ensure_peer(to)?;
        self.send_message(to, &ProtocolMessage::SceneNotAvailable { scene_id })
    }

    /// Send one flush of scene actions.
    ///
    /// The flush is encoded into a single payload and split into chunks of at
    /// most `max_scene_action_bytes_per_message`, so single actions larger
    /// than the transport limit are fine. Every frame is built before the
    /// first one is sent. The consumer's handler sees the flush once, whole.
    ///
    /// Returns the number of messages handed to the transport.
    pub fn send_scene_action_list(
        &self,
        to: &ParticipantId,
        scene_id: SceneId,
        actions: &SceneActionCollection,
        counter: u64,
    ) -> Result<u64> {
        self.ensure_peer(to)?;
        if actions.len() > limits::MAX_SCENE_ACTIONS {
            return Err(CommunicationError::InvalidMessage(format!(
                "too many scene actions: {}",
                actions.len()
            )));
        }

        let max_chunk = self.send_data_sizes().max_scene_action_bytes_per_message;
        let payload = encode_action_flush(actions)?;
        let key = action_flush_key(scene_id, counter, &payload);
        let chunks = split(&payload, key, max_chunk)?;
        let frames = self.encode_all(chunks.into_iter().map(|chunk| {
            ProtocolMessage::SceneActionList {
                scene_id,
                counter,
                chunk,
            }
        }))?;

        let count = frames.len() as u64;
        tracing::debug!(
            participant = %to,
            scene = %scene_id,
            counter,
            actions = actions.len(),
            size = payload.len(),
            chunks = count,
            "sending scene action list"
        );
        self.send_frames(to, frames)?;
        Ok(count)
    }

    pub fn broadcast_new_scenes_available(&self, scenes: &[SceneInfo]) -> Result<()> {
        self.ensure_session()?;
        let max = self.send_data_sizes().max_scene_infos_per_message;
        let frames = self.encode_all(scenes.chunks(max).map(|batch| {
            ProtocolMessage::ScenesAvailable {
                scenes: batch.to_vec(),
            }
        }))?;
        self.broadcast_frames(frames)
    }

    pub fn broadcast_scenes_became_unavailable(&self, scenes: &[SceneInfo]) -> Result<()> {
        self.ensure_session()?;
        let max = self.send_data_sizes().max_scene_infos_per_message;
        let frames = self.encode_all(scenes.chunks(max).map(|batch| {
            ProtocolMessage::ScenesBecameUnavailable {
                scenes: batch.to_vec(),
            }
        }))?;
        self.broadcast_frames(frames)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scene consumer -> provider
    // ─────────────────────────────────────────────────────────────────────────

    pub fn send_subscribe_scene(&self, to: &ParticipantId, scene_id: SceneId) -> Result<()> {
        self.ensure_peer(to)?;
        self.send_message(to, &ProtocolMessage::SubscribeScene { scene_id })
    }

    pub fn send_unsubscribe_scene(&self, to: &ParticipantId, scene_id: SceneId) -> Result<()> {
        self.ensure_peer(to)?;
        self.send_message(to, &ProtocolMessage::UnsubscribeScene { scene_id })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────────────────────

    pub fn send_request_resources(
        &self,
        to: &ParticipantId,
        resources: &[ResourceContentHash],
    ) -> Result<()> {
        self.ensure_peer(to)?;
        let max = self.send_data_sizes().max_resource_ids_per_message;
        let frames = self.encode_all(resources.chunks(max).map(|batch| {
            ProtocolMessage::RequestResources {
                resources: batch.to_vec(),
            }
        }))?;
        self.send_frames(to, frames)
    }

    pub fn send_resources_not_available(
        &self,
        to: &ParticipantId,
        resources: &[ResourceContentHash],
    ) -> Result<()> {
        self.ensure_peer(to)?;
        let max = self.send_data_sizes().max_resource_ids_per_message;
        let frames = self.encode_all(resources.chunks(max).map(|batch| {
            ProtocolMessage::ResourcesNotAvailable {
                resources: batch.to_vec(),
            }
        }))?;
        self.send_frames(to, frames)
    }

    /// Send resources, each split into chunks of at most
    /// `max_resource_chunk_bytes`. The receiver delivers every resource once,
    /// fully reassembled.
    pub fn send_resources(&self, to: &ParticipantId, resources: &[Resource]) -> Result<()> {
        self.ensure_peer(to)?;
        let max_chunk = self.send_data_sizes().max_resource_chunk_bytes;
        for resource in resources {
            let chunks = split(&resource.data, resource.hash, max_chunk)?;
            tracing::debug!(
                participant = %to,
                resource = %resource.hash,
                size = resource.len(),
                chunks = chunks.len(),
                "sending resource"
            );
            let frames = self.encode_all(
                chunks
                    .into_iter()
                    .map(|chunk| ProtocolMessage::SendResources { chunk }),
            )?;
            self.send_frames(to, frames)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn ensure_session(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(CommunicationError::SessionNotConnected);
        }
        Ok(())
    }

    fn ensure_peer(&self, to: &ParticipantId) -> Result<()> {
        self.ensure_session()?;
        if !self.inner.registry.is_connected(to) {
            return Err(CommunicationError::NotConnected { participant: *to });
        }
        Ok(())
    }

    /// Validate and encode one message into a frame the transport accepts.
    fn encode_checked(&self, message: &ProtocolMessage) -> Result<Bytes> {
        message
            .validate()
            .map_err(CommunicationError::InvalidMessage)?;
        let frame = encode_frame(message)?;
        let limit = self.inner.transport.max_message_size();
        if frame.len() > limit {
            return Err(CommunicationError::MessageTooLarge {
                size: frame.len(),
                limit,
            });
        }
        Ok(frame)
    }

    /// Encode a whole batch. Nothing is sent if any message fails.
    fn encode_all(
        &self,
        messages: impl IntoIterator<Item = ProtocolMessage>,
    ) -> Result<Vec<(MessageKind, Bytes)>> {
        messages
            .into_iter()
            .map(|message| Ok((message.kind(), self.encode_checked(&message)?)))
            .collect()
    }

    fn send_message(&self, to: &ParticipantId, message: &ProtocolMessage) -> Result<()> {
        let frame = self.encode_checked(message)?;
        self.send_frames(to, vec![(message.kind(), frame)])
    }

    fn send_frames(&self, to: &ParticipantId, frames: Vec<(MessageKind, Bytes)>) -> Result<()> {
        for (kind, frame) in frames {
            let size = frame.len();
            self.inner.transport.send(to, frame)?;
            tracing::debug!(participant = %to, ?kind, size, "message sent");
        }
        Ok(())
    }

    fn broadcast_frames(&self, frames: Vec<(MessageKind, Bytes)>) -> Result<()> {
        for (kind, frame) in frames {
            let size = frame.len();
            self.inner.transport.broadcast(frame)?;
            tracing::debug!(?kind, size, "message broadcast");
        }
        Ok(())
    }
}

impl<T: Transport> Drop for CommunicationSession<T> {
    fn drop(&mut self) {
        let Ok(mut delivery) = self.inner.delivery.try_lock() else {
            return;
        };
        if let Some(handle) = delivery.take() {
            self.inner.connected.store(false, Ordering::Release);
            handle.abort();
            // Peers must see us leave even though nobody awaits a disconnect.
            self.inner.transport.detach();
            tracing::debug!(
                participant = %self.local_participant_id(),
                "session dropped while connected, transport detached"
            );
        }
    }
}

impl<T: Transport> SessionInner<T> {
    fn notify(&self, transition: Transition) {
        lock(&self.callbacks).listeners.notify(transition);
    }

    fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::ParticipantDiscovered(id) => {
                tracing::debug!(participant = %id, "participant discovered");
                self.registry.participant_discovered(id);
            }
            TransportEvent::ParticipantConnected(id) => {
                if let Some(transition) = self.registry.participant_connected(id) {
                    tracing::info!(participant = %id, "participant connected");
                    self.notify(transition);
                }
            }
            TransportEvent::ParticipantDisconnected(id) => {
                // Partial data is gone before anyone can observe the new state.
                let dropped = lock(&self.inbound).discard_sender(&id);
                if dropped > 0 {
                    tracing::debug!(participant = %id, dropped, "discarded partial resource transfers");
                }
                if let Some(transition) = self.registry.participant_disconnected(id) {
                    tracing::info!(participant = %id, "participant disconnected");
                    self.notify(transition);
                }
            }
            TransportEvent::FrameReceived { from, frame } => self.handle_frame(from, &frame),
        }
    }

    fn handle_frame(&self, from: ParticipantId, frame: &[u8]) {
        if !self.registry.is_connected(&from) {
            tracing::debug!(participant = %from, "dropping frame from unconnected participant");
            return;
        }

        let message = match decode_frame(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(participant = %from, error = %e, "discarding malformed frame");
                return;
            }
        };
        let kind = message.kind();

        let outcome = match message {
            ProtocolMessage::SendResources { chunk } => {
                let hash = chunk.resource;
                let ingested = lock(&self.inbound).resources.ingest(from, chunk);
                let Some(data) = completed(from, hash, ingested) else {
                    return;
                };
                let resource = Resource::with_hash(hash, data);
                if !resource.is_intact() {
                    tracing::warn!(
                        participant = %from,
                        resource = %hash,
                        "protocol violation, resource content does not match its hash"
                    );
                    return;
                }
                lock(&self.callbacks)
                    .dispatcher
                    .dispatch_resource(resource, &from)
            }
            ProtocolMessage::SceneActionList {
                scene_id,
                counter,
                chunk,
            } => {
                let key = chunk.resource;
                let ingested = lock(&self.inbound).action_flushes.ingest(from, chunk);
                let Some(payload) = completed(from, key, ingested) else {
                    return;
                };
                if action_flush_key(scene_id, counter, &payload) != key {
                    tracing::warn!(
                        participant = %from,
                        scene = %scene_id,
                        counter,
                        "protocol violation, scene action list does not match its key"
                    );
                    return;
                }
                let actions = match decode_action_flush(&payload) {
                    Ok(actions) => actions,
                    Err(e) => {
                        tracing::warn!(
                            participant = %from,
                            scene = %scene_id,
                            error = %e,
                            "discarding malformed scene action list"
                        );
                        return;
                    }
                };
                lock(&self.callbacks)
                    .dispatcher
                    .dispatch_scene_action_list(scene_id, actions, counter, &from)
            }
            message => lock(&self.callbacks).dispatcher.dispatch(message, &from),
        };

        match outcome {
            DispatchOutcome::Handled { accepted } => {
                tracing::debug!(participant = %from, ?kind, ?accepted, "message handled");
            }
            DispatchOutcome::HandlerAbsent(category) => {
                tracing::debug!(participant = %from, ?kind, ?category, "no handler registered, message dropped");
            }
            DispatchOutcome::Rejected => {
                tracing::warn!(participant = %from, ?kind, "message rejected by dispatcher");
            }
        }
    }

    fn evict_idle(&self) {
        let timeout = self.config.reassembly_timeout();
        let evicted = lock(&self.inbound).evict_idle(Instant::now(), timeout);
        if evicted > 0 {
            tracing::warn!(evicted, "evicted idle resource transfers");
        }
    }
}

/// Unwrap one reassembly step. `None` while incomplete or after a violation.
fn completed(
    from: ParticipantId,
    key: ResourceContentHash,
    ingested: scenelink_core::Result<Option<Bytes>>,
) -> Option<Bytes> {
    match ingested {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(
                participant = %from,
                stream = %key,
                error = %e,
                "protocol violation, chunk stream dropped"
            );
            None
        }
    }
}

async fn delivery_loop<T: Transport>(inner: Arc<SessionInner<T>>, mut events: EventReceiver) {
    let mut eviction = tokio::time::interval(inner.config.eviction_interval());
    eviction.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => inner.handle_event(event),
                None => {
                    tracing::debug!("transport event stream closed");
                    break;
                }
            },
            _ = eviction.tick() => inner.evict_idle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{MemoryNetwork, MemoryTransport};

    fn session(network: &Arc<MemoryNetwork>, id: u128) -> CommunicationSession<MemoryTransport> {
        let transport = network.create_transport(ParticipantId::from_u128(id));
        CommunicationSession::new(transport, SessionConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_sends_fail_before_connect() {
        let network = MemoryNetwork::new();
        let s = session(&network, 1);
        let to = ParticipantId::generate();

        let err = s.send_subscribe_scene(&to, SceneId(1)).unwrap_err();
        assert!(matches!(err, CommunicationError::SessionNotConnected));
        assert!(s.broadcast_new_scenes_available(&[]).is_err());
        assert_eq!(s.transport().frames_sent(), 0);
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_fails_when_connected() {
        let network = MemoryNetwork::new();
        let s = session(&network, 1);
        s.connect_services().await.unwrap();

        let to = ParticipantId::from_u128(77);
        let err = s.send_unsubscribe_scene(&to, SceneId(1)).unwrap_err();
        assert!(matches!(err, CommunicationError::NotConnected { participant } if participant == to));
        assert!(err.is_not_connected());
        assert_eq!(s.transport().frames_sent(), 0);

        s.disconnect_services().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let network = MemoryNetwork::new();
        let s = session(&network, 1);
        s.connect_services().await.unwrap();
        s.connect_services().await.unwrap();
        assert!(s.is_connected());
        assert_eq!(network.connected_count(), 1);

        s.disconnect_services().await.unwrap();
        s.disconnect_services().await.unwrap();
        assert!(!s.is_connected());
        assert_eq!(network.connected_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let network = MemoryNetwork::new();
        network.set_available(false);
        let s = session(&network, 1);
        assert!(matches!(
            s.connect_services().await,
            Err(CommunicationError::Transport(_))
        ));
        assert!(!s.is_connected());
    }

    #[tokio::test]
    async fn test_invalid_send_data_sizes_rejected() {
        let network = MemoryNetwork::with_max_message_size(4096);
        let transport = network.create_transport(ParticipantId::from_u128(1));
        let sizes = SendDataSizes {
            max_resource_chunk_bytes: 1024,
            max_scene_action_bytes_per_message: 1024,
            ..Default::default()
        };
        let s = CommunicationSession::new(
            transport,
            SessionConfig::default().with_send_data_sizes(sizes),
        )
        .unwrap();

        let too_big = s.send_data_sizes().with_max_resource_chunk_bytes(8192);
        assert!(s.set_send_data_sizes(too_big).is_err());
        assert_eq!(s.send_data_sizes().max_resource_chunk_bytes, 1024);

        let smaller = s.send_data_sizes().with_max_resource_chunk_bytes(512);
        s.set_send_data_sizes(smaller).unwrap();
        assert_eq!(s.send_data_sizes().max_resource_chunk_bytes, 512);
    }
}
