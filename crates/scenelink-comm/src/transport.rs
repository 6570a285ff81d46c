//! Transport abstraction for the communication protocol.
//!
//! The protocol runs unmodified over any transport that provides:
//!
//! - connect/disconnect of the local endpoint,
//! - per-peer reliable, ordered frame delivery,
//! - a best-effort broadcast to every connected peer,
//! - events for peers appearing, connecting, disconnecting and for received frames.
//!
//! `send` and `broadcast` are hand-offs: they must return without waiting for
//! the network.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use scenelink_core::ParticipantId;

use crate::error::Result;

/// Events a transport reports to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Discovery found a peer; a connection attempt is under way.
    ParticipantDiscovered(ParticipantId),
    /// The peer is reachable.
    ParticipantConnected(ParticipantId),
    /// The peer is gone.
    ParticipantDisconnected(ParticipantId),
    /// A frame arrived from a peer.
    FrameReceived { from: ParticipantId, frame: Bytes },
}

/// Receiving half of a transport's event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Transport trait for moving protocol frames between participants.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The local participant's identity.
    fn local_participant_id(&self) -> ParticipantId;

    /// Largest frame the transport accepts.
    fn max_message_size(&self) -> usize;

    /// Bring up the link and discovery.
    ///
    /// Success means the local endpoint is live, not that any peer is reachable.
    /// Events are delivered on the returned receiver until `disconnect`.
    async fn connect(&self) -> Result<EventReceiver>;

    /// Tear the link down. Disconnecting an unconnected transport succeeds.
    async fn disconnect(&self) -> Result<()>;

    /// Release the local endpoint without waiting, so peers see it leave.
    ///
    /// Called when the owning session is dropped while connected. Must be
    /// idempotent and must not block on the network.
    fn detach(&self);

    /// Hand a frame to the reliable, ordered path towards `to`.
    fn send(&self, to: &ParticipantId, frame: Bytes) -> Result<()>;

    /// Hand a frame to every connected peer, best effort.
    fn broadcast(&self, frame: Bytes) -> Result<()>;
}

/// An in-process transport.
///
/// Every endpoint created from one [`MemoryNetwork`] can reach every other
/// connected endpoint. Frames travel over unbounded channels, so per-peer order
/// is preserved and sends never wait.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::error::CommunicationError;
    use crate::sync_util::lock;

    /// Default maximum frame size of the memory network.
    pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

    /// Shared state for the memory network.
    pub struct MemoryNetwork {
        /// Event channels of the currently connected endpoints.
        endpoints: Mutex<HashMap<ParticipantId, mpsc::UnboundedSender<TransportEvent>>>,
        available: AtomicBool,
        max_message_size: usize,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
        }

        /// Create a network whose transports accept frames up to `max_message_size`.
        pub fn with_max_message_size(max_message_size: usize) -> Arc<Self> {
            Arc::new(Self {
                endpoints: Mutex::new(HashMap::new()),
                available: AtomicBool::new(true),
                max_message_size,
            })
        }

        /// Create a transport attached to this network.
        pub fn create_transport(self: &Arc<Self>, participant: ParticipantId) -> MemoryTransport {
            MemoryTransport {
                participant,
                network: Arc::clone(self),
                attached: AtomicBool::new(false),
                frames_sent: AtomicU64::new(0),
            }
        }

        /// Simulate the transport daemon going away. Subsequent connects fail.
        pub fn set_available(&self, available: bool) {
            self.available.store(available, Ordering::Release);
        }

        /// Number of currently connected endpoints.
        pub fn connected_count(&self) -> usize {
            lock(&self.endpoints).len()
        }
    }

    /// In-memory transport endpoint.
    ///
    /// Dropping a connected endpoint detaches it from the network.
    pub struct MemoryTransport {
        participant: ParticipantId,
        network: Arc<MemoryNetwork>,
        /// Whether this endpoint owns the network entry for `participant`.
        attached: AtomicBool,
        frames_sent: AtomicU64,
    }

    impl MemoryTransport {
        /// Frames this endpoint has handed to peers.
        pub fn frames_sent(&self) -> u64 {
            self.frames_sent.load(Ordering::Acquire)
        }

        fn check_size(&self, frame: &Bytes) -> Result<()> {
            let limit = self.network.max_message_size;
            if frame.len() > limit {
                return Err(CommunicationError::MessageTooLarge {
                    size: frame.len(),
                    limit,
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        fn local_participant_id(&self) -> ParticipantId {
            self.participant
        }

        fn max_message_size(&self) -> usize {
            self.network.max_message_size
        }

        async fn connect(&self) -> Result<EventReceiver> {
            if !self.network.available.load(Ordering::Acquire) {
                return Err(CommunicationError::Transport("network unavailable".into()));
            }

            let mut endpoints = lock(&self.network.endpoints);
            if endpoints.contains_key(&self.participant) {
                return Err(CommunicationError::Transport("endpoint already connected".into()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            for (peer, peer_tx) in endpoints.iter() {
                // A peer whose receiver is gone is torn down by its own disconnect.
                let _ = peer_tx.send(TransportEvent::ParticipantDiscovered(self.participant));
                let _ = peer_tx.send(TransportEvent::ParticipantConnected(self.participant));
                let _ = tx.send(TransportEvent::ParticipantDiscovered(*peer));
                let _ = tx.send(TransportEvent::ParticipantConnected(*peer));
            }
            endpoints.insert(self.participant, tx);
            self.attached.store(true, Ordering::Release);
            Ok(rx)
        }

        async fn disconnect(&self) -> Result<()> {
            self.detach();
            Ok(())
        }

        fn detach(&self) {
            let mut endpoints = lock(&self.network.endpoints);
            if !self.attached.swap(false, Ordering::AcqRel) {
                return;
            }
            if endpoints.remove(&self.participant).is_some() {
                for peer_tx in endpoints.values() {
                    let _ = peer_tx.send(TransportEvent::ParticipantDisconnected(self.participant));
                }
            }
        }

        fn send(&self, to: &ParticipantId, frame: Bytes) -> Result<()> {
            self.check_size(&frame)?;
            let endpoints = lock(&self.network.endpoints);
            if !endpoints.contains_key(&self.participant) {
                return Err(CommunicationError::Transport("endpoint not connected".into()));
            }
            let peer_tx = endpoints
                .get(to)
                .ok_or(CommunicationError::NotConnected { participant: *to })?;
            peer_tx
                .send(TransportEvent::FrameReceived {
                    from: self.participant,
                    frame,
                })
                .map_err(|_| CommunicationError::Transport("peer disconnected".into()))?;
            self.frames_sent.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }

        fn broadcast(&self, frame: Bytes) -> Result<()> {
            self.check_size(&frame)?;
            let endpoints = lock(&self.network.endpoints);
            if !endpoints.contains_key(&self.participant) {
                return Err(CommunicationError::Transport("endpoint not connected".into()));
            }
            for (peer, peer_tx) in endpoints.iter() {
                if peer != &self.participant {
                    let envelope = TransportEvent::FrameReceived {
                        from: self.participant,
                        frame: frame.clone(),
                    };
                    // Best effort: some peers may be going away.
                    if peer_tx.send(envelope).is_ok() {
                        self.frames_sent.fetch_add(1, Ordering::AcqRel);
                    }
                }
            }
            Ok(())
        }
    }

    impl Drop for MemoryTransport {
        fn drop(&mut self) {
            self.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryNetwork;
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_send_recv() {
        let network = MemoryNetwork::new();

        let node_a = ParticipantId::from_u128(0xAA);
        let node_b = ParticipantId::from_u128(0xBB);

        let transport_a = network.create_transport(node_a);
        let transport_b = network.create_transport(node_b);

        let _rx_a = transport_a.connect().await.unwrap();
        let mut rx_b = transport_b.connect().await.unwrap();

        assert_eq!(rx_b.recv().await, Some(TransportEvent::ParticipantDiscovered(node_a)));
        assert_eq!(rx_b.recv().await, Some(TransportEvent::ParticipantConnected(node_a)));

        transport_a.send(&node_b, Bytes::from_static(b"hello")).unwrap();
        assert_eq!(
            rx_b.recv().await,
            Some(TransportEvent::FrameReceived {
                from: node_a,
                frame: Bytes::from_static(b"hello"),
            })
        );
        assert_eq!(transport_a.frames_sent(), 1);
    }

    #[tokio::test]
    async fn test_memory_transport_broadcast() {
        let network = MemoryNetwork::new();

        let node_a = ParticipantId::from_u128(0xAA);
        let node_b = ParticipantId::from_u128(0xBB);
        let node_c = ParticipantId::from_u128(0xCC);

        let transport_a = network.create_transport(node_a);
        let transport_b = network.create_transport(node_b);
        let transport_c = network.create_transport(node_c);

        let mut rx_a = transport_a.connect().await.unwrap();
        let mut rx_b = transport_b.connect().await.unwrap();
        let mut rx_c = transport_c.connect().await.unwrap();

        transport_a.broadcast(Bytes::from_static(b"all")).unwrap();
        assert_eq!(transport_a.frames_sent(), 2);

        for rx in [&mut rx_b, &mut rx_c] {
            let mut got = None;
            while let Ok(ev) = rx.try_recv() {
                if let TransportEvent::FrameReceived { from, .. } = ev {
                    got = Some(from);
                }
            }
            assert_eq!(got, Some(node_a));
        }
        while let Ok(ev) = rx_a.try_recv() {
            assert!(!matches!(ev, TransportEvent::FrameReceived { .. }));
        }
    }

    #[tokio::test]
    async fn test_disconnect_notifies_peers() {
        let network = MemoryNetwork::new();
        let node_a = ParticipantId::from_u128(1);
        let node_b = ParticipantId::from_u128(2);
        let transport_a = network.create_transport(node_a);
        let transport_b = network.create_transport(node_b);

        let _rx_a = transport_a.connect().await.unwrap();
        let mut rx_b = transport_b.connect().await.unwrap();
        transport_a.disconnect().await.unwrap();

        let mut last = None;
        while let Ok(ev) = rx_b.try_recv() {
            last = Some(ev);
        }
        assert_eq!(last, Some(TransportEvent::ParticipantDisconnected(node_a)));
        assert_eq!(network.connected_count(), 1);
        assert!(transport_b.send(&node_a, Bytes::new()).is_err());
    }

    #[tokio::test]
    async fn test_dropped_transport_leaves_network() {
        let network = MemoryNetwork::new();
        let node_a = ParticipantId::from_u128(1);
        let node_b = ParticipantId::from_u128(2);
        let transport_b = network.create_transport(node_b);
        let mut rx_b = transport_b.connect().await.unwrap();

        {
            let transport_a = network.create_transport(node_a);
            let _rx_a = transport_a.connect().await.unwrap();
            assert_eq!(network.connected_count(), 2);
        }

        let mut last = None;
        while let Ok(ev) = rx_b.try_recv() {
            last = Some(ev);
        }
        assert_eq!(last, Some(TransportEvent::ParticipantDisconnected(node_a)));
        assert_eq!(network.connected_count(), 1);

        let again = network.create_transport(node_a);
        let _rx = again.connect().await.unwrap();
        assert_eq!(network.connected_count(), 2);
    }

    #[tokio::test]
    async fn test_detach_leaves_other_owner_alone() {
        let network = MemoryNetwork::new();
        let node = ParticipantId::from_u128(1);
        let owner = network.create_transport(node);
        let _rx = owner.connect().await.unwrap();

        let duplicate = network.create_transport(node);
        assert!(duplicate.connect().await.is_err());
        drop(duplicate);
        assert_eq!(network.connected_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_network_fails_connect() {
        let network = MemoryNetwork::new();
        network.set_available(false);
        let transport = network.create_transport(ParticipantId::from_u128(1));
        assert!(transport.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let network = MemoryNetwork::with_max_message_size(8);
        let a = network.create_transport(ParticipantId::from_u128(1));
        let b = network.create_transport(ParticipantId::from_u128(2));
        let _rx_a = a.connect().await.unwrap();
        let _rx_b = b.connect().await.unwrap();

        let err = a
            .send(&ParticipantId::from_u128(2), Bytes::from(vec![0u8; 9]))
            .unwrap_err();
        assert!(matches!(err, crate::error::CommunicationError::MessageTooLarge { size: 9, limit: 8 }));
        assert_eq!(a.frames_sent(), 0);
    }
}
