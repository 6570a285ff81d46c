//! Test fixtures and helpers.
//!
//! Every test builds its own [`TestHarness`]; nothing is shared between tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::watch;

use scenelink_comm::{
    CommunicationSession, ConnectionState, ConnectionStatusListener, MemoryNetwork, MemoryTransport,
    ResourceConsumerHandler, ResourceProviderHandler, SceneConsumerHandler, SceneProviderHandler,
    SessionConfig, Transition,
};
use scenelink_core::{
    ParticipantId, Resource, ResourceContentHash, SceneActionCollection, SceneId, SceneInfo,
};

/// Upper bound for waits that are expected to succeed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait before concluding that something did not happen.
pub const NEGATIVE_TIMEOUT: Duration = Duration::from_millis(200);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Install a test-writer tracing subscriber. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts events and lets a test wait, with a bound, until enough arrived.
pub struct EventSignal {
    count: watch::Sender<usize>,
}

impl EventSignal {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self { count }
    }

    pub fn signal(&self) {
        self.count.send_modify(|c| *c += 1);
    }

    /// Events signalled so far.
    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until at least `n` events were signalled in total.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn wait_for_events(&self, n: usize, timeout: Duration) -> bool {
        let mut rx = self.count.subscribe();
        let reached = tokio::time::timeout(timeout, async move {
            rx.wait_for(|count| *count >= n).await.is_ok()
        })
        .await;
        matches!(reached, Ok(true))
    }
}

impl Default for EventSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerCall {
    SubscribeScene {
        scene_id: SceneId,
        from: ParticipantId,
    },
    UnsubscribeScene {
        scene_id: SceneId,
        from: ParticipantId,
    },
    NewScenesAvailable {
        scenes: Vec<SceneInfo>,
        from: ParticipantId,
    },
    ScenesBecameUnavailable {
        scenes: Vec<SceneInfo>,
        from: ParticipantId,
    },
    InitializeScene {
        scene: SceneInfo,
        from: ParticipantId,
    },
    SceneActionList {
        scene_id: SceneId,
        actions: SceneActionCollection,
        counter: u64,
        from: ParticipantId,
    },
    SceneNotAvailable {
        scene_id: SceneId,
        from: ParticipantId,
    },
    RequestResources {
        resources: Vec<ResourceContentHash>,
        from: ParticipantId,
    },
    SendResource {
        resource: Resource,
        from: ParticipantId,
    },
    ResourcesNotAvailable {
        resources: Vec<ResourceContentHash>,
        from: ParticipantId,
    },
}

/// Implements every handler category and records each call.
#[derive(Default)]
pub struct RecordingHandler {
    calls: Mutex<Vec<HandlerCall>>,
    /// Signalled once per recorded call.
    pub signal: EventSignal,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<HandlerCall> {
        guard(&self.calls).clone()
    }

    /// Resources delivered so far, in arrival order.
    pub fn resources(&self) -> Vec<Resource> {
        guard(&self.calls)
            .iter()
            .filter_map(|call| match call {
                HandlerCall::SendResource { resource, .. } => Some(resource.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: HandlerCall) {
        guard(&self.calls).push(call);
        self.signal.signal();
    }
}

impl SceneProviderHandler for RecordingHandler {
    fn handle_subscribe_scene(&self, scene_id: SceneId, from: &ParticipantId) {
        self.record(HandlerCall::SubscribeScene { scene_id, from: *from });
    }

    fn handle_unsubscribe_scene(&self, scene_id: SceneId, from: &ParticipantId) {
        self.record(HandlerCall::UnsubscribeScene { scene_id, from: *from });
    }
}

impl SceneConsumerHandler for RecordingHandler {
    fn handle_new_scenes_available(&self, scenes: &[SceneInfo], from: &ParticipantId) {
        self.record(HandlerCall::NewScenesAvailable {
            scenes: scenes.to_vec(),
            from: *from,
        });
    }

    fn handle_scenes_became_unavailable(&self, scenes: &[SceneInfo], from: &ParticipantId) {
        self.record(HandlerCall::ScenesBecameUnavailable {
            scenes: scenes.to_vec(),
            from: *from,
        });
    }

    fn handle_initialize_scene(&self, scene: &SceneInfo, from: &ParticipantId) {
        self.record(HandlerCall::InitializeScene {
            scene: scene.clone(),
            from: *from,
        });
    }

    fn handle_scene_action_list(
        &self,
        scene_id: SceneId,
        actions: SceneActionCollection,
        counter: u64,
        from: &ParticipantId,
    ) -> usize {
        let accepted = actions.len();
        self.record(HandlerCall::SceneActionList {
            scene_id,
            actions,
            counter,
            from: *from,
        });
        accepted
    }

    fn handle_scene_not_available(&self, scene_id: SceneId, from: &ParticipantId) {
        self.record(HandlerCall::SceneNotAvailable { scene_id, from: *from });
    }
}

impl ResourceProviderHandler for RecordingHandler {
    fn handle_request_resources(&self, resources: &[ResourceContentHash], from: &ParticipantId) {
        self.record(HandlerCall::RequestResources {
            resources: resources.to_vec(),
            from: *from,
        });
    }
}

impl ResourceConsumerHandler for RecordingHandler {
    fn handle_send_resource(&self, resource: Resource, from: &ParticipantId) {
        self.record(HandlerCall::SendResource {
            resource,
            from: *from,
        });
    }

    fn handle_resources_not_available(
        &self,
        resources: &[ResourceContentHash],
        from: &ParticipantId,
    ) {
        self.record(HandlerCall::ResourcesNotAvailable {
            resources: resources.to_vec(),
            from: *from,
        });
    }
}

/// Records connection status notifications.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Transition>>,
    pub connected: EventSignal,
    pub disconnected: EventSignal,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Transition> {
        guard(&self.events).clone()
    }

    /// How often `participant` was reported as connected.
    pub fn connected_count(&self, participant: &ParticipantId) -> usize {
        self.count(Transition::Connected(*participant))
    }

    /// How often `participant` was reported as disconnected.
    pub fn disconnected_count(&self, participant: &ParticipantId) -> usize {
        self.count(Transition::Disconnected(*participant))
    }

    fn count(&self, transition: Transition) -> usize {
        guard(&self.events).iter().filter(|t| **t == transition).count()
    }
}

impl ConnectionStatusListener for RecordingListener {
    fn new_participant_has_connected(&self, participant: &ParticipantId) {
        guard(&self.events).push(Transition::Connected(*participant));
        self.connected.signal();
    }

    fn participant_has_disconnected(&self, participant: &ParticipantId) {
        guard(&self.events).push(Transition::Disconnected(*participant));
        self.disconnected.signal();
    }
}

/// One participant of a harness, with its recorders registered.
pub struct Participant {
    pub id: ParticipantId,
    pub session: CommunicationSession<MemoryTransport>,
    pub handler: Arc<RecordingHandler>,
    pub listener: Arc<RecordingListener>,
}

impl Participant {
    /// Create a participant on `network` with all handler categories recorded.
    pub fn new(
        network: &Arc<MemoryNetwork>,
        id: ParticipantId,
        config: SessionConfig,
    ) -> anyhow::Result<Self> {
        let session = CommunicationSession::new(network.create_transport(id), config)?;
        let handler = RecordingHandler::new();
        let listener = RecordingListener::new();

        session.set_scene_provider_handler(&handler);
        session.set_scene_consumer_handler(&handler);
        session.set_resource_provider_handler(&handler);
        session.set_resource_consumer_handler(&handler);
        session.register_for_connection_updates(&listener);

        Ok(Self {
            id,
            session,
            handler,
            listener,
        })
    }
}

/// An in-memory network and its participants, owned by one test.
pub struct TestHarness {
    pub network: Arc<MemoryNetwork>,
    pub participants: Vec<Participant>,
}

impl TestHarness {
    /// Create `count` participants with ids `1..=count`.
    pub fn new(count: usize) -> anyhow::Result<Self> {
        Self::with_config(count, SessionConfig::default())
    }

    pub fn with_config(count: usize, config: SessionConfig) -> anyhow::Result<Self> {
        Self::with_network(MemoryNetwork::new(), count, config)
    }

    pub fn with_network(
        network: Arc<MemoryNetwork>,
        count: usize,
        config: SessionConfig,
    ) -> anyhow::Result<Self> {
        let participants = (1..=count as u128)
            .map(|i| Participant::new(&network, ParticipantId::from_u128(i), config.clone()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            network,
            participants,
        })
    }

    pub fn participant(&self, index: usize) -> &Participant {
        &self.participants[index]
    }

    pub async fn connect_all(&self) -> anyhow::Result<()> {
        for p in &self.participants {
            p.session.connect_services().await?;
        }
        Ok(())
    }

    /// Wait until every participant sees every other one as connected.
    pub async fn block_on_all_connected(&self, timeout: Duration) -> anyhow::Result<()> {
        let expected = self.participants.len().saturating_sub(1);
        tokio::time::timeout(timeout, async {
            while !self
                .participants
                .iter()
                .all(|p| p.session.connected_participants().len() >= expected)
            {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| anyhow!("participants not connected within {timeout:?}"))
    }

    /// Wait until `observer` no longer sees `participant` as connected.
    pub async fn block_on_disconnected(
        &self,
        observer: usize,
        participant: &ParticipantId,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        let session = &self.participants[observer].session;
        tokio::time::timeout(timeout, async {
            while session.connection_state(participant) == ConnectionState::Connected {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| anyhow!("{participant} still connected after {timeout:?}"))
    }

    pub async fn disconnect_all(&self) -> anyhow::Result<()> {
        for p in &self.participants {
            p.session.disconnect_services().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_signal_counts() {
        let signal = EventSignal::new();
        signal.signal();
        signal.signal();
        assert_eq!(signal.count(), 2);
        assert!(signal.wait_for_events(2, NEGATIVE_TIMEOUT).await);
        assert!(!signal.wait_for_events(3, Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_event_signal_wakes_waiter() {
        let signal = Arc::new(EventSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.wait_for_events(1, DEFAULT_TIMEOUT).await })
        };
        tokio::task::yield_now().await;
        signal.signal();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_harness_connects_participants() {
        init_tracing();
        let harness = TestHarness::new(3).unwrap();
        harness.connect_all().await.unwrap();
        harness.block_on_all_connected(DEFAULT_TIMEOUT).await.unwrap();

        let first = harness.participant(0);
        assert_eq!(first.session.connected_participants().len(), 2);
        assert!(first.listener.connected.wait_for_events(2, DEFAULT_TIMEOUT).await);

        harness.disconnect_all().await.unwrap();
        assert_eq!(harness.network.connected_count(), 0);
    }
}
