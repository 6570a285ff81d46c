//! Participant connection tracking and connect/disconnect notification.
//!
//! State only changes in response to transport events. A participant the
//! registry has never seen is treated exactly like a disconnected one.
//!
//! ```text
//! Unknown -> Connecting -> Connected -> Disconnected
//!                ^                          |
//!                +--------------------------+  (reconnect)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use scenelink_core::ParticipantId;

use crate::sync_util::{read_lock, write_lock};

/// Per-participant connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Unknown,
    Connecting,
    Connected,
    Disconnected,
}

/// A state change listeners must hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Connected(ParticipantId),
    Disconnected(ParticipantId),
}

/// Receives participant connect/disconnect notifications.
pub trait ConnectionStatusListener: Send + Sync {
    fn new_participant_has_connected(&self, participant: &ParticipantId);

    fn participant_has_disconnected(&self, participant: &ParticipantId);
}

/// Source of truth for peer connection state.
///
/// Every send-family operation consults it. Reads go through the lock, so a
/// sender that has observed "connected" never reads a staler state afterwards.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    states: RwLock<HashMap<ParticipantId, ConnectionState>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, participant: &ParticipantId) -> ConnectionState {
        read_lock(&self.states)
            .get(participant)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_connected(&self, participant: &ParticipantId) -> bool {
        self.state(participant) == ConnectionState::Connected
    }

    /// Currently connected participants, sorted for stable output.
    pub fn connected(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<_> = read_lock(&self.states)
            .iter()
            .filter(|(_, s)| **s == ConnectionState::Connected)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// The transport discovered a participant it is about to connect to.
    pub fn participant_discovered(&self, participant: ParticipantId) {
        let mut states = write_lock(&self.states);
        let state = states.entry(participant).or_default();
        if matches!(*state, ConnectionState::Unknown | ConnectionState::Disconnected) {
            *state = ConnectionState::Connecting;
        }
    }

    /// Returns a transition only if the participant was not already connected.
    pub fn participant_connected(&self, participant: ParticipantId) -> Option<Transition> {
        let mut states = write_lock(&self.states);
        let state = states.entry(participant).or_default();
        if *state == ConnectionState::Connected {
            return None;
        }
        *state = ConnectionState::Connected;
        Some(Transition::Connected(participant))
    }

    /// Returns a transition only if the participant was connected.
    ///
    /// A participant that disappears while still connecting moves to
    /// Disconnected silently: listeners never heard it connect.
    pub fn participant_disconnected(&self, participant: ParticipantId) -> Option<Transition> {
        let mut states = write_lock(&self.states);
        let state = states.get_mut(&participant)?;
        let was_connected = *state == ConnectionState::Connected;
        *state = ConnectionState::Disconnected;
        was_connected.then_some(Transition::Disconnected(participant))
    }

    /// Move every connected participant to Disconnected.
    pub fn disconnect_all(&self) -> Vec<Transition> {
        let mut states = write_lock(&self.states);
        let mut transitions: Vec<_> = states
            .iter_mut()
            .filter(|(_, s)| **s != ConnectionState::Disconnected)
            .filter_map(|(id, s)| {
                let was_connected = *s == ConnectionState::Connected;
                *s = ConnectionState::Disconnected;
                was_connected.then_some(Transition::Disconnected(*id))
            })
            .collect();
        transitions.sort_by_key(|t| match t {
            Transition::Connected(id) | Transition::Disconnected(id) => *id,
        });
        transitions
    }
}

/// Registered listeners, held by non-owning reference.
///
/// Not internally synchronized: the session guards it with the same lock as
/// its handler slots, which makes notification and (un)registration mutually
/// exclusive.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<Weak<dyn ConnectionStatusListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener. Registering the same listener twice has no effect.
    pub fn register<L: ConnectionStatusListener + 'static>(&mut self, listener: &Arc<L>) -> bool {
        let weak: Weak<dyn ConnectionStatusListener> = Arc::<L>::downgrade(listener);
        self.prune();
        if self.listeners.iter().any(|l| Weak::ptr_eq(l, &weak)) {
            return false;
        }
        self.listeners.push(weak);
        true
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unregister<L: ConnectionStatusListener + 'static>(&mut self, listener: &Arc<L>) -> bool {
        let weak: Weak<dyn ConnectionStatusListener> = Arc::<L>::downgrade(listener);
        let before = self.listeners.len();
        self.listeners.retain(|l| !Weak::ptr_eq(l, &weak));
        self.prune();
        before != self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.iter().filter(|l| l.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `transition` to every live listener.
    pub fn notify(&self, transition: Transition) {
        for listener in self.listeners.iter().filter_map(Weak::upgrade) {
            match transition {
                Transition::Connected(id) => listener.new_participant_has_connected(&id),
                Transition::Disconnected(id) => listener.participant_has_disconnected(&id),
            }
        }
    }

    fn prune(&mut self) {
        self.listeners.retain(|l| l.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Transition>>,
    }

    impl ConnectionStatusListener for Recorder {
        fn new_participant_has_connected(&self, participant: &ParticipantId) {
            self.events.lock().unwrap().push(Transition::Connected(*participant));
        }

        fn participant_has_disconnected(&self, participant: &ParticipantId) {
            self.events.lock().unwrap().push(Transition::Disconnected(*participant));
        }
    }

    const PEER: ParticipantId = ParticipantId::from_u128(5);

    #[test]
    fn test_unknown_peer_is_not_connected() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.state(&PEER), ConnectionState::Unknown);
        assert!(!registry.is_connected(&PEER));
    }

    #[test]
    fn test_lifecycle_transitions() {
        let registry = ConnectionRegistry::new();
        registry.participant_discovered(PEER);
        assert_eq!(registry.state(&PEER), ConnectionState::Connecting);

        assert_eq!(registry.participant_connected(PEER), Some(Transition::Connected(PEER)));
        assert_eq!(registry.participant_connected(PEER), None);
        assert_eq!(registry.connected(), vec![PEER]);

        assert_eq!(
            registry.participant_disconnected(PEER),
            Some(Transition::Disconnected(PEER))
        );
        assert_eq!(registry.participant_disconnected(PEER), None);

        // Reconnect cycles back through Connecting.
        registry.participant_discovered(PEER);
        assert_eq!(registry.state(&PEER), ConnectionState::Connecting);
        assert!(registry.participant_connected(PEER).is_some());
    }

    #[test]
    fn test_disconnect_while_connecting_is_silent() {
        let registry = ConnectionRegistry::new();
        registry.participant_discovered(PEER);
        assert_eq!(registry.participant_disconnected(PEER), None);
        assert_eq!(registry.state(&PEER), ConnectionState::Disconnected);
    }

    #[test]
    fn test_disconnect_of_unknown_peer_is_ignored() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.participant_disconnected(PEER), None);
        assert_eq!(registry.state(&PEER), ConnectionState::Unknown);
    }

    #[test]
    fn test_disconnect_all_reports_connected_only() {
        let registry = ConnectionRegistry::new();
        let other = ParticipantId::from_u128(6);
        registry.participant_connected(PEER);
        registry.participant_discovered(other);

        assert_eq!(registry.disconnect_all(), vec![Transition::Disconnected(PEER)]);
        assert!(registry.connected().is_empty());
        assert_eq!(registry.state(&other), ConnectionState::Disconnected);
    }

    #[test]
    fn test_listener_registration_is_idempotent() {
        let recorder = Arc::new(Recorder::default());
        let mut set = ListenerSet::new();
        assert!(set.register(&recorder));
        assert!(!set.register(&recorder));
        assert_eq!(set.len(), 1);

        set.notify(Transition::Connected(PEER));
        assert_eq!(*recorder.events.lock().unwrap(), vec![Transition::Connected(PEER)]);
    }

    #[test]
    fn test_unregistered_listener_hears_nothing() {
        let recorder = Arc::new(Recorder::default());
        let mut set = ListenerSet::new();
        set.register(&recorder);
        assert!(set.unregister(&recorder));
        assert!(!set.unregister(&recorder));

        set.notify(Transition::Disconnected(PEER));
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let mut set = ListenerSet::new();
        {
            let recorder = Arc::new(Recorder::default());
            set.register(&recorder);
        }
        assert!(set.is_empty());
        set.notify(Transition::Connected(PEER));
    }
}
