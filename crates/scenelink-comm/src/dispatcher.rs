//! Routing of decoded messages to registered handlers.
//!
//! The dispatcher holds at most one handler per category. References are
//! non-owning: the caller keeps the handler alive, and a handler that has been
//! dropped behaves exactly like an unregistered one.

use std::sync::{Arc, Weak};

use scenelink_core::{ParticipantId, Resource, SceneActionCollection, SceneId};

use crate::handlers::{
    ResourceConsumerHandler, ResourceProviderHandler, SceneConsumerHandler, SceneProviderHandler,
};
use crate::messages::{HandlerCategory, ProtocolMessage};

/// Result of dispatching one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler was invoked. `accepted` carries the count returned by
    /// scene action list handling.
    Handled { accepted: Option<usize> },
    /// No live handler for the category; the message was dropped.
    HandlerAbsent(HandlerCategory),
    /// The message carries a chunk and cannot be dispatched as is.
    Rejected,
}

/// Per-category handler slots.
#[derive(Default)]
pub struct Dispatcher {
    scene_provider: Option<Weak<dyn SceneProviderHandler>>,
    scene_consumer: Option<Weak<dyn SceneConsumerHandler>>,
    resource_provider: Option<Weak<dyn ResourceProviderHandler>>,
    resource_consumer: Option<Weak<dyn ResourceConsumerHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_scene_provider_handler<H: SceneProviderHandler + 'static>(&mut self, handler: &Arc<H>) {
        let weak: Weak<dyn SceneProviderHandler> = Arc::<H>::downgrade(handler);
        self.scene_provider = Some(weak);
    }

    pub fn set_scene_consumer_handler<H: SceneConsumerHandler + 'static>(&mut self, handler: &Arc<H>) {
        let weak: Weak<dyn SceneConsumerHandler> = Arc::<H>::downgrade(handler);
        self.scene_consumer = Some(weak);
    }

    pub fn set_resource_provider_handler<H: ResourceProviderHandler + 'static>(
        &mut self,
        handler: &Arc<H>,
    ) {
        let weak: Weak<dyn ResourceProviderHandler> = Arc::<H>::downgrade(handler);
        self.resource_provider = Some(weak);
    }

    pub fn set_resource_consumer_handler<H: ResourceConsumerHandler + 'static>(
        &mut self,
        handler: &Arc<H>,
    ) {
        let weak: Weak<dyn ResourceConsumerHandler> = Arc::<H>::downgrade(handler);
        self.resource_consumer = Some(weak);
    }

    /// Remove the handler of `category`.
    pub fn clear_handler(&mut self, category: HandlerCategory) {
        match category {
            HandlerCategory::SceneProvider => self.scene_provider = None,
            HandlerCategory::SceneConsumer => self.scene_consumer = None,
            HandlerCategory::ResourceProvider => self.resource_provider = None,
            HandlerCategory::ResourceConsumer => self.resource_consumer = None,
        }
    }

    /// Whether a live handler is registered for `category`.
    pub fn has_handler(&self, category: HandlerCategory) -> bool {
        fn live<T: ?Sized>(slot: &Option<Weak<T>>) -> bool {
            slot.as_ref().is_some_and(|w| w.strong_count() > 0)
        }
        match category {
            HandlerCategory::SceneProvider => live(&self.scene_provider),
            HandlerCategory::SceneConsumer => live(&self.scene_consumer),
            HandlerCategory::ResourceProvider => live(&self.resource_provider),
            HandlerCategory::ResourceConsumer => live(&self.resource_consumer),
        }
    }

    /// Invoke exactly one handler method for `message`.
    ///
    /// Chunk-carrying kinds (`SendResources`, `SceneActionList`) are rejected:
    /// they go through reassembly and [`Dispatcher::dispatch_resource`] or
    /// [`Dispatcher::dispatch_scene_action_list`].
    pub fn dispatch(&self, message: ProtocolMessage, from: &ParticipantId) -> DispatchOutcome {
        let category = message.handler_category();
        let handled = DispatchOutcome::Handled { accepted: None };

        match message {
            ProtocolMessage::SubscribeScene { scene_id } => {
                match upgrade(&self.scene_provider) {
                    Some(h) => h.handle_subscribe_scene(scene_id, from),
                    None => return DispatchOutcome::HandlerAbsent(category),
                }
            }
            ProtocolMessage::UnsubscribeScene { scene_id } => {
                match upgrade(&self.scene_provider) {
                    Some(h) => h.handle_unsubscribe_scene(scene_id, from),
                    None => return DispatchOutcome::HandlerAbsent(category),
                }
            }
            ProtocolMessage::ScenesAvailable { scenes } => match upgrade(&self.scene_consumer) {
                Some(h) => h.handle_new_scenes_available(&scenes, from),
                None => return DispatchOutcome::HandlerAbsent(category),
            },
            ProtocolMessage::ScenesBecameUnavailable { scenes } => {
                match upgrade(&self.scene_consumer) {
                    Some(h) => h.handle_scenes_became_unavailable(&scenes, from),
                    None => return DispatchOutcome::HandlerAbsent(category),
                }
            }
            ProtocolMessage::InitializeScene { scene } => match upgrade(&self.scene_consumer) {
                Some(h) => h.handle_initialize_scene(&scene, from),
                None => return DispatchOutcome::HandlerAbsent(category),
            },
            ProtocolMessage::SceneNotAvailable { scene_id } => {
                match upgrade(&self.scene_consumer) {
                    Some(h) => h.handle_scene_not_available(scene_id, from),
                    None => return DispatchOutcome::HandlerAbsent(category),
                }
            }
            ProtocolMessage::RequestResources { resources } => {
                match upgrade(&self.resource_provider) {
                    Some(h) => h.handle_request_resources(&resources, from),
                    None => return DispatchOutcome::HandlerAbsent(category),
                }
            }
            ProtocolMessage::ResourcesNotAvailable { resources } => {
                match upgrade(&self.resource_consumer) {
                    Some(h) => h.handle_resources_not_available(&resources, from),
                    None => return DispatchOutcome::HandlerAbsent(category),
                }
            }
            ProtocolMessage::SendResources { .. } | ProtocolMessage::SceneActionList { .. } => {
                return DispatchOutcome::Rejected;
            }
        }
        handled
    }

    /// Deliver a fully reassembled scene action list flush.
    pub fn dispatch_scene_action_list(
        &self,
        scene_id: SceneId,
        actions: SceneActionCollection,
        counter: u64,
        from: &ParticipantId,
    ) -> DispatchOutcome {
        match upgrade(&self.scene_consumer) {
            Some(h) => DispatchOutcome::Handled {
                accepted: Some(h.handle_scene_action_list(scene_id, actions, counter, from)),
            },
            None => DispatchOutcome::HandlerAbsent(HandlerCategory::SceneConsumer),
        }
    }

    /// Deliver a fully reassembled resource.
    pub fn dispatch_resource(&self, resource: Resource, from: &ParticipantId) -> DispatchOutcome {
        match upgrade(&self.resource_consumer) {
            Some(h) => {
                h.handle_send_resource(resource, from);
                DispatchOutcome::Handled { accepted: None }
            }
            None => DispatchOutcome::HandlerAbsent(HandlerCategory::ResourceConsumer),
        }
    }
}

fn upgrade<T: ?Sized>(slot: &Option<Weak<T>>) -> Option<Arc<T>> {
    slot.as_ref().and_then(Weak::upgrade)
}
