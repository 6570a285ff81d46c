//! Handler interfaces implemented by the layers above the communication core.
//!
//! One trait per handler category. Every method receives the decoded payload
//! and the sender, and runs synchronously on the delivery task.

use scenelink_core::{
    ParticipantId, Resource, ResourceContentHash, SceneActionCollection, SceneId, SceneInfo,
};

/// Receives requests addressed to a scene provider.
pub trait SceneProviderHandler: Send + Sync {
    fn handle_subscribe_scene(&self, scene_id: SceneId, from: &ParticipantId);

    fn handle_unsubscribe_scene(&self, scene_id: SceneId, from: &ParticipantId);
}

/// Receives scene lifecycle and content addressed to a scene consumer/renderer.
pub trait SceneConsumerHandler: Send + Sync {
    fn handle_new_scenes_available(&self, scenes: &[SceneInfo], from: &ParticipantId);

    fn handle_scenes_became_unavailable(&self, scenes: &[SceneInfo], from: &ParticipantId);

    fn handle_initialize_scene(&self, scene: &SceneInfo, from: &ParticipantId);

    /// Handle one scene action list flush, delivered whole however many
    /// messages it travelled in.
    ///
    /// Returns the number of actions accepted.
    fn handle_scene_action_list(
        &self,
        scene_id: SceneId,
        actions: SceneActionCollection,
        counter: u64,
        from: &ParticipantId,
    ) -> usize;

    fn handle_scene_not_available(&self, scene_id: SceneId, from: &ParticipantId);
}

/// Receives resource requests addressed to a resource provider.
pub trait ResourceProviderHandler: Send + Sync {
    fn handle_request_resources(&self, resources: &[ResourceContentHash], from: &ParticipantId);
}

/// Receives resources addressed to a resource consumer.
pub trait ResourceConsumerHandler: Send + Sync {
    /// Called once per fully reassembled resource.
    fn handle_send_resource(&self, resource: Resource, from: &ParticipantId);

    fn handle_resources_not_available(
        &self,
        resources: &[ResourceContentHash],
        from: &ParticipantId,
    );
}
