//! Protocol message catalogue.
//!
//! A closed set of message kinds tailored to scene distribution. Every kind
//! routes to exactly one handler category.

use serde::{Deserialize, Serialize};

use scenelink_core::{ResourceChunk, ResourceContentHash, SceneId, SceneInfo};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Hard limits enforced on decoded messages, independent of the sender's
/// configured `SendDataSizes`.
pub mod limits {
    /// Max scene infos in one lifecycle message.
    pub const MAX_SCENE_INFOS: usize = 4096;
    /// Max resource ids in one request or not-available message.
    pub const MAX_RESOURCE_IDS: usize = 65_536;
    /// Max actions in one scene action list flush.
    pub const MAX_SCENE_ACTIONS: usize = 1 << 20;
    /// Max length of a scene name.
    pub const MAX_SCENE_NAME_LEN: usize = 1024;
}

/// Protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolMessage {
    /// Consumer asks the provider to start sending a scene.
    SubscribeScene { scene_id: SceneId },

    /// Consumer no longer wants a scene.
    UnsubscribeScene { scene_id: SceneId },

    /// Provider announces published scenes, point-to-point or broadcast.
    ScenesAvailable { scenes: Vec<SceneInfo> },

    /// Provider withdraws published scenes.
    ScenesBecameUnavailable { scenes: Vec<SceneInfo> },

    /// Provider starts a subscribed scene on the consumer.
    InitializeScene { scene: SceneInfo },

    /// Provider cannot serve a subscription.
    SceneNotAvailable { scene_id: SceneId },

    /// One chunk of an encoded scene action list flush.
    ///
    /// `chunk.resource` is the flush key (see [`crate::codec::action_flush_key`]),
    /// and `chunk.data` a slice of the encoded action collection. A flush is
    /// handled once, after all of its chunks arrived.
    SceneActionList {
        scene_id: SceneId,
        /// Caller-assigned flush counter.
        counter: u64,
        chunk: ResourceChunk,
    },

    /// Consumer requests resources by content hash.
    RequestResources { resources: Vec<ResourceContentHash> },

    /// Provider cannot deliver the named resources.
    ResourcesNotAvailable { resources: Vec<ResourceContentHash> },

    /// One chunk of a resource payload.
    SendResources { chunk: ResourceChunk },
}

/// Discriminant of a [`ProtocolMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    SubscribeScene,
    UnsubscribeScene,
    ScenesAvailable,
    ScenesBecameUnavailable,
    InitializeScene,
    SceneNotAvailable,
    SceneActionList,
    RequestResources,
    ResourcesNotAvailable,
    SendResources,
}

/// Handler interface a message is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerCategory {
    SceneProvider,
    SceneConsumer,
    ResourceProvider,
    ResourceConsumer,
}

impl MessageKind {
    /// The handler category this kind is dispatched to.
    pub fn handler_category(self) -> HandlerCategory {
        match self {
            MessageKind::SubscribeScene | MessageKind::UnsubscribeScene => {
                HandlerCategory::SceneProvider
            }
            MessageKind::ScenesAvailable
            | MessageKind::ScenesBecameUnavailable
            | MessageKind::InitializeScene
            | MessageKind::SceneNotAvailable
            | MessageKind::SceneActionList => HandlerCategory::SceneConsumer,
            MessageKind::RequestResources => HandlerCategory::ResourceProvider,
            MessageKind::ResourcesNotAvailable | MessageKind::SendResources => {
                HandlerCategory::ResourceConsumer
            }
        }
    }
}

impl ProtocolMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ProtocolMessage::SubscribeScene { .. } => MessageKind::SubscribeScene,
            ProtocolMessage::UnsubscribeScene { .. } => MessageKind::UnsubscribeScene,
            ProtocolMessage::ScenesAvailable { .. } => MessageKind::ScenesAvailable,
            ProtocolMessage::ScenesBecameUnavailable { .. } => {
                MessageKind::ScenesBecameUnavailable
            }
            ProtocolMessage::InitializeScene { .. } => MessageKind::InitializeScene,
            ProtocolMessage::SceneNotAvailable { .. } => MessageKind::SceneNotAvailable,
            ProtocolMessage::SceneActionList { .. } => MessageKind::SceneActionList,
            ProtocolMessage::RequestResources { .. } => MessageKind::RequestResources,
            ProtocolMessage::ResourcesNotAvailable { .. } => MessageKind::ResourcesNotAvailable,
            ProtocolMessage::SendResources { .. } => MessageKind::SendResources,
        }
    }

    pub fn handler_category(&self) -> HandlerCategory {
        self.kind().handler_category()
    }

    /// Check structural consistency and size limits.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ProtocolMessage::ScenesAvailable { scenes }
            | ProtocolMessage::ScenesBecameUnavailable { scenes } => {
                if scenes.len() > limits::MAX_SCENE_INFOS {
                    return Err(format!("too many scene infos: {}", scenes.len()));
                }
                scenes.iter().try_for_each(validate_scene_info)?;
            }
            ProtocolMessage::InitializeScene { scene } => validate_scene_info(scene)?,
            ProtocolMessage::SceneActionList { chunk, .. } => {
                chunk.validate().map_err(|e| e.to_string())?;
            }
            ProtocolMessage::RequestResources { resources }
            | ProtocolMessage::ResourcesNotAvailable { resources } => {
                if resources.len() > limits::MAX_RESOURCE_IDS {
                    return Err(format!("too many resource ids: {}", resources.len()));
                }
            }
            ProtocolMessage::SendResources { chunk } => {
                chunk.validate().map_err(|e| e.to_string())?;
            }
            ProtocolMessage::SubscribeScene { .. }
            | ProtocolMessage::UnsubscribeScene { .. }
            | ProtocolMessage::SceneNotAvailable { .. } => {}
        }
        Ok(())
    }
}

fn validate_scene_info(info: &SceneInfo) -> Result<(), String> {
    match &info.name {
        Some(name) if name.len() > limits::MAX_SCENE_NAME_LEN => {
            Err(format!("scene name too long: {} bytes", name.len()))
        }
        _ => Ok(()),
    }
}
