//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use scenelink_comm::{action_flush_key, encode_action_flush, ProtocolMessage};
use scenelink_core::{
    split, ParticipantId, PublicationMode, Resource, ResourceChunk, ResourceContentHash,
    SceneAction, SceneActionCollection, SceneId, SceneInfo,
};

/// Generate a random ParticipantId.
pub fn participant_id() -> impl Strategy<Value = ParticipantId> {
    any::<[u8; 16]>().prop_map(ParticipantId::from_bytes)
}

/// Generate a random ResourceContentHash.
pub fn resource_content_hash() -> impl Strategy<Value = ResourceContentHash> {
    any::<[u8; 16]>().prop_map(ResourceContentHash::from_bytes)
}

pub fn scene_id() -> impl Strategy<Value = SceneId> {
    any::<u64>().prop_map(SceneId::new)
}

pub fn publication_mode() -> impl Strategy<Value = PublicationMode> {
    prop_oneof![
        Just(PublicationMode::LocalOnly),
        Just(PublicationMode::LocalAndRemote),
    ]
}

/// Generate a scene name.
pub fn scene_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,31}".prop_map(String::from)
}

pub fn scene_info() -> impl Strategy<Value = SceneInfo> {
    (scene_id(), proptest::option::of(scene_name()), publication_mode()).prop_map(
        |(id, name, publication)| SceneInfo {
            scene_id: id,
            name,
            publication,
        },
    )
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a chunk size limit small enough to produce several chunks.
pub fn chunk_limit() -> impl Strategy<Value = usize> {
    1usize..=512
}

pub fn scene_action(max_payload: usize) -> impl Strategy<Value = SceneAction> {
    (any::<u32>(), payload(max_payload)).prop_map(|(kind, data)| SceneAction::new(kind, data))
}

pub fn scene_action_collection(
    max_actions: usize,
    max_payload: usize,
) -> impl Strategy<Value = SceneActionCollection> {
    prop::collection::vec(scene_action(max_payload), 0..=max_actions)
        .prop_map(|actions| actions.into_iter().collect())
}

pub fn resource(max_len: usize) -> impl Strategy<Value = Resource> {
    payload(max_len).prop_map(Resource::new)
}

/// Generate a complete single-chunk resource transfer.
pub fn resource_chunk(max_len: usize) -> impl Strategy<Value = ResourceChunk> {
    resource(max_len).prop_map(|r| ResourceChunk {
        resource: r.hash,
        total_size: r.len() as u64,
        offset: 0,
        data: Bytes::clone(&r.data),
    })
}

/// Generate a resource together with its chunks in a random arrival order.
pub fn shuffled_transfer(max_len: usize) -> impl Strategy<Value = (Resource, Vec<ResourceChunk>)> {
    (resource(max_len), chunk_limit()).prop_flat_map(|(resource, limit)| {
        let chunks = split(&resource.data, resource.hash, limit).unwrap_or_default();
        (Just(resource), Just(chunks).prop_shuffle())
    })
}

/// Generate a scene action list flush that fits one message.
pub fn scene_action_list_message() -> impl Strategy<Value = ProtocolMessage> {
    (scene_id(), any::<u64>(), scene_action_collection(16, 64)).prop_map(
        |(scene_id, counter, actions)| {
            let payload = encode_action_flush(&actions).unwrap_or_default();
            ProtocolMessage::SceneActionList {
                scene_id,
                counter,
                chunk: ResourceChunk {
                    resource: action_flush_key(scene_id, counter, &payload),
                    total_size: payload.len() as u64,
                    offset: 0,
                    data: payload,
                },
            }
        },
    )
}

/// Generate any well-formed protocol message.
pub fn protocol_message() -> impl Strategy<Value = ProtocolMessage> {
    let scenes = || prop::collection::vec(scene_info(), 0..8);
    let hashes = || prop::collection::vec(resource_content_hash(), 0..16);
    prop_oneof![
        scene_id().prop_map(|scene_id| ProtocolMessage::SubscribeScene { scene_id }),
        scene_id().prop_map(|scene_id| ProtocolMessage::UnsubscribeScene { scene_id }),
        scenes().prop_map(|scenes| ProtocolMessage::ScenesAvailable { scenes }),
        scenes().prop_map(|scenes| ProtocolMessage::ScenesBecameUnavailable { scenes }),
        scene_info().prop_map(|scene| ProtocolMessage::InitializeScene { scene }),
        scene_id().prop_map(|scene_id| ProtocolMessage::SceneNotAvailable { scene_id }),
        scene_action_list_message(),
        hashes().prop_map(|resources| ProtocolMessage::RequestResources { resources }),
        hashes().prop_map(|resources| ProtocolMessage::ResourcesNotAvailable { resources }),
        resource_chunk(256).prop_map(|chunk| ProtocolMessage::SendResources { chunk }),
    ]
}
