//! Wire codec for protocol frames.
//!
//! A frame is one CBOR-encoded envelope `{ version, message }`. Frames are
//! self-delimiting, so any transport that preserves message boundaries can
//! carry them unchanged.
//!
//! A scene action list flush is encoded separately into one payload, which
//! then travels in chunks like a resource.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use scenelink_core::{ResourceContentHash, SceneActionCollection, SceneId};

use crate::error::{CommunicationError, Result};
use crate::messages::{limits, ProtocolMessage, PROTOCOL_VERSION};

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u8,
    message: &'a ProtocolMessage,
}

#[derive(Deserialize)]
struct Envelope {
    version: u8,
    message: ProtocolMessage,
}

/// Encode a message into a frame.
pub fn encode_frame(message: &ProtocolMessage) -> Result<Bytes> {
    let envelope = EnvelopeRef {
        version: PROTOCOL_VERSION,
        message,
    };
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&envelope, &mut buf)
        .map_err(|e| CommunicationError::Codec(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decode and validate a frame.
///
/// Truncated, trailing or otherwise malformed input yields an error; it never
/// panics.
pub fn decode_frame(frame: &[u8]) -> Result<ProtocolMessage> {
    let mut reader = frame;
    let envelope: Envelope = ciborium::de::from_reader(&mut reader)
        .map_err(|e| CommunicationError::Codec(e.to_string()))?;

    if !reader.is_empty() {
        return Err(CommunicationError::ProtocolViolation(format!(
            "{} trailing bytes after frame",
            reader.len()
        )));
    }
    if envelope.version != PROTOCOL_VERSION {
        return Err(CommunicationError::ProtocolViolation(format!(
            "protocol version mismatch: local={}, peer={}",
            PROTOCOL_VERSION, envelope.version
        )));
    }

    envelope
        .message
        .validate()
        .map_err(CommunicationError::ProtocolViolation)?;
    Ok(envelope.message)
}

/// Encode the actions of one flush into a single payload.
pub fn encode_action_flush(actions: &SceneActionCollection) -> Result<Bytes> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(actions, &mut buf)
        .map_err(|e| CommunicationError::Codec(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decode a reassembled flush payload.
pub fn decode_action_flush(payload: &[u8]) -> Result<SceneActionCollection> {
    let mut reader = payload;
    let actions: SceneActionCollection = ciborium::de::from_reader(&mut reader)
        .map_err(|e| CommunicationError::Codec(e.to_string()))?;

    if !reader.is_empty() {
        return Err(CommunicationError::ProtocolViolation(format!(
            "{} trailing bytes after scene action flush",
            reader.len()
        )));
    }
    if actions.len() > limits::MAX_SCENE_ACTIONS {
        return Err(CommunicationError::ProtocolViolation(format!(
            "too many scene actions: {}",
            actions.len()
        )));
    }
    Ok(actions)
}

/// Key of a flush in transit: the content hash of scene id, counter and payload.
///
/// Two flushes in flight from one sender never share a key unless they are
/// byte-identical sends of the same counter.
pub fn action_flush_key(scene_id: SceneId, counter: u64, payload: &[u8]) -> ResourceContentHash {
    ResourceContentHash::of_parts(&[
        &scene_id.value().to_be_bytes()[..],
        &counter.to_be_bytes()[..],
        payload,
    ])
}
