//! Strong identifier types.
//!
//! All identifiers are newtypes so a scene id can never be passed where a
//! participant address is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 128-bit participant identifier.
///
/// Generated once per process lifetime, or assigned deterministically for
/// well-known daemons. It is the sole addressing key of every protocol exchange.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub [u8; 16]);

impl ParticipantId {
    /// Generate a random participant id.
    pub fn generate() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create a deterministic id, e.g. for a well-known daemon.
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// The zero participant id (never generated in practice, used as a sentinel).
    pub const ZERO: Self = Self([0u8; 16]);
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.to_hex())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

impl From<[u8; 16]> for ParticipantId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

/// Identifier of a scene instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SceneId(pub u64);

impl SceneId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene:{}", self.0)
    }
}

/// Content address of a resource: Blake3 of the resource bytes, truncated to 128 bits.
///
/// Used as a key only. It carries no information about the payload size.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceContentHash(pub [u8; 16]);

impl ResourceContentHash {
    /// Compute the content hash of `data`.
    pub fn of(data: &[u8]) -> Self {
        let digest = blake3::hash(data);
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&digest.as_bytes()[..16]);
        Self(arr)
    }

    /// Hash the concatenation of `parts` without materializing it.
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&hasher.finalize().as_bytes()[..16]);
        Self(arr)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// The zero hash (invalid resource sentinel).
    pub const ZERO: Self = Self([0u8; 16]);
}

impl fmt::Debug for ResourceContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ResourceContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id_hex_roundtrip() {
        let id = ParticipantId::from_bytes([0x42; 16]);
        let recovered = ParticipantId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_participant_id_from_hex_wrong_length() {
        assert!(ParticipantId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = ParticipantId::generate();
        let b = ParticipantId::generate();
        assert_ne!(a, b);
        assert_ne!(a, ParticipantId::ZERO);
    }

    #[test]
    fn test_well_known_id_is_deterministic() {
        assert_eq!(ParticipantId::from_u128(1), ParticipantId::from_u128(1));
        assert_eq!(ParticipantId::from_u128(1).as_bytes()[15], 1);
    }

    #[test]
    fn test_participant_id_display() {
        let id = ParticipantId::from_bytes([0xab; 16]);
        assert_eq!(format!("{}", id), "abababababab");
        assert!(format!("{:?}", id).starts_with("ParticipantId("));
    }

    #[test]
    fn test_content_hash_is_content_addressed() {
        let a = ResourceContentHash::of(b"vertex data");
        let b = ResourceContentHash::of(b"vertex data");
        let c = ResourceContentHash::of(b"index data");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_of_parts_matches_concatenation() {
        let whole = ResourceContentHash::of(b"vertexdata");
        assert_eq!(ResourceContentHash::of_parts(&[&b"vertex"[..], &b"data"[..]]), whole);
        assert_ne!(ResourceContentHash::of_parts(&[&b"vertex"[..], &b"date"[..]]), whole);
    }

    #[test]
    fn test_scene_id_display() {
        assert_eq!(SceneId::new(123).to_string(), "scene:123");
    }
}
