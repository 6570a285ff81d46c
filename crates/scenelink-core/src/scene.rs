//! Scene metadata, scene actions and resources.
//!
//! The communication layer treats scene content as opaque bytes. These types
//! only carry what the protocol needs: identity, size and ordering.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::{ResourceContentHash, SceneId};

/// Who may see a published scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublicationMode {
    /// Visible to renderers in the same process only.
    LocalOnly,
    /// Visible to local and remote renderers.
    #[default]
    LocalAndRemote,
}

/// Published metadata of a scene, carried by lifecycle messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneInfo {
    pub scene_id: SceneId,
    pub name: Option<String>,
    pub publication: PublicationMode,
}

impl SceneInfo {
    pub fn new(scene_id: SceneId) -> Self {
        Self {
            scene_id,
            name: None,
            publication: PublicationMode::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_publication(mut self, publication: PublicationMode) -> Self {
        self.publication = publication;
        self
    }
}

/// One opaque scene action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneAction {
    /// Action type tag, interpreted by the scene layer.
    pub kind: u32,
    pub payload: Bytes,
}

impl SceneAction {
    pub fn new(kind: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

/// An ordered batch of scene actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneActionCollection {
    actions: Vec<SceneAction>,
}

impl SceneActionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: SceneAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[SceneAction] {
        &self.actions
    }

    /// Total payload bytes over all actions.
    pub fn payload_bytes(&self) -> usize {
        self.actions.iter().map(|a| a.payload.len()).sum()
    }
}

impl FromIterator<SceneAction> for SceneActionCollection {
    fn from_iter<I: IntoIterator<Item = SceneAction>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SceneActionCollection {
    type Item = SceneAction;
    type IntoIter = std::vec::IntoIter<SceneAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

/// A content-addressed binary resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub hash: ResourceContentHash,
    pub data: Bytes,
}

impl Resource {
    /// Wrap `data`, computing its content hash.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            hash: ResourceContentHash::of(&data),
            data,
        }
    }

    /// Wrap `data` under an externally assigned hash.
    pub fn with_hash(hash: ResourceContentHash, data: impl Into<Bytes>) -> Self {
        Self {
            hash,
            data: data.into(),
        }
    }

    /// Whether `data` actually hashes to `hash`.
    pub fn is_intact(&self) -> bool {
        ResourceContentHash::of(&self.data) == self.hash
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(sizes: &[usize]) -> SceneActionCollection {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| SceneAction::new(i as u32, vec![0u8; n]))
            .collect()
    }

    #[test]
    fn test_collection_accounting() {
        let actions = collection(&[10, 0, 32]);
        assert_eq!(actions.len(), 3);
        assert_eq!(actions.payload_bytes(), 42);
        let kinds: Vec<_> = actions.into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![0, 1, 2]);
    }

    #[test]
    fn test_resource_hash_matches_data() {
        let resource = Resource::new(vec![1u8, 2, 3]);
        assert_eq!(resource.hash, ResourceContentHash::of(&[1, 2, 3]));
        assert_eq!(resource.len(), 3);
        assert!(resource.is_intact());
        assert!(!Resource::with_hash(ResourceContentHash::ZERO, vec![1u8]).is_intact());
    }

    #[test]
    fn test_scene_info_serde() {
        let info = SceneInfo::new(SceneId(9)).with_name("cluster");
        let json = serde_json::to_string(&info).unwrap();
        let back: SceneInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
    }
}
