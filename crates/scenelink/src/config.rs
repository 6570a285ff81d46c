//! Top-level configuration, loadable from JSON.
//!
//! ```json
//! {
//!   "participant_id": "000102030405060708090a0b0c0d0e0f",
//!   "session": {
//!     "send_data_sizes": { "max_resource_chunk_bytes": 65536 },
//!     "reassembly_timeout_ms": 30000
//!   }
//! }
//! ```
//!
//! Missing fields fall back to their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use scenelink_comm::{CommunicationSession, SessionConfig, Transport};
use scenelink_core::ParticipantId;

use crate::error::{Result, ScenelinkError};

/// Configuration of one scenelink participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenelinkConfig {
    /// Well-known participant id as 32 hex characters. A random id is
    /// generated when absent.
    pub participant_id: Option<String>,
    /// Session configuration.
    pub session: SessionConfig,
}

impl ScenelinkConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The configured participant id, or a freshly generated one.
    pub fn participant_id(&self) -> Result<ParticipantId> {
        match &self.participant_id {
            Some(hex) => ParticipantId::from_hex(hex)
                .map_err(|e| ScenelinkError::InvalidConfig(format!("participant_id: {e}"))),
            None => Ok(ParticipantId::generate()),
        }
    }

    /// Create a session over `transport` with this configuration.
    pub fn build_session<T: Transport>(&self, transport: T) -> Result<CommunicationSession<T>> {
        Ok(CommunicationSession::new(transport, self.session.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use scenelink_comm::{MemoryNetwork, SendDataSizes};

    #[test]
    fn test_empty_json_yields_defaults() {
        let config = ScenelinkConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ScenelinkConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "participant_id": "000102030405060708090a0b0c0d0e0f",
                "session": {{ "send_data_sizes": {{ "max_resource_chunk_bytes": 1000 }} }}
            }}"#
        )
        .unwrap();

        let config = ScenelinkConfig::from_file(file.path()).unwrap();
        assert_eq!(config.session.send_data_sizes.max_resource_chunk_bytes, 1000);
        assert_eq!(
            config.session.send_data_sizes.max_scene_infos_per_message,
            SendDataSizes::default().max_scene_infos_per_message
        );
        assert_eq!(
            config.participant_id().unwrap(),
            ParticipantId::from_u128(0x000102030405060708090a0b0c0d0e0f)
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScenelinkConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ScenelinkError::Io(_)));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = ScenelinkConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ScenelinkError::Parse(_)));
    }

    #[test]
    fn test_invalid_participant_id() {
        let config = ScenelinkConfig {
            participant_id: Some("xyz".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.participant_id(),
            Err(ScenelinkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = ScenelinkConfig {
            participant_id: Some(ParticipantId::from_u128(9).to_hex()),
            session: SessionConfig::default().with_send_data_sizes(
                SendDataSizes::default().with_max_resource_chunk_bytes(4096),
            ),
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(ScenelinkConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_build_session_rejects_oversized_chunks() {
        let network = MemoryNetwork::with_max_message_size(1024);
        let config = ScenelinkConfig::default();
        let err = config
            .build_session(network.create_transport(ParticipantId::from_u128(1)))
            .err()
            .unwrap();
        assert!(matches!(err, ScenelinkError::Communication(_)));
    }
}
