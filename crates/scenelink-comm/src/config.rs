//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CommunicationError, Result};
use crate::messages::limits;

/// Bytes reserved in every frame for the envelope and message header.
pub const FRAME_OVERHEAD_RESERVE: usize = 256;

/// Per-message-kind size limits applied to outgoing traffic.
///
/// Changes take effect for transfers initiated after the change. A transfer is
/// split completely at the moment its send call is made, so no in-flight
/// transfer is ever resized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendDataSizes {
    /// Maximum payload bytes carried by one resource chunk.
    pub max_resource_chunk_bytes: usize,
    /// Maximum bytes of an encoded scene action flush carried by one message.
    pub max_scene_action_bytes_per_message: usize,
    /// Maximum resource ids in one request or not-available message.
    pub max_resource_ids_per_message: usize,
    /// Maximum scene infos in one scene lifecycle message.
    pub max_scene_infos_per_message: usize,
}

impl Default for SendDataSizes {
    fn default() -> Self {
        Self {
            max_resource_chunk_bytes: 256 * 1024,
            max_scene_action_bytes_per_message: 256 * 1024,
            max_resource_ids_per_message: 1024,
            max_scene_infos_per_message: 256,
        }
    }
}

impl SendDataSizes {
    pub fn with_max_resource_chunk_bytes(mut self, bytes: usize) -> Self {
        self.max_resource_chunk_bytes = bytes;
        self
    }

    /// Check the limits against the transport's maximum message size.
    pub fn validate(&self, max_message_size: usize) -> Result<()> {
        let fields = [
            ("max_resource_chunk_bytes", self.max_resource_chunk_bytes),
            (
                "max_scene_action_bytes_per_message",
                self.max_scene_action_bytes_per_message,
            ),
            ("max_resource_ids_per_message", self.max_resource_ids_per_message),
            ("max_scene_infos_per_message", self.max_scene_infos_per_message),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| *v == 0) {
            return Err(CommunicationError::InvalidConfig(format!(
                "{name} must be greater than zero"
            )));
        }

        for (name, bytes) in [
            ("max_resource_chunk_bytes", self.max_resource_chunk_bytes),
            (
                "max_scene_action_bytes_per_message",
                self.max_scene_action_bytes_per_message,
            ),
        ] {
            if bytes.saturating_add(FRAME_OVERHEAD_RESERVE) > max_message_size {
                return Err(CommunicationError::InvalidConfig(format!(
                    "{name} ({bytes}) plus frame overhead exceeds transport limit ({max_message_size})"
                )));
            }
        }

        // Peers reject messages above the protocol limits.
        for (name, count, limit) in [
            (
                "max_scene_infos_per_message",
                self.max_scene_infos_per_message,
                limits::MAX_SCENE_INFOS,
            ),
            (
                "max_resource_ids_per_message",
                self.max_resource_ids_per_message,
                limits::MAX_RESOURCE_IDS,
            ),
        ] {
            if count > limit {
                return Err(CommunicationError::InvalidConfig(format!(
                    "{name} ({count}) exceeds protocol limit ({limit})"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for a communication session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Outgoing size limits.
    pub send_data_sizes: SendDataSizes,
    /// Largest declared resource size accepted from a peer.
    pub max_reassembly_bytes: u64,
    /// Partial transfers idle for longer than this are discarded.
    pub reassembly_timeout_ms: u64,
    /// How often idle transfers are checked for.
    pub eviction_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_data_sizes: SendDataSizes::default(),
            max_reassembly_bytes: 512 * 1024 * 1024,
            reassembly_timeout_ms: 60_000,
            eviction_interval_ms: 5_000,
        }
    }
}

impl SessionConfig {
    pub fn with_send_data_sizes(mut self, sizes: SendDataSizes) -> Self {
        self.send_data_sizes = sizes;
        self
    }

    pub fn with_reassembly_timeout(mut self, timeout: Duration) -> Self {
        self.reassembly_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn reassembly_timeout(&self) -> Duration {
        Duration::from_millis(self.reassembly_timeout_ms)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms.max(1))
    }

    /// Validate against the transport's maximum message size.
    pub fn validate(&self, max_message_size: usize) -> Result<()> {
        self.send_data_sizes.validate(max_message_size)?;
        if self.max_reassembly_bytes == 0 {
            return Err(CommunicationError::InvalidConfig(
                "max_reassembly_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fit_one_mebibyte_transport() {
        assert!(SessionConfig::default().validate(1024 * 1024).is_ok());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let sizes = SendDataSizes {
            max_scene_infos_per_message: 0,
            ..Default::default()
        };
        let err = sizes.validate(1024 * 1024).unwrap_err();
        assert!(err.to_string().contains("max_scene_infos_per_message"));
    }

    #[test]
    fn test_chunk_larger_than_transport_rejected() {
        let sizes = SendDataSizes::default().with_max_resource_chunk_bytes(1024 * 1024);
        assert!(matches!(
            sizes.validate(1024 * 1024),
            Err(CommunicationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_counts_above_protocol_limits_rejected() {
        let sizes = SendDataSizes {
            max_scene_infos_per_message: limits::MAX_SCENE_INFOS + 1,
            ..Default::default()
        };
        let err = sizes.validate(1024 * 1024).unwrap_err();
        assert!(err.to_string().contains("max_scene_infos_per_message"));

        let sizes = SendDataSizes {
            max_resource_ids_per_message: limits::MAX_RESOURCE_IDS + 1,
            ..Default::default()
        };
        let err = sizes.validate(1024 * 1024).unwrap_err();
        assert!(err.to_string().contains("max_resource_ids_per_message"));

        let at_limit = SendDataSizes {
            max_scene_infos_per_message: limits::MAX_SCENE_INFOS,
            max_resource_ids_per_message: limits::MAX_RESOURCE_IDS,
            ..Default::default()
        };
        assert!(at_limit.validate(1024 * 1024).is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"send_data_sizes": {"max_resource_chunk_bytes": 1000}}"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.send_data_sizes.max_resource_chunk_bytes, 1000);
        assert_eq!(
            config.send_data_sizes.max_scene_infos_per_message,
            SendDataSizes::default().max_scene_infos_per_message
        );
        assert_eq!(config.reassembly_timeout(), Duration::from_secs(60));
    }
}
