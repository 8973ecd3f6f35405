//! Listener and per-session relay settings.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1_u64))]
    pub host: String,
    #[validate(range(min = 1_u16))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Frames above this size are refused with an `error` event
    #[validate(range(min = 1_usize))]
    pub max_frame_bytes: usize,
    #[validate(range(min = 1_usize))]
    pub event_channel_capacity: usize,
    /// Classify final transcripts that arrive without detections
    pub moderate_transcripts: bool,
    #[validate(range(min = 100_u64))]
    pub health_check_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 1024 * 1024,
            event_channel_capacity: 256,
            moderate_transcripts: true,
            health_check_interval_ms: 15_000,
        }
    }
}
