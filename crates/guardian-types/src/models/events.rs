//! Events pushed to the connected client.

use serde::{Deserialize, Serialize};

use super::circuit::CircuitEvent;
use super::worker::Detection;

/// Stable moderation verdict emitted by the hysteresis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StableLabel {
    Clean,
    Toxic,
}

impl std::fmt::Display for StableLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => f.write_str("CLEAN"),
            Self::Toxic => f.write_str("TOXIC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionNotice {
    pub label: StableLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<u64>,
}

impl DetectionNotice {
    /// Notice for a transition, enriched with the detection that triggered it.
    pub fn new(label: StableLabel, evidence: Option<&Detection>) -> Self {
        Self {
            label,
            score: evidence.and_then(|d| d.score),
            snippet: evidence.and_then(|d| d.snippet.clone()),
            start_ms: evidence.and_then(|d| d.start_ms),
            end_ms: evidence.and_then(|d| d.end_ms),
        }
    }
}

/// Outbound message on the audio WebSocket.
///
/// Serialized as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Partial { text: String },
    Final { text: String, words: Vec<serde_json::Value> },
    Detection(DetectionNotice),
    StateChange(CircuitEvent),
    Error { message: String },
}

impl ClientEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Partial { .. } => "partial",
            Self::Final { .. } => "final",
            Self::Detection(_) => "detection",
            Self::StateChange(_) => "state_change",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_event_shape() {
        let event = ClientEvent::Detection(DetectionNotice::new(StableLabel::Toxic, None));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "detection");
        assert_eq!(json["data"]["label"], "TOXIC");
        assert!(json["data"].get("score").is_none());
    }

    #[test]
    fn test_final_event_shape() {
        let event = ClientEvent::Final { text: "xin chao".into(), words: vec![] };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "final");
        assert_eq!(json["data"]["text"], "xin chao");
        assert!(json["data"]["words"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_notice_copies_evidence() {
        let det = Detection {
            label: "toxic".into(),
            score: Some(0.97),
            start_ms: Some(10),
            end_ms: Some(20),
            snippet: Some("***".into()),
        };
        let notice = DetectionNotice::new(StableLabel::Toxic, Some(&det));
        assert_eq!(notice.score, Some(0.97));
        assert_eq!(notice.start_ms, Some(10));
        assert_eq!(notice.snippet.as_deref(), Some("***"));
    }
}
