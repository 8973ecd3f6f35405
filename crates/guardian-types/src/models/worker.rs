//! Wire format exchanged with the AI worker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsrStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsrPartial {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsrFinal {
    pub text: String,
    #[serde(default)]
    pub words: Vec<serde_json::Value>,
}

/// Raw per-chunk classification produced by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub label: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub start_ms: Option<u64>,
    #[serde(default)]
    pub end_ms: Option<u64>,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Response body of `POST /asr/stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsrResponse {
    pub status: AsrStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<AsrPartial>,
    #[serde(default, rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_: Option<AsrFinal>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Worker-side explanation accompanying `status: "error"`
    #[serde(default, alias = "detail", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AsrResponse {
    pub fn is_ok(&self) -> bool {
        self.status == AsrStatus::Ok
    }

    /// Combine responses for sequential chunks of one frame.
    ///
    /// The last partial wins, final texts are joined with a space, words and
    /// detections are concatenated. Any error status makes the merge an error.
    pub fn merge(parts: Vec<AsrResponse>) -> Option<AsrResponse> {
        let mut iter = parts.into_iter();
        let mut merged = iter.next()?;
        for next in iter {
            if next.status == AsrStatus::Error {
                merged.status = AsrStatus::Error;
                merged.message = next.message.or(merged.message);
            }
            if next.partial.is_some() {
                merged.partial = next.partial;
            }
            merged.final_ = match (merged.final_.take(), next.final_) {
                (Some(mut acc), Some(f)) => {
                    if !f.text.is_empty() {
                        if !acc.text.is_empty() {
                            acc.text.push(' ');
                        }
                        acc.text.push_str(&f.text);
                    }
                    acc.words.extend(f.words);
                    Some(acc)
                },
                (acc, f) => acc.or(f),
            };
            merged.detections.extend(next.detections);
        }
        Some(merged)
    }
}

/// Request body of `POST /moderation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationRequest {
    pub inputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub label: String,
    pub score: f64,
}

/// Response body of `POST /moderation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResponse {
    pub results: Vec<ModerationResult>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_minimal_worker_body() {
        let body = r#"{"status":"ok","final":{"text":"xin chao","words":[]},"detections":[]}"#;
        let resp: AsrResponse = serde_json::from_str(body).unwrap();
        assert!(resp.is_ok());
        assert_eq!(resp.final_.unwrap().text, "xin chao");
        assert!(resp.partial.is_none());
    }

    #[test]
    fn test_rejects_missing_status() {
        let body = r#"{"final":{"text":"x"}}"#;
        assert!(serde_json::from_str::<AsrResponse>(body).is_err());
    }

    #[test]
    fn test_detection_camel_case_fields() {
        let body = r#"{"status":"ok","detections":[{"label":"toxic","score":0.91,"startMs":120,"endMs":480,"snippet":"..."}]}"#;
        let resp: AsrResponse = serde_json::from_str(body).unwrap();
        let det = &resp.detections[0];
        assert_eq!(det.label, "toxic");
        assert_eq!(det.start_ms, Some(120));
        assert_eq!(det.end_ms, Some(480));
    }

    #[test]
    fn test_merge_joins_finals_and_keeps_last_partial() {
        let a: AsrResponse = serde_json::from_str(
            r#"{"status":"ok","partial":{"text":"he"},"final":{"text":"hello","words":["hello"]}}"#,
        )
        .unwrap();
        let b: AsrResponse = serde_json::from_str(
            r#"{"status":"ok","partial":{"text":"wor"},"final":{"text":"world","words":["world"]},"detections":[{"label":"clean"}]}"#,
        )
        .unwrap();

        let merged = AsrResponse::merge(vec![a, b]).unwrap();
        assert!(merged.is_ok());
        assert_eq!(merged.partial.unwrap().text, "wor");
        let fin = merged.final_.unwrap();
        assert_eq!(fin.text, "hello world");
        assert_eq!(fin.words.len(), 2);
        assert_eq!(merged.detections.len(), 1);
    }

    #[test]
    fn test_merge_propagates_error_status() {
        let ok: AsrResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        let err: AsrResponse =
            serde_json::from_str(r#"{"status":"error","message":"decoder failed"}"#).unwrap();
        let merged = AsrResponse::merge(vec![ok, err]).unwrap();
        assert_eq!(merged.status, AsrStatus::Error);
        assert_eq!(merged.message.as_deref(), Some("decoder failed"));
        assert!(AsrResponse::merge(Vec::new()).is_none());
    }
}
