//! Per-session smoothing of raw moderation labels.
//!
//! Two toxic labels in a row flip CLEAN to TOXIC; three clean labels in a
//! row flip it back. Each label resets the opposite counter. Only
//! transitions are reported.

use guardian_types::{Detection, StableLabel};
use serde::Serialize;

pub const TOXIC_THRESHOLD: u32 = 2;
pub const CLEAN_THRESHOLD: u32 = 3;

/// Polarity of a single raw worker label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawLabel {
    Toxic,
    Clean,
}

impl RawLabel {
    /// Map a worker label. Unknown labels are ignored.
    pub fn classify(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "toxic" | "block" | "warn" | "offensive" => Some(Self::Toxic),
            "clean" | "safe" => Some(Self::Clean),
            _ => None,
        }
    }

    /// Reduce one response's detections to a single label.
    ///
    /// No detections counts as clean. Any toxic detection makes the whole
    /// response toxic and is returned as evidence.
    pub fn from_detections(detections: &[Detection]) -> Option<(Self, Option<&Detection>)> {
        if detections.is_empty() {
            return Some((Self::Clean, None));
        }
        if let Some(hit) =
            detections.iter().find(|d| Self::classify(&d.label) == Some(Self::Toxic))
        {
            return Some((Self::Toxic, Some(hit)));
        }
        detections
            .iter()
            .find(|d| Self::classify(&d.label) == Some(Self::Clean))
            .map(|d| (Self::Clean, Some(d)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetectionState {
    pub stable_label: StableLabel,
    pub consecutive_toxic_count: u32,
    pub consecutive_clean_count: u32,
}

#[derive(Debug, Clone)]
pub struct DetectionHysteresis {
    state: SessionDetectionState,
}

impl Default for DetectionHysteresis {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionHysteresis {
    pub const fn new() -> Self {
        Self {
            state: SessionDetectionState {
                stable_label: StableLabel::Clean,
                consecutive_toxic_count: 0,
                consecutive_clean_count: 0,
            },
        }
    }

    pub fn state(&self) -> SessionDetectionState {
        self.state
    }

    pub fn stable_label(&self) -> StableLabel {
        self.state.stable_label
    }

    /// Feed one label; returns the new stable label only on a transition.
    pub fn update(&mut self, label: RawLabel) -> Option<StableLabel> {
        let s = &mut self.state;
        match label {
            RawLabel::Toxic => {
                s.consecutive_toxic_count = s.consecutive_toxic_count.saturating_add(1);
                s.consecutive_clean_count = 0;
                if s.stable_label == StableLabel::Clean
                    && s.consecutive_toxic_count >= TOXIC_THRESHOLD
                {
                    s.stable_label = StableLabel::Toxic;
                    return Some(StableLabel::Toxic);
                }
            },
            RawLabel::Clean => {
                s.consecutive_clean_count = s.consecutive_clean_count.saturating_add(1);
                s.consecutive_toxic_count = 0;
                if s.stable_label == StableLabel::Toxic
                    && s.consecutive_clean_count >= CLEAN_THRESHOLD
                {
                    s.stable_label = StableLabel::Clean;
                    return Some(StableLabel::Clean);
                }
            },
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::RawLabel::{Clean, Toxic};

    fn run(labels: &[RawLabel]) -> Vec<StableLabel> {
        let mut h = DetectionHysteresis::new();
        labels.iter().filter_map(|l| h.update(*l)).collect()
    }

    fn det(label: &str) -> Detection {
        Detection { label: label.into(), score: None, start_ms: None, end_ms: None, snippet: None }
    }

    #[test]
    fn test_two_toxic_flip_once() {
        assert_eq!(run(&[Toxic, Toxic]), vec![StableLabel::Toxic]);
        assert_eq!(run(&[Toxic, Toxic, Toxic, Toxic]), vec![StableLabel::Toxic]);
    }

    #[test]
    fn test_interleaved_labels_never_flip() {
        assert!(run(&[Toxic, Clean, Toxic, Clean, Toxic]).is_empty());
    }

    #[test]
    fn test_three_clean_restore() {
        assert_eq!(
            run(&[Toxic, Toxic, Clean, Clean, Clean]),
            vec![StableLabel::Toxic, StableLabel::Clean]
        );
        assert_eq!(run(&[Toxic, Toxic, Clean, Clean, Toxic, Clean, Clean]), vec![StableLabel::Toxic]);
    }

    #[test]
    fn test_clean_in_clean_state_is_silent() {
        assert!(run(&[Clean, Clean, Clean, Clean]).is_empty());
        let mut h = DetectionHysteresis::new();
        h.update(Clean);
        h.update(Toxic);
        assert_eq!(h.state().consecutive_clean_count, 0);
        assert_eq!(h.state().consecutive_toxic_count, 1);
    }

    #[test]
    fn test_replaying_a_sequence_is_deterministic() {
        let sequence = [
            Toxic, Clean, Toxic, Toxic, Toxic, Clean, Clean, Toxic, Clean, Clean, Clean, Clean,
            Toxic, Toxic,
        ];
        let replay = || {
            let mut h = DetectionHysteresis::new();
            let events: Vec<StableLabel> = sequence.iter().filter_map(|l| h.update(*l)).collect();
            (events, h.state())
        };

        let (first_events, first_state) = replay();
        let (second_events, second_state) = replay();

        assert_eq!(
            first_events,
            vec![StableLabel::Toxic, StableLabel::Clean, StableLabel::Toxic]
        );
        assert_eq!(first_events, second_events);
        assert_eq!(first_state, second_state);
        assert_eq!(
            first_state,
            SessionDetectionState {
                stable_label: StableLabel::Toxic,
                consecutive_toxic_count: 2,
                consecutive_clean_count: 0,
            }
        );
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(RawLabel::classify("block"), Some(Toxic));
        assert_eq!(RawLabel::classify("WARN"), Some(Toxic));
        assert_eq!(RawLabel::classify("offensive"), Some(Toxic));
        assert_eq!(RawLabel::classify("safe"), Some(Clean));
        assert_eq!(RawLabel::classify("clean"), Some(Clean));
        assert_eq!(RawLabel::classify("music"), None);
    }

    #[test]
    fn test_response_reduction() {
        assert_eq!(RawLabel::from_detections(&[]).map(|(l, _)| l), Some(Clean));

        let mixed = [det("safe"), det("toxic"), det("music")];
        let (label, evidence) = RawLabel::from_detections(&mixed).unwrap();
        assert_eq!(label, Toxic);
        assert_eq!(evidence.unwrap().label, "toxic");

        assert!(RawLabel::from_detections(&[det("music")]).is_none());
    }
}
