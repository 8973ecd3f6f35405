//! Per-connection audio relay.
//!
//! Each session owns its hysteresis state and an outbound event channel.
//! Frames are processed one at a time behind a fair async mutex so events
//! follow submission order; the number of frames still waiting is passed to
//! the chunk planner as the backlog hint.

#[cfg(test)]
mod tests;

use bytes::Bytes;
use guardian_types::{
    operations, ClientEvent, Detection, DetectionNotice, RelayConfig, RelayError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::circuit_breaker::CircuitBreakerRegistry;
use super::hysteresis::{DetectionHysteresis, RawLabel, SessionDetectionState};
use super::prometheus;
use super::worker::{ForwardRequest, SpeechWorker};

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Empty frame, nothing to do
    Skipped,
    /// Refused before forwarding (oversized)
    Rejected,
    /// Handed to the session pipeline
    Queued,
    /// Worker answered; transcript events emitted
    Forwarded,
    /// Breaker or worker error, reported as an `error` event
    Failed,
}

pub struct AudioSessionRelay {
    session_id: String,
    breakers: Arc<CircuitBreakerRegistry>,
    worker: Arc<dyn SpeechWorker>,
    config: RelayConfig,
    events: mpsc::Sender<ClientEvent>,
    detection: Mutex<DetectionHysteresis>,
    pending: AtomicUsize,
}

impl std::fmt::Debug for AudioSessionRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSessionRelay")
            .field("session_id", &self.session_id)
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Drop for AudioSessionRelay {
    fn drop(&mut self) {
        prometheus::session_closed();
        debug!(session_id = %self.session_id, "Audio session closed");
    }
}

impl AudioSessionRelay {
    pub fn new(
        session_id: impl Into<String>,
        breakers: Arc<CircuitBreakerRegistry>,
        worker: Arc<dyn SpeechWorker>,
        config: RelayConfig,
        events: mpsc::Sender<ClientEvent>,
    ) -> Self {
        let session_id = session_id.into();
        prometheus::session_opened();
        info!(session_id = %session_id, "Audio session opened");
        Self {
            session_id,
            breakers,
            worker,
            config,
            events,
            detection: Mutex::new(DetectionHysteresis::new()),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Frames submitted but not yet being forwarded.
    pub fn backlog(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Current smoothing state, or `None` while a frame is in flight.
    pub fn detection_state(&self) -> Option<SessionDetectionState> {
        self.detection.try_lock().ok().map(|h| h.state())
    }

    /// Forward one frame and emit the resulting events.
    ///
    /// Never fails: every error becomes an `error` event and the session
    /// stays usable. Safe to call concurrently.
    pub async fn handle_frame(&self, frame: Bytes) -> FrameOutcome {
        if let Some(outcome) = self.screen(&frame).await {
            return outcome;
        }
        let pending = PendingFrame::enter(&self.pending);
        self.process(frame, pending).await
    }

    /// Spawn an ordered pipeline for this session.
    ///
    /// Frames pushed through the returned [`FrameSender`] are processed in
    /// order by one task; the task ends when every sender is dropped.
    pub fn spawn_pipeline(
        self: &Arc<Self>,
        capacity: usize,
    ) -> (FrameSender, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Bytes>(capacity.max(1));
        let relay = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                relay.process(frame, PendingFrame::queued(&relay.pending)).await;
            }
            debug!(session_id = %relay.session_id, "Frame pipeline drained");
        });
        (FrameSender { relay: Arc::clone(self), tx }, handle)
    }

    async fn screen(&self, frame: &Bytes) -> Option<FrameOutcome> {
        if frame.is_empty() {
            debug!(session_id = %self.session_id, "Skipping empty frame");
            return Some(FrameOutcome::Skipped);
        }
        if frame.len() > self.config.max_frame_bytes {
            let err = RelayError::InvalidFrame {
                message: format!(
                    "frame of {} bytes exceeds limit of {} bytes",
                    frame.len(),
                    self.config.max_frame_bytes
                ),
            };
            warn!(session_id = %self.session_id, bytes = frame.len(), "Rejecting oversized frame");
            self.emit(ClientEvent::error(err.client_message())).await;
            return Some(FrameOutcome::Rejected);
        }
        None
    }

    async fn process(&self, frame: Bytes, pending: PendingFrame<'_>) -> FrameOutcome {
        let mut hysteresis = self.detection.lock().await;
        let backlog = pending.start();

        let request = ForwardRequest { session_id: self.session_id.clone(), audio: frame, backlog };
        let worker = Arc::clone(&self.worker);
        let result = self
            .breakers
            .execute_call(operations::FORWARD_AUDIO, move || async move {
                worker.forward(request).await
            })
            .await;

        match result {
            Ok(response) => {
                if let Some(partial) = response.partial {
                    self.emit(ClientEvent::Partial { text: partial.text }).await;
                }
                let final_text = response.final_.as_ref().map(|f| f.text.clone());
                if let Some(fin) = response.final_ {
                    self.emit(ClientEvent::Final { text: fin.text, words: fin.words }).await;
                }

                let label = match final_text {
                    Some(text)
                        if response.detections.is_empty()
                            && self.config.moderate_transcripts
                            && !text.trim().is_empty() =>
                    {
                        self.moderate(text).await
                    },
                    _ => RawLabel::from_detections(&response.detections)
                        .map(|(label, evidence)| (label, evidence.cloned())),
                };

                if let Some((label, evidence)) = label {
                    if let Some(stable) = hysteresis.update(label) {
                        info!(session_id = %self.session_id, label = %stable, "Moderation label changed");
                        prometheus::record_detection(stable);
                        let notice = DetectionNotice::new(stable, evidence.as_ref());
                        self.emit(ClientEvent::Detection(notice)).await;
                    }
                }
                FrameOutcome::Forwarded
            },
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    kind = err.kind(),
                    error = %err,
                    "Audio forward failed"
                );
                self.emit(ClientEvent::error(err.client_message())).await;
                FrameOutcome::Failed
            },
        }
    }

    /// Classify a final transcript that came back without detections.
    /// Failures leave the chunk unlabeled.
    async fn moderate(&self, text: String) -> Option<(RawLabel, Option<Detection>)> {
        let worker = Arc::clone(&self.worker);
        let inputs = vec![text.clone()];
        let result = self
            .breakers
            .execute_call(operations::PROCESS_MODERATION, move || async move {
                worker.moderate(inputs).await
            })
            .await;

        match result {
            Ok(response) => {
                let first = response.results.into_iter().next()?;
                let label = RawLabel::classify(&first.label)?;
                Some((
                    label,
                    Some(Detection {
                        label: first.label,
                        score: Some(first.score),
                        start_ms: None,
                        end_ms: None,
                        snippet: Some(text),
                    }),
                ))
            },
            Err(err) => {
                warn!(session_id = %self.session_id, error = %err, "Transcript moderation failed");
                None
            },
        }
    }

    async fn emit(&self, event: ClientEvent) {
        let name = event.name();
        if self.events.send(event).await.is_err() {
            debug!(session_id = %self.session_id, event = name, "Client gone, dropping event");
        }
    }
}

/// Ordered entry point into a session pipeline.
#[derive(Debug, Clone)]
pub struct FrameSender {
    relay: Arc<AudioSessionRelay>,
    tx: mpsc::Sender<Bytes>,
}

impl FrameSender {
    /// Queue a frame. Waits when the pipeline is full.
    pub async fn send(&self, frame: Bytes) -> FrameOutcome {
        if let Some(outcome) = self.relay.screen(&frame).await {
            return outcome;
        }
        let pending = PendingFrame::enter(&self.relay.pending);
        if self.tx.send(frame).await.is_err() {
            return FrameOutcome::Skipped;
        }
        // The pipeline task takes over the count.
        pending.hand_off();
        FrameOutcome::Queued
    }
}

/// One frame counted in a session's `pending` total.
///
/// Dropping it before [`PendingFrame::start`] or [`PendingFrame::hand_off`]
/// uncounts the frame, so a cancelled submission never inflates the backlog.
struct PendingFrame<'a> {
    pending: &'a AtomicUsize,
    armed: bool,
}

impl<'a> PendingFrame<'a> {
    fn enter(pending: &'a AtomicUsize) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        Self { pending, armed: true }
    }

    /// A frame already counted by [`FrameSender::send`].
    fn queued(pending: &'a AtomicUsize) -> Self {
        Self { pending, armed: true }
    }

    /// Frame is about to be forwarded. Returns the frames still waiting behind it.
    fn start(mut self) -> usize {
        self.armed = false;
        self.pending.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }

    fn hand_off(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingFrame<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
