use super::*;
use async_trait::async_trait;
use guardian_types::{
    AsrFinal, AsrResponse, AsrStatus, ModerationResponse, ModerationResult, StableLabel,
};
use parking_lot::Mutex as SyncMutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

#[derive(Default)]
struct ScriptedWorker {
    replies: SyncMutex<VecDeque<Result<AsrResponse, RelayError>>>,
    moderation: SyncMutex<VecDeque<Result<ModerationResponse, RelayError>>>,
    seen: SyncMutex<Vec<ForwardRequest>>,
    moderated: SyncMutex<Vec<String>>,
    first_call: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedWorker {
    fn with_replies(replies: Vec<Result<AsrResponse, RelayError>>) -> Self {
        Self { replies: SyncMutex::new(replies.into()), ..Self::default() }
    }

    fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl SpeechWorker for ScriptedWorker {
    async fn forward(&self, request: ForwardRequest) -> Result<AsrResponse, RelayError> {
        let first = {
            let mut seen = self.seen.lock();
            seen.push(request);
            seen.len() == 1
        };
        if let (true, Some((started, release))) = (first, &self.first_call) {
            started.notify_one();
            release.notified().await;
        }
        let reply = self.replies.lock().pop_front();
        reply.unwrap_or_else(|| Ok(transcript("", &[])))
    }

    async fn moderate(&self, texts: Vec<String>) -> Result<ModerationResponse, RelayError> {
        self.moderated.lock().extend(texts);
        let reply = self.moderation.lock().pop_front();
        reply.unwrap_or_else(|| {
            Ok(ModerationResponse {
                results: vec![ModerationResult { label: "safe".into(), score: 0.99 }],
            })
        })
    }

    async fn health_check(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

fn transcript(text: &str, labels: &[&str]) -> AsrResponse {
    AsrResponse {
        status: AsrStatus::Ok,
        partial: None,
        final_: Some(AsrFinal { text: text.into(), words: vec![] }),
        detections: labels
            .iter()
            .map(|l| Detection {
                label: (*l).into(),
                score: Some(0.9),
                start_ms: Some(0),
                end_ms: Some(400),
                snippet: Some(format!("[{l}]")),
            })
            .collect(),
        message: None,
    }
}

struct Harness {
    relay: Arc<AudioSessionRelay>,
    worker: Arc<ScriptedWorker>,
    breakers: Arc<CircuitBreakerRegistry>,
    events: mpsc::Receiver<ClientEvent>,
}

fn harness_with(worker: ScriptedWorker, config: RelayConfig) -> Harness {
    let worker = Arc::new(worker);
    let breakers = Arc::new(CircuitBreakerRegistry::default());
    let (tx, events) = mpsc::channel(64);
    let relay = Arc::new(AudioSessionRelay::new(
        "session-1",
        Arc::clone(&breakers),
        Arc::clone(&worker) as Arc<dyn SpeechWorker>,
        config,
        tx,
    ));
    Harness { relay, worker, breakers, events }
}

fn harness(worker: ScriptedWorker) -> Harness {
    harness_with(worker, RelayConfig { moderate_transcripts: false, ..RelayConfig::default() })
}

fn drain(rx: &mut mpsc::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn detections(events: &[ClientEvent]) -> Vec<StableLabel> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Detection(n) => Some(n.label),
            _ => None,
        })
        .collect()
}

fn frame() -> Bytes {
    Bytes::from(vec![0u8; 3200])
}

#[tokio::test]
async fn test_two_toxic_chunks_emit_single_detection() {
    let mut h = harness(ScriptedWorker::with_replies(vec![
        Ok(transcript("one", &["toxic"])),
        Ok(transcript("two", &["toxic"])),
        Ok(transcript("three", &["toxic"])),
    ]));

    for _ in 0..3 {
        assert_eq!(h.relay.handle_frame(frame()).await, FrameOutcome::Forwarded);
    }

    let events = drain(&mut h.events);
    assert_eq!(detections(&events), vec![StableLabel::Toxic]);
    let finals: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Final { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(finals, vec!["one", "two", "three"]);

    match events.iter().find(|e| matches!(e, ClientEvent::Detection(_))) {
        Some(ClientEvent::Detection(notice)) => {
            assert_eq!(notice.snippet.as_deref(), Some("[toxic]"));
            assert_eq!(notice.end_ms, Some(400));
        },
        other => panic!("expected detection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_detections_count_as_clean() {
    let mut h = harness(ScriptedWorker::with_replies(vec![
        Ok(transcript("a", &["block"])),
        Ok(transcript("b", &["warn"])),
        Ok(transcript("c", &[])),
        Ok(transcript("d", &[])),
        Ok(transcript("e", &[])),
    ]));

    for _ in 0..5 {
        h.relay.handle_frame(frame()).await;
    }

    assert_eq!(detections(&drain(&mut h.events)), vec![StableLabel::Toxic, StableLabel::Clean]);
    assert_eq!(h.relay.detection_state().unwrap().stable_label, StableLabel::Clean);
}

#[tokio::test]
async fn test_worker_error_becomes_error_event_and_session_survives() {
    let mut h = harness(ScriptedWorker::with_replies(vec![
        Err(RelayError::WorkerRejected { message: "decoder failed".into() }),
        Ok(transcript("back", &[])),
    ]));

    assert_eq!(h.relay.handle_frame(frame()).await, FrameOutcome::Failed);
    assert_eq!(h.relay.handle_frame(frame()).await, FrameOutcome::Forwarded);

    let events = drain(&mut h.events);
    assert!(matches!(&events[0], ClientEvent::Error { message } if message.contains("decoder failed")));
    assert!(matches!(&events[1], ClientEvent::Final { text, .. } if text == "back"));
}

#[tokio::test]
async fn test_open_circuit_fails_fast_without_worker_call() {
    let mut h = harness(ScriptedWorker::default());
    h.breakers.force_trip(operations::FORWARD_AUDIO, "maintenance");

    assert_eq!(h.relay.handle_frame(frame()).await, FrameOutcome::Failed);
    assert_eq!(h.worker.calls(), 0);

    let events = drain(&mut h.events);
    assert_eq!(events.len(), 1);
    assert!(
        matches!(&events[0], ClientEvent::Error { message } if message.contains("temporarily unavailable"))
    );
}

#[tokio::test]
async fn test_empty_and_oversized_frames_are_not_forwarded() {
    let mut h = harness_with(
        ScriptedWorker::default(),
        RelayConfig { max_frame_bytes: 4096, moderate_transcripts: false, ..RelayConfig::default() },
    );

    assert_eq!(h.relay.handle_frame(Bytes::new()).await, FrameOutcome::Skipped);
    assert_eq!(h.relay.handle_frame(Bytes::from(vec![1u8; 5000])).await, FrameOutcome::Rejected);
    assert_eq!(h.worker.calls(), 0);
    assert_eq!(h.relay.backlog(), 0);

    let events = drain(&mut h.events);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ClientEvent::Error { message } if message.contains("5000")));
}

#[tokio::test]
async fn test_transcript_moderation_fills_missing_detections() {
    let worker = ScriptedWorker {
        replies: SyncMutex::new(
            vec![Ok(transcript("bad words", &[])), Ok(transcript("more bad words", &[]))].into(),
        ),
        moderation: SyncMutex::new(
            vec![
                Ok(ModerationResponse {
                    results: vec![ModerationResult { label: "block".into(), score: 0.93 }],
                }),
                Ok(ModerationResponse {
                    results: vec![ModerationResult { label: "warn".into(), score: 0.71 }],
                }),
            ]
            .into(),
        ),
        ..ScriptedWorker::default()
    };
    let mut h = harness_with(worker, RelayConfig::default());

    h.relay.handle_frame(frame()).await;
    h.relay.handle_frame(frame()).await;

    assert_eq!(h.worker.moderated.lock().clone(), vec!["bad words", "more bad words"]);
    let events = drain(&mut h.events);
    match events.last() {
        Some(ClientEvent::Detection(notice)) => {
            assert_eq!(notice.label, StableLabel::Toxic);
            assert_eq!(notice.score, Some(0.71));
            assert_eq!(notice.snippet.as_deref(), Some("more bad words"));
        },
        other => panic!("expected detection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_moderation_failure_leaves_chunk_unlabeled() {
    let worker = ScriptedWorker {
        replies: SyncMutex::new(
            vec![Ok(transcript("x", &["toxic"])), Ok(transcript("y", &[])), Ok(transcript("z", &["toxic"]))]
                .into(),
        ),
        moderation: SyncMutex::new(
            vec![Err(RelayError::UpstreamStatus { code: 400, body: String::new() })].into(),
        ),
        ..ScriptedWorker::default()
    };
    let mut h = harness_with(worker, RelayConfig::default());

    for _ in 0..3 {
        h.relay.handle_frame(frame()).await;
    }

    // The failed moderation did not reset the toxic streak.
    assert_eq!(detections(&drain(&mut h.events)), vec![StableLabel::Toxic]);
}

#[tokio::test]
async fn test_pipeline_preserves_order_and_reports_backlog() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let worker = ScriptedWorker {
        replies: SyncMutex::new(
            vec![Ok(transcript("f1", &[])), Ok(transcript("f2", &[])), Ok(transcript("f3", &[]))]
                .into(),
        ),
        first_call: Some((Arc::clone(&started), Arc::clone(&release))),
        ..ScriptedWorker::default()
    };
    let mut h = harness(worker);
    let (sender, pipeline) = h.relay.spawn_pipeline(8);

    assert_eq!(sender.send(frame()).await, FrameOutcome::Queued);
    started.notified().await;
    sender.send(frame()).await;
    sender.send(frame()).await;
    assert_eq!(h.relay.backlog(), 2);

    release.notify_one();
    drop(sender);
    pipeline.await.unwrap();

    let backlogs: Vec<usize> = h.worker.seen.lock().iter().map(|r| r.backlog).collect();
    assert_eq!(backlogs, vec![0, 1, 0]);

    let finals: Vec<String> = drain(&mut h.events)
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::Final { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(finals, vec!["f1", "f2", "f3"]);
}

#[tokio::test]
async fn test_closed_client_channel_is_tolerated() {
    let mut h = harness(ScriptedWorker::with_replies(vec![Ok(transcript("late", &["toxic"]))]));
    h.events.close();
    assert_eq!(h.relay.handle_frame(frame()).await, FrameOutcome::Forwarded);
}

#[tokio::test]
async fn test_repeated_worker_failures_trip_forward_breaker() {
    let failures = (0..5).map(|_| Err(RelayError::Timeout { after_ms: 5_000 })).collect();
    let mut h = harness(ScriptedWorker::with_replies(failures));

    for _ in 0..6 {
        h.relay.handle_frame(frame()).await;
    }

    assert_eq!(h.worker.calls(), 5);
    assert_eq!(h.breakers.get_state(operations::FORWARD_AUDIO), guardian_types::CircuitState::Open);
    assert_eq!(drain(&mut h.events).len(), 6);
}

#[tokio::test]
async fn test_cancelled_frame_does_not_inflate_backlog() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let worker = ScriptedWorker {
        first_call: Some((Arc::clone(&started), Arc::clone(&release))),
        ..ScriptedWorker::default()
    };
    let h = harness(worker);

    let relay = Arc::clone(&h.relay);
    let first = tokio::spawn(async move { relay.handle_frame(frame()).await });
    started.notified().await;

    let relay = Arc::clone(&h.relay);
    let waiting = tokio::spawn(async move { relay.handle_frame(frame()).await });
    while h.relay.backlog() == 0 {
        tokio::task::yield_now().await;
    }
    waiting.abort();
    assert!(waiting.await.unwrap_err().is_cancelled());
    assert_eq!(h.relay.backlog(), 0);

    release.notify_one();
    assert_eq!(first.await.unwrap(), FrameOutcome::Forwarded);
    assert_eq!(h.relay.handle_frame(frame()).await, FrameOutcome::Forwarded);

    let backlogs: Vec<usize> = h.worker.seen.lock().iter().map(|r| r.backlog).collect();
    assert_eq!(backlogs, vec![0, 0]);
}

#[tokio::test]
async fn test_concurrent_frames_on_one_session() {
    let mut h = harness(ScriptedWorker::default());

    let calls = (0..20).map(|_| h.relay.handle_frame(frame()));
    let outcomes = futures::future::join_all(calls).await;

    assert!(outcomes.iter().all(|o| *o == FrameOutcome::Forwarded));
    assert_eq!(h.relay.backlog(), 0);
    assert_eq!(h.worker.calls(), 20);
    assert!(h.worker.seen.lock().iter().all(|r| r.backlog < 20));

    let events = drain(&mut h.events);
    assert_eq!(events.iter().filter(|e| matches!(e, ClientEvent::Final { .. })).count(), 20);
    assert!(!events.iter().any(|e| matches!(e, ClientEvent::Error { .. })));
}
