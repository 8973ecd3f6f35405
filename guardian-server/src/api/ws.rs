//! `GET /ws/audio` - one audio session per WebSocket.
//!
//! Binary messages are audio frames, fed in order through the session
//! pipeline. Client events and breaker transitions go back as JSON text.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use guardian_core::AudioSessionRelay;
use guardian_types::ClientEvent;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AudioQuery {
    pub session_id: Option<String>,
}

/// Use the caller's session id, or mint one.
pub fn resolve_session_id(requested: Option<String>) -> String {
    requested
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn audio_socket(
    ws: WebSocketUpgrade,
    Query(query): Query<AudioQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let session_id = resolve_session_id(query.session_id);
    ws.on_upgrade(move |socket| run_session(socket, state, session_id))
}

async fn run_session(socket: WebSocket, state: AppState, session_id: String) {
    let _tracked = state.track_session();
    let relay_config = state.config().relay.clone();
    let capacity = relay_config.event_channel_capacity;

    let (mut sink, mut stream) = socket.split();
    let (events_tx, mut events_rx) = mpsc::channel::<ClientEvent>(capacity);
    let control_tx = events_tx.clone();

    let relay = Arc::new(AudioSessionRelay::new(
        session_id.clone(),
        state.breakers(),
        state.speech_worker(),
        relay_config,
        events_tx,
    ));
    let (frames, pipeline) = relay.spawn_pipeline(capacity);
    drop(relay);

    let mut transitions = state.transitions().subscribe();
    let writer_session = session_id.clone();
    let writer = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                transition = transitions.recv() => match transition {
                    Ok(event) => ClientEvent::StateChange(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(session_id = %writer_session, skipped, "Transition feed lagged");
                        continue;
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(session_id = %writer_session, error = %e, "Failed to encode client event");
                    continue;
                },
            };
            if sink.send(Message::Text(text)).await.is_err() {
                debug!(session_id = %writer_session, "Client socket closed while sending");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(data)) => {
                frames.send(Bytes::from(data)).await;
            },
            Ok(Message::Text(_)) => {
                let _ = control_tx
                    .send(ClientEvent::error("Expected binary audio frames"))
                    .await;
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => {},
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            },
        }
    }

    // Client is gone: results still in flight are dropped.
    drop(frames);
    drop(control_tx);
    pipeline.abort();
    let _ = pipeline.await;
    let _ = writer.await;
    info!(session_id = %session_id, "Audio WebSocket closed");
}
