//! WebSocket event streaming.
//!
//! Clients open a socket and send one subscribe frame:
//! `{"scope":"all"}` or `{"scope":"job","job_id":"..."}`. The server
//! replies with `snapshot` events for the current state, then forwards
//! live events from the matching topic. Delivery is at-least-once; a
//! client that falls behind the channel capacity is disconnected and has
//! to resubscribe for a fresh snapshot.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use mediaq_models::{JobEvent, JobId};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
enum SubscribeFrame {
    All,
    Job { job_id: String },
}

#[derive(serde::Serialize)]
struct WsError {
    error: String,
}

/// WebSocket subscribe endpoint.
pub async fn ws_events(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // First frame picks the topic.
    let frame: SubscribeFrame = match receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                send_error(&mut sender, format!("invalid subscribe frame: {e}")).await;
                return;
            }
        },
        _ => {
            send_error(&mut sender, "expected a JSON subscribe frame").await;
            return;
        }
    };

    let (snapshots, rx) = match frame {
        SubscribeFrame::All => {
            let (jobs, rx) = state.registry.subscribe_all().await;
            info!(jobs = jobs.len(), "WebSocket subscribed to all jobs");
            (jobs, rx)
        }
        SubscribeFrame::Job { job_id } => {
            let id = JobId::from_string(job_id);
            match state.registry.subscribe_job(&id).await {
                Ok((job, rx)) => {
                    info!(job_id = %id, "WebSocket subscribed to job");
                    (vec![job], rx)
                }
                Err(e) => {
                    send_error(&mut sender, e.to_string()).await;
                    return;
                }
            }
        }
    };

    // Current state first, deltas after.
    for job in snapshots {
        if !send_event(&mut sender, &JobEvent::snapshot(job)).await {
            return;
        }
    }

    stream_events(sender, receiver, rx).await;
}

async fn stream_events(
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<JobEvent>,
) {
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if !send_event(&mut sender, &event).await {
                            debug!("WebSocket send failed, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // The client has missed events; close so it comes
                        // back for a fresh snapshot.
                        warn!(skipped, "WebSocket subscriber lagged, dropping");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            client_msg = receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client closed WebSocket");
                        break;
                    }
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &JobEvent,
) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize event");
            true
        }
    }
}

async fn send_error(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    error: impl Into<String>,
) {
    let frame = WsError { error: error.into() };
    if let Ok(json) = serde_json::to_string(&frame) {
        let _ = sender.send(Message::Text(json)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame_parsing() {
        let all: SubscribeFrame = serde_json::from_str(r#"{"scope":"all"}"#).unwrap();
        assert!(matches!(all, SubscribeFrame::All));

        let job: SubscribeFrame =
            serde_json::from_str(r#"{"scope":"job","job_id":"abc-123"}"#).unwrap();
        match job {
            SubscribeFrame::Job { job_id } => assert_eq!(job_id, "abc-123"),
            other => panic!("unexpected frame {other:?}"),
        }

        assert!(serde_json::from_str::<SubscribeFrame>(r#"{"scope":"bogus"}"#).is_err());
    }
}
