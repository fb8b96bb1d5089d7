//! WebSocket viewer stream

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use stream::{StreamEvent, ViewerCommand};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::AppState;

/// Replies queued for a single viewer
const REPLY_BUFFER_SIZE: usize = 8;

/// Upgrade a viewer connection to a WebSocket
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer(socket, state))
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &StreamEvent,
) -> Result<(), axum::Error> {
    match event.to_json() {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            warn!("Dropping {} event: {}", event.name(), e);
            Ok(())
        }
    }
}

/// Forward broadcast events to the viewer and answer its commands
async fn handle_viewer(socket: WebSocket, state: Arc<AppState>) {
    let publisher = state.controller.publisher().clone();
    let (mut sender, mut receiver) = socket.split();
    let mut events = publisher.subscribe();
    info!("Viewer connected ({} viewers)", publisher.viewer_count());

    if send_event(&mut sender, &StreamEvent::connection()).await.is_err() {
        debug!("Viewer left before the greeting was sent");
        return;
    }

    let (reply_tx, mut reply_rx) = mpsc::channel::<StreamEvent>(REPLY_BUFFER_SIZE);

    let mut send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                broadcast = events.next() => match broadcast {
                    Ok(event) => event,
                    Err(_) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(event) => event,
                    None => break,
                },
            };
            if let Err(e) = send_event(&mut sender, &event).await {
                debug!("Viewer send failed: {}", e);
                break;
            }
        }
    });

    let command_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    if let Some(reply) = handle_command(&command_state, &text).await {
                        if reply_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let send_finished = tokio::select! {
        _ = &mut send_task => true,
        _ = &mut recv_task => false,
    };
    if send_finished {
        recv_task.abort();
        let _ = recv_task.await;
    } else {
        send_task.abort();
        let _ = send_task.await;
    }

    info!("Viewer disconnected ({} viewers)", publisher.viewer_count());
}

/// Reply for one viewer command, `None` for messages that are ignored
async fn handle_command(state: &AppState, text: &str) -> Option<StreamEvent> {
    let command = match serde_json::from_str::<ViewerCommand>(text) {
        Ok(command) => command,
        Err(e) => {
            warn!("Ignoring viewer message: {}", e);
            return None;
        }
    };
    debug!("Viewer command: {:?}", command);

    let reply = match command {
        ViewerCommand::Ping => StreamEvent::pong(),
        ViewerCommand::StartTracking => match state.controller.start().await {
            Ok(session) => StreamEvent::Session {
                running: true,
                message: format!("Eye tracking started (session {})", session.id),
            },
            Err(e) => StreamEvent::Error {
                message: e.to_string(),
            },
        },
        ViewerCommand::StopTracking => match state.controller.stop().await {
            Ok(summary) => StreamEvent::Session {
                running: false,
                message: format!(
                    "Eye tracking stopped after {} cheating attempts",
                    summary.cheating_attempts
                ),
            },
            Err(e) => StreamEvent::Error {
                message: e.to_string(),
            },
        },
    };
    Some(reply)
}
