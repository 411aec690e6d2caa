//! Live tally WebSocket
//!
//! Clients connect to `/ws` and join poll rooms. Every join gets an `ack`, the
//! current tallies and then one `vote-update` per committed vote.

use crate::domain::entities::TallySnapshot;
use crate::domain::repository::PollRepository;
use crate::domain::value_objects::PollId;
use crate::presentation::dto::TallyResponse;
use crate::presentation::handlers::PollAppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Messages sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join { poll_id: String },
    Leave { poll_id: String },
    Ping,
}

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Ack { action: &'static str, poll_id: String },
    VoteUpdate(TallyResponse),
    Error { message: String },
    Pong,
}

impl ServerMessage {
    fn to_frame(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode server message");
                None
            }
        }
    }
}

/// GET /api/polls/ws
pub async fn ws_handler<R>(
    ws: WebSocketUpgrade,
    State(state): State<PollAppState<R>>,
) -> impl IntoResponse
where
    R: PollRepository + Send + Sync + 'static,
{
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket<R>(socket: WebSocket, state: PollAppState<R>)
where
    R: PollRepository + Send + Sync + 'static,
{
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(ws_sender));
    let mut forwarders: HashMap<PollId, JoinHandle<()>> = HashMap::new();

    tracing::debug!("Observer connected");

    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket receive error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                handle_text_message(text.as_str(), &state, &mut forwarders, &ws_sender).await;
            }
            Message::Ping(data) => {
                let _ = ws_sender.lock().await.send(Message::Pong(data)).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    for (_, handle) in forwarders.drain() {
        handle.abort();
    }
    state.hub.prune();
    tracing::debug!("Observer disconnected");
}

async fn handle_text_message<R>(
    text: &str,
    state: &PollAppState<R>,
    forwarders: &mut HashMap<PollId, JoinHandle<()>>,
    ws_sender: &WsSender,
) where
    R: PollRepository + Send + Sync + 'static,
{
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            send(
                ws_sender,
                &ServerMessage::Error {
                    message: format!("Invalid message: {e}"),
                },
            )
            .await;
            return;
        }
    };

    match client_msg {
        ClientMessage::Join { poll_id } => {
            let poll_id = match PollId::parse(&poll_id) {
                Ok(id) => id,
                Err(e) => {
                    send(ws_sender, &ServerMessage::Error { message: e.to_string() }).await;
                    return;
                }
            };
            if let Some(handle) = forwarders.remove(&poll_id) {
                handle.abort();
            }

            // Subscribe before reading so no commit falls between the two
            let rx = state.hub.subscribe(&poll_id);
            let current = match state.repo.get_by_id(&poll_id).await {
                Ok(Some(poll)) => poll.snapshot(),
                Ok(None) => {
                    send(
                        ws_sender,
                        &ServerMessage::Error {
                            message: "Poll not found".to_string(),
                        },
                    )
                    .await;
                    return;
                }
                Err(e) => {
                    tracing::error!(poll_id = %poll_id, error = %e, "Failed to load poll for observer");
                    send(
                        ws_sender,
                        &ServerMessage::Error {
                            message: "Internal server error".to_string(),
                        },
                    )
                    .await;
                    return;
                }
            };

            send(
                ws_sender,
                &ServerMessage::Ack {
                    action: "join",
                    poll_id: poll_id.to_string(),
                },
            )
            .await;
            let last_sent = current.total_votes;
            send(ws_sender, &ServerMessage::VoteUpdate(current.into())).await;

            let handle = tokio::spawn(forward_tallies(rx, ws_sender.clone(), last_sent));
            forwarders.insert(poll_id.clone(), handle);
            tracing::debug!(poll_id = %poll_id, "Observer joined");
        }
        ClientMessage::Leave { poll_id } => {
            let left = PollId::parse(&poll_id)
                .ok()
                .and_then(|id| forwarders.remove(&id));
            let reply = match left {
                Some(handle) => {
                    handle.abort();
                    ServerMessage::Ack {
                        action: "leave",
                        poll_id,
                    }
                }
                None => ServerMessage::Error {
                    message: format!("Not joined to {poll_id}"),
                },
            };
            send(ws_sender, &reply).await;
        }
        ClientMessage::Ping => send(ws_sender, &ServerMessage::Pong).await,
    }
}

/// Forward room snapshots that are newer than the last one sent
async fn forward_tallies(
    mut rx: broadcast::Receiver<TallySnapshot>,
    ws_sender: WsSender,
    mut last_sent: i64,
) {
    loop {
        match rx.recv().await {
            Ok(snapshot) => {
                // total_votes only grows, so older snapshots are stale
                if snapshot.total_votes <= last_sent {
                    continue;
                }
                last_sent = snapshot.total_votes;
                let Some(frame) = ServerMessage::VoteUpdate(snapshot.into()).to_frame() else {
                    continue;
                };
                if ws_sender.lock().await.send(frame).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Observer lagged, dropped tally updates");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn send(ws_sender: &WsSender, msg: &ServerMessage) {
    if let Some(frame) = msg.to_frame() {
        let _ = ws_sender.lock().await.send(frame).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PollOption;
    use serde_json::json;

    #[test]
    fn test_client_message_parsing() {
        let join: ClientMessage =
            serde_json::from_value(json!({"type": "join", "pollId": "a1b2c3d4"})).unwrap();
        assert_eq!(
            join,
            ClientMessage::Join {
                poll_id: "a1b2c3d4".to_string()
            }
        );

        let ping: ClientMessage = serde_json::from_value(json!({"type": "ping"})).unwrap();
        assert_eq!(ping, ClientMessage::Ping);

        assert!(serde_json::from_value::<ClientMessage>(json!({"type": "vote"})).is_err());
    }

    #[test]
    fn test_vote_update_shape() {
        let snapshot = TallySnapshot {
            poll_id: PollId::parse("a1b2c3d4").unwrap(),
            options: vec![
                PollOption {
                    text: "Yes".to_string(),
                    votes: 2,
                },
                PollOption {
                    text: "No".to_string(),
                    votes: 1,
                },
            ],
            total_votes: 3,
        };
        let value = serde_json::to_value(ServerMessage::VoteUpdate(snapshot.into())).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "vote-update",
                "pollId": "a1b2c3d4",
                "options": [{"text": "Yes", "votes": 2}, {"text": "No", "votes": 1}],
                "totalVotes": 3,
            })
        );
    }

    #[test]
    fn test_ack_shape() {
        let value = serde_json::to_value(ServerMessage::Ack {
            action: "join",
            poll_id: "a1b2c3d4".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "ack", "action": "join", "pollId": "a1b2c3d4"}));
        assert_eq!(
            serde_json::to_value(ServerMessage::Pong).unwrap(),
            json!({"type": "pong"})
        );
    }
}
