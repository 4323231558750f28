pub mod handlers;
mod host;
mod player;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{PlayerId, Role};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub role: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: role={:?}", params.role);

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

fn parse_role(role: Option<&str>) -> Role {
    match role {
        Some("host") => Role::Host,
        Some("observer") => Role::Observer,
        _ => Role::Player,
    }
}

/// Serialize and send; returns false once the socket is gone
async fn send_msg(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let role = parse_role(params.role.as_deref());
    let mut bound: Option<PlayerId> = None;

    tracing::info!("WebSocket connected with role: {:?}", role);

    // Subscribe before the welcome snapshot so no delta falls in between;
    // replicas drop anything the snapshot already covers
    let mut broadcast_rx = state.broadcast.subscribe();
    let mut timer_rx = state.timer_broadcast.subscribe();
    let mut nickname_rx = state.nicknames.read().await.subscribe();
    let mut score_rx = state.scores.read().await.subscribe();
    // Opened once the connection binds to a player
    let mut outbox_rx: Option<tokio::sync::mpsc::UnboundedReceiver<ServerMessage>> = None;

    let welcome = state.welcome(role).await;
    if !send_msg(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    loop {
        tokio::select! {
            // Phase, question, leaderboard and registry messages
            msg = next_broadcast(&mut broadcast_rx, &state, role) => match msg {
                Some(msg) => {
                    if !send_msg(&mut sender, &msg).await {
                        break;
                    }
                }
                None => break,
            },

            // Timer snapshots; a lagged receiver just waits for the next tick
            msg = timer_rx.recv() => {
                if let Ok(msg) = msg {
                    if !send_msg(&mut sender, &msg).await {
                        break;
                    }
                }
            }

            // Per-player reveals
            msg = async {
                match &mut outbox_rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => match msg {
                Some(msg) => {
                    if !send_msg(&mut sender, &msg).await {
                        break;
                    }
                }
                // Detached on leave
                None => outbox_rx = None,
            },

            delta = nickname_rx.recv() => {
                let msg = match delta {
                    Ok(delta) => ServerMessage::NicknameChanged { delta },
                    Err(RecvError::Lagged(_)) => resync(&state).await,
                    Err(RecvError::Closed) => break,
                };
                if !send_msg(&mut sender, &msg).await {
                    break;
                }
            }

            delta = score_rx.recv() => {
                let msg = match delta {
                    Ok(delta) => ServerMessage::ScoreChanged { delta },
                    Err(RecvError::Lagged(_)) => resync(&state).await,
                    Err(RecvError::Closed) => break,
                };
                if !send_msg(&mut sender, &msg).await {
                    break;
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let was_bound = bound.is_some();
                                let response =
                                    handlers::handle_message(client_msg, &role, &mut bound, &state)
                                        .await;
                                if let (false, Some(player_id)) = (was_bound, &bound) {
                                    outbox_rx = Some(state.attach(player_id).await);
                                }
                                response
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };
                        if let Some(response) = response {
                            if !send_msg(&mut sender, &response).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Departure must reach the registry so completeness checks stop waiting
    if let Some(player_id) = bound {
        if let Err(e) = state.leave_player(&player_id).await {
            tracing::debug!("Leave on disconnect for {}: {}", player_id, e);
        }
    }

    tracing::info!("WebSocket connection closed for role: {:?}", role);
}

/// Next general message; a lagged receiver gets a fresh welcome so the client
/// can rebuild its view instead of missing phase transitions
async fn next_broadcast(
    rx: &mut broadcast::Receiver<ServerMessage>,
    state: &AppState,
    role: Role,
) -> Option<ServerMessage> {
    match rx.recv().await {
        Ok(msg) => Some(msg),
        Err(RecvError::Lagged(n)) => {
            tracing::warn!("Connection lagged {} broadcast messages, resending welcome", n);
            Some(state.welcome(role).await)
        }
        Err(RecvError::Closed) => None,
    }
}

async fn resync(state: &AppState) -> ServerMessage {
    tracing::warn!("Store subscription lagged, sending full snapshot");
    let nicknames = state.nicknames.read().await.snapshot();
    let scores = state.scores.read().await.snapshot();
    ServerMessage::StoreResync { nicknames, scores }
}
