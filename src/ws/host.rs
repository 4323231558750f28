//! Host-only command handlers
//!
//! All handlers in this module require the Host role.
//! Authorization is checked in the main dispatch layer before calling these.

use crate::protocol::{ServerMessage, TimerAction};
use crate::state::AppState;
use std::sync::Arc;

pub async fn handle_start_game(state: &Arc<AppState>) -> Option<ServerMessage> {
    tracing::info!("Host starting game");
    match state.start_game().await {
        Ok(()) => None,
        Err(e) => Some(ServerMessage::error(&e)),
    }
}

pub async fn handle_next(state: &Arc<AppState>) -> Option<ServerMessage> {
    tracing::info!("Host requested next round");
    match state.host_next().await {
        Ok(()) => None,
        Err(e) => Some(ServerMessage::error(&e)),
    }
}

pub async fn handle_timer(state: &Arc<AppState>, action: TimerAction) -> Option<ServerMessage> {
    match state.control_timer(action).await {
        // Snapshot already went out on the timer channel
        Ok(_) => None,
        Err(e) => Some(ServerMessage::error(&e)),
    }
}
