//! WebSocket message dispatch
//!
//! This module provides the main entry point for handling client messages.
//! Authorization is checked here, then dispatched to role-specific handler modules.

use crate::error::QuizError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{PlayerId, Role};
use std::sync::Arc;

use super::{host, player};

/// Macro to check host authorization and return early if unauthorized
macro_rules! check_host {
    ($role:expr, $action:expr) => {
        if *$role != Role::Host {
            return Some(ServerMessage::error(&QuizError::Unauthorized {
                action: $action.to_string(),
            }));
        }
    };
}

/// Handle a client message and return an optional reply for this connection.
///
/// `bound` is the player id this connection joined as, if any.
pub async fn handle_message(
    msg: ClientMessage,
    role: &Role,
    bound: &mut Option<PlayerId>,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        // Player messages
        ClientMessage::Join { nickname } => {
            if *role != Role::Player {
                return Some(ServerMessage::error(&QuizError::Unauthorized {
                    action: format!("join as {:?}", role),
                }));
            }
            player::handle_join(state, bound, nickname).await
        }

        ClientMessage::Leave => player::handle_leave(state, bound).await,

        ClientMessage::SubmitAnswer { round, option } => {
            player::handle_submit_answer(state, bound, round, option).await
        }

        ClientMessage::Ready { round } => player::handle_ready(state, bound, round).await,

        // Host-only commands (authorization checked before dispatch)
        ClientMessage::HostStartGame => {
            check_host!(role, "start the game");
            host::handle_start_game(state).await
        }

        ClientMessage::HostNext => {
            check_host!(role, "advance rounds");
            host::handle_next(state).await
        }

        ClientMessage::HostTimer { action } => {
            check_host!(role, "control the timer");
            host::handle_timer(state, action).await
        }
    }
}
