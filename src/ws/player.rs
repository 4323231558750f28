//! Player message handlers
//!
//! Joining binds the connection to a player id; every later player message
//! acts as that id.

use crate::error::QuizError;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::PlayerId;
use std::sync::Arc;

pub async fn handle_join(
    state: &Arc<AppState>,
    bound: &mut Option<PlayerId>,
    nickname: String,
) -> Option<ServerMessage> {
    if let Some(player_id) = bound.as_ref() {
        // Re-sending Join on a bound connection just repeats the binding
        return match state.get_player(player_id).await {
            Some(player) => Some(ServerMessage::Joined { player }),
            None => Some(ServerMessage::error(&QuizError::UnknownPlayer)),
        };
    }

    tracing::info!("Join request: {:?}", nickname);
    match state.join_player(&nickname).await {
        Ok(player) => {
            *bound = Some(player.id.clone());
            Some(ServerMessage::Joined { player })
        }
        Err(e) => Some(ServerMessage::error(&e)),
    }
}

pub async fn handle_leave(
    state: &Arc<AppState>,
    bound: &mut Option<PlayerId>,
) -> Option<ServerMessage> {
    let player_id = bound.take()?;
    match state.leave_player(&player_id).await {
        Ok(()) => None,
        Err(e) => Some(ServerMessage::error(&e)),
    }
}

pub async fn handle_submit_answer(
    state: &Arc<AppState>,
    bound: &Option<PlayerId>,
    round: u32,
    option: usize,
) -> Option<ServerMessage> {
    let Some(player_id) = bound else {
        return Some(ServerMessage::error(&QuizError::UnknownPlayer));
    };

    match state.submit_answer(player_id, round, option).await {
        Ok(()) => Some(ServerMessage::AnswerAccepted { round, option }),
        Err(e) => Some(ServerMessage::error(&e)),
    }
}

pub async fn handle_ready(
    state: &Arc<AppState>,
    bound: &Option<PlayerId>,
    round: u32,
) -> Option<ServerMessage> {
    let Some(player_id) = bound else {
        return Some(ServerMessage::error(&QuizError::UnknownPlayer));
    };

    match state.mark_ready(player_id, round).await {
        Ok(()) => None,
        Err(e) => {
            tracing::debug!("Ready from {} rejected: {}", player_id, e);
            Some(ServerMessage::error(&e))
        }
    }
}
