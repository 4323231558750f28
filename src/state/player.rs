//! Player registry
//!
//! Players join in the lobby and keep their id for the whole session. Leaving
//! only flips `connected`, so nickname and score entries stay around for the
//! leaderboard while the player stops counting toward answer completeness.

use super::AppState;
use crate::error::{QuizError, QuizResult};
use crate::protocol::ServerMessage;
use crate::types::*;

const MAX_NICKNAME_CHARS: usize = 24;

/// Trim and truncate a requested nickname, generating one if it is empty
fn normalize_nickname(requested: &str) -> String {
    let trimmed: String = requested.trim().chars().take(MAX_NICKNAME_CHARS).collect();
    if !trimmed.is_empty() {
        return trimmed;
    }
    petname::petname(2, " ").unwrap_or_else(|| "Player".to_string())
}

impl AppState {
    /// Register a new player and seed their nickname and score entries
    pub async fn join_player(&self, nickname: &str) -> QuizResult<Player> {
        // Held for the whole join so a concurrent start sees a consistent roster
        let round = self.round.read().await;
        if round.phase != RoundPhase::Lobby {
            return Err(QuizError::NotAccepting { phase: round.phase });
        }

        let player = Player {
            id: ulid::Ulid::new().to_string(),
            nickname: normalize_nickname(nickname),
            connected: true,
        };

        let player_count = {
            let mut players = self.players.write().await;
            players.insert(player.id.clone(), player.clone());
            players.values().filter(|p| p.connected).count()
        };
        self.nicknames
            .write()
            .await
            .insert_once(player.id.clone(), player.nickname.clone());
        self.scores.write().await.insert_once(player.id.clone(), 0);
        drop(round);

        tracing::info!("Player {} joined as {:?}", player.id, player.nickname);
        self.broadcast(ServerMessage::PlayerJoined {
            player_id: player.id.clone(),
            nickname: player.nickname.clone(),
            player_count,
        });

        Ok(player)
    }

    /// Mark a player as gone and re-check anything waiting on them
    pub async fn leave_player(&self, player_id: &PlayerId) -> QuizResult<()> {
        let mut round = self.round.write().await;

        let player_count = {
            let mut players = self.players.write().await;
            match players.get_mut(player_id) {
                Some(p) if p.connected => p.connected = false,
                _ => return Err(QuizError::UnknownPlayer),
            }
            players.values().filter(|p| p.connected).count()
        };
        self.detach(player_id).await;

        tracing::info!(
            "Player {} left, {} players remain",
            player_id,
            player_count
        );
        self.broadcast(ServerMessage::PlayerLeft {
            player_id: player_id.clone(),
            player_count,
        });

        // The departed player no longer counts toward either barrier
        match round.phase {
            RoundPhase::Active => {
                let players = self.current_players().await;
                if round.answers.is_complete(&players) {
                    self.lock_round_locked(&mut round, LockTrigger::AllAnswered).await;
                }
            }
            RoundPhase::LeaderboardShown => {
                self.advance_if_all_ready(&mut round).await;
            }
            _ => {}
        }

        Ok(())
    }

    pub async fn get_player(&self, player_id: &PlayerId) -> Option<Player> {
        self.players.read().await.get(player_id).cloned()
    }

    /// Connected player ids in join order
    pub async fn current_players(&self) -> Vec<PlayerId> {
        self.players
            .read()
            .await
            .values()
            .filter(|p| p.connected)
            .map(|p| p.id.clone())
            .collect()
    }

    pub async fn player_count(&self) -> usize {
        self.players
            .read()
            .await
            .values()
            .filter(|p| p.connected)
            .count()
    }

    pub(crate) async fn is_connected(&self, player_id: &PlayerId) -> bool {
        self.players
            .read()
            .await
            .get(player_id)
            .is_some_and(|p| p.connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::SampleQuestionBank;
    use crate::config::QuizConfig;

    fn new_state() -> AppState {
        AppState::new(QuizConfig::default(), SampleQuestionBank::sample_set())
    }

    #[tokio::test]
    async fn test_join_seeds_stores() {
        let state = new_state();
        let mut rx = state.broadcast.subscribe();

        let player = state.join_player("  Alice  ").await.unwrap();
        assert_eq!(player.nickname, "Alice");
        assert!(player.connected);

        assert_eq!(
            state.nicknames.read().await.get(&player.id),
            Some(&"Alice".to_string())
        );
        assert_eq!(state.scores.read().await.get(&player.id), Some(&0));

        match rx.recv().await.unwrap() {
            ServerMessage::PlayerJoined {
                player_id,
                player_count,
                ..
            } => {
                assert_eq!(player_id, player.id);
                assert_eq!(player_count, 1);
            }
            other => panic!("Expected PlayerJoined, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_nickname_gets_generated() {
        let state = new_state();
        let player = state.join_player("   ").await.unwrap();
        assert!(!player.nickname.trim().is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_ordered() {
        let state = new_state();
        let a = state.join_player("A").await.unwrap();
        let b = state.join_player("B").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(state.current_players().await, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_leave_keeps_store_entries() {
        let state = new_state();
        let a = state.join_player("A").await.unwrap();
        let b = state.join_player("B").await.unwrap();

        state.leave_player(&a.id).await.unwrap();
        assert_eq!(state.player_count().await, 1);
        assert_eq!(state.current_players().await, vec![b.id]);
        assert!(state.nicknames.read().await.contains_key(&a.id));
        assert!(state.scores.read().await.contains_key(&a.id));

        // Leaving twice is an error, not a panic
        assert_eq!(
            state.leave_player(&a.id).await,
            Err(QuizError::UnknownPlayer)
        );
    }

    #[tokio::test]
    async fn test_join_rejected_after_start() {
        let state = new_state();
        state.join_player("A").await.unwrap();
        state.start_game().await.unwrap();

        let result = state.join_player("Late").await;
        assert_eq!(
            result,
            Err(QuizError::NotAccepting {
                phase: RoundPhase::Active
            })
        );
    }
}
