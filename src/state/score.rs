use super::AppState;
use crate::types::*;

impl AppState {
    /// One row per scores entry, in scores key order, with the nickname looked
    /// up separately. Rows are not sorted by score.
    pub async fn leaderboard(&self) -> Vec<LeaderboardRow> {
        let nicknames = self.nicknames.read().await;
        let scores = self.scores.read().await;

        scores
            .iter()
            .map(|(player_id, score)| LeaderboardRow {
                player_id: player_id.clone(),
                nickname: nicknames.get(player_id).cloned().unwrap_or_default(),
                score: *score,
            })
            .collect()
    }

    pub async fn score_of(&self, player_id: &PlayerId) -> Option<u32> {
        self.scores.read().await.get(player_id).copied()
    }
}
