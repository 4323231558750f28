//! Per-round answer collection

use std::collections::HashMap;

use crate::error::{QuizError, QuizResult};
use crate::types::{PlayerId, OPTION_COUNT};

/// Server-side record of who picked what in the current round
#[derive(Debug, Clone, Default)]
pub struct AnswerCollector {
    answers: HashMap<PlayerId, usize>,
}

impl AnswerCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a player's choice. A second submission in the same round is
    /// rejected and leaves the first one untouched.
    pub fn submit(&mut self, player: &PlayerId, option_index: usize) -> QuizResult<()> {
        if option_index >= OPTION_COUNT {
            return Err(QuizError::InvalidOption {
                index: option_index,
            });
        }
        if self.answers.contains_key(player) {
            return Err(QuizError::AlreadyAnswered);
        }
        self.answers.insert(player.clone(), option_index);
        Ok(())
    }

    pub fn answer_of(&self, player: &PlayerId) -> Option<usize> {
        self.answers.get(player).copied()
    }

    /// Number of the given (connected) players who have answered
    pub fn answered_among(&self, players: &[PlayerId]) -> usize {
        players
            .iter()
            .filter(|p| self.answers.contains_key(*p))
            .count()
    }

    /// True once every connected player has answered
    pub fn is_complete(&self, players: &[PlayerId]) -> bool {
        !players.is_empty() && self.answered_among(players) >= players.len()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn clear(&mut self) {
        self.answers.clear();
    }
}
