//! Leaderboard-ready race
//!
//! After a reveal, the leaderboard is shown as soon as either the Scores store
//! publishes a mutation past a baseline sequence number, or a fixed timeout
//! elapses. Both branches live in one `select!`, so exactly one of them wins
//! and the loser is dropped before it can fire.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardTrigger {
    ScoresChanged,
    TimedOut,
}

/// Resolve when the watched sequence passes `baseline` or after `timeout`
pub async fn wait_for_leaderboard(
    mut score_seq: watch::Receiver<u64>,
    baseline: u64,
    timeout: Duration,
) -> LeaderboardTrigger {
    if *score_seq.borrow_and_update() > baseline {
        return LeaderboardTrigger::ScoresChanged;
    }

    tokio::select! {
        biased;

        // A closed channel disables this branch and leaves the timeout
        Ok(_) = score_seq.wait_for(|seq| *seq > baseline) => LeaderboardTrigger::ScoresChanged,

        _ = tokio::time::sleep(timeout) => LeaderboardTrigger::TimedOut,
    }
}
