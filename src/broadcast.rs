use crate::signal::{wait_for_leaderboard, LeaderboardTrigger};
use crate::state::AppState;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Spawn the fixed-rate scheduler that drives the round timer and pushes a
/// timer snapshot to every observer on each tick while it runs
pub fn spawn_round_ticker(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // First tick completes immediately
        interval.tick().await;
        let mut last = Instant::now();

        loop {
            interval.tick().await;
            let now = Instant::now();
            let elapsed = now.duration_since(last);
            last = now;

            state.tick(elapsed).await;
        }
    })
}

/// Race the scores store against the leaderboard timeout for one round, then
/// show the leaderboard with whichever trigger won
pub fn spawn_leaderboard_wait(
    state: AppState,
    round: u32,
    score_seq: watch::Receiver<u64>,
    baseline: u64,
) -> JoinHandle<LeaderboardTrigger> {
    tokio::spawn(async move {
        let trigger =
            wait_for_leaderboard(score_seq, baseline, state.config.leaderboard_timeout).await;
        tracing::debug!("Leaderboard for round {} ready: {:?}", round, trigger);

        state.show_leaderboard(round, trigger).await;
        trigger
    })
}
