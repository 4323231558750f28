//! Round state machine
//!
//! `Active -> Locked -> Revealing -> LeaderboardWait -> LeaderboardShown`,
//! then back to `Active` for the next index or on to `Finished`.
//!
//! Every transition runs with the `round` write lock held. The two racing
//! triggers for `Active -> Locked` (full collection and timer expiry) both go
//! through `lock_round_locked`, which only admits the first caller that still
//! sees `Active`; the other is discarded.

use std::collections::HashSet;
use std::time::Duration;

use super::AppState;
use crate::answers::AnswerCollector;
use crate::broadcast::spawn_leaderboard_wait;
use crate::error::{QuizError, QuizResult};
use crate::protocol::{ServerMessage, TimerAction};
use crate::reveal::Reveal;
use crate::signal::LeaderboardTrigger;
use crate::timer::{RoundTimer, TimerTick};
use crate::types::*;

/// Server-owned state of the current round
#[derive(Debug)]
pub struct RoundState {
    pub phase: RoundPhase,
    /// Current round index; only ever increases, by exactly one
    pub index: u32,
    pub answers: AnswerCollector,
    pub timer: RoundTimer,
    /// Players who acknowledged the leaderboard for `index`
    pub ready: HashSet<PlayerId>,
}

impl RoundState {
    pub fn new(default_round_secs: f64) -> Self {
        Self {
            phase: RoundPhase::Lobby,
            index: 0,
            answers: AnswerCollector::new(),
            timer: RoundTimer::new(default_round_secs),
            ready: HashSet::new(),
        }
    }

    fn transition(&mut self, to: RoundPhase) -> QuizResult<()> {
        if !self.phase.can_transition_to(to) {
            return Err(QuizError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::debug!("Round {} phase {:?} -> {:?}", self.index, self.phase, to);
        self.phase = to;
        Ok(())
    }
}

impl AppState {
    /// Start the first round (host only)
    pub async fn start_game(&self) -> QuizResult<()> {
        let mut round = self.round.write().await;
        if round.phase != RoundPhase::Lobby {
            return Err(QuizError::NotAccepting { phase: round.phase });
        }
        if self.player_count().await == 0 {
            return Err(QuizError::NotEnoughPlayers);
        }

        tracing::info!(
            "Starting quiz '{}' with {} questions",
            self.question_set.set_name,
            self.question_set.question_count()
        );
        self.begin_round_locked(&mut round).await;
        Ok(())
    }

    /// Record a player's answer; locks the round once everyone has answered
    pub async fn submit_answer(
        &self,
        player_id: &PlayerId,
        round_no: u32,
        option: usize,
    ) -> QuizResult<()> {
        let mut round = self.round.write().await;
        if round.phase != RoundPhase::Active {
            return Err(QuizError::NotAccepting { phase: round.phase });
        }
        if round_no != round.index {
            return Err(QuizError::RoundMismatch {
                expected: round.index,
                got: round_no,
            });
        }
        if !self.is_connected(player_id).await {
            return Err(QuizError::UnknownPlayer);
        }

        if let Err(e) = round.answers.submit(player_id, option) {
            tracing::warn!(
                "Rejected answer from {} for round {}: {}",
                player_id,
                round.index,
                e
            );
            return Err(e);
        }

        let players = self.current_players().await;
        let answered = round.answers.answered_among(&players);
        tracing::info!(
            "Player {} answered round {} ({}/{})",
            player_id,
            round.index,
            answered,
            players.len()
        );
        self.broadcast(ServerMessage::AnswerCount {
            round: round.index,
            answered,
            players: players.len(),
        });

        if round.answers.is_complete(&players) {
            self.lock_round_locked(&mut round, LockTrigger::AllAnswered).await;
        }
        Ok(())
    }

    /// Advance the round timer by one scheduler tick
    pub async fn tick(&self, elapsed: Duration) {
        let mut round = self.round.write().await;
        match round.timer.tick(elapsed) {
            TimerTick::Idle => {}
            TimerTick::Running(snapshot) => self.push_timer(snapshot),
            TimerTick::Completed(snapshot) => {
                self.push_timer(snapshot);
                tracing::info!("Timer expired for round {}", round.index);
                if round.phase == RoundPhase::Active {
                    // Full collection wins a same-tick tie
                    let players = self.current_players().await;
                    let trigger = if round.answers.is_complete(&players) {
                        LockTrigger::AllAnswered
                    } else {
                        LockTrigger::TimerExpired
                    };
                    self.lock_round_locked(&mut round, trigger).await;
                }
            }
        }
    }

    /// The single critical section for `Active -> Locked`. Runs the reveal and
    /// hands off to the leaderboard wait. Later triggers are discarded.
    pub(crate) async fn lock_round_locked(
        &self,
        round: &mut RoundState,
        trigger: LockTrigger,
    ) -> bool {
        if round.phase != RoundPhase::Active {
            tracing::debug!(
                "Discarding {:?} for round {} in {:?}",
                trigger,
                round.index,
                round.phase
            );
            return false;
        }
        if let Err(e) = round.transition(RoundPhase::Locked) {
            tracing::error!("Round lock failed: {}", e);
            return false;
        }
        round.timer.stop();

        tracing::info!("Round {} locked by {:?}", round.index, trigger);
        self.broadcast(ServerMessage::Locked {
            round: round.index,
            trigger,
        });

        self.reveal_locked(round).await;
        true
    }

    /// Send every connected player their outcome and apply score increments
    async fn reveal_locked(&self, round: &mut RoundState) {
        let Some(question) = self.question_set.get_question(round.index) else {
            tracing::error!("Round {} has no question, finishing", round.index);
            self.finish_locked(round).await;
            return;
        };

        if let Err(e) = round.transition(RoundPhase::Revealing) {
            tracing::error!("Reveal failed: {}", e);
            return;
        }

        let players = self.current_players().await;
        let (score_seq, baseline) = {
            let mut scores = self.scores.write().await;
            // Subscribe before mutating so the leaderboard wait sees this round's increments
            let score_seq = scores.watch_seq();
            let baseline = scores.seq();

            for player_id in &players {
                let reveal = Reveal::new(
                    round.index,
                    round.answers.answer_of(player_id),
                    question.correct_index,
                );
                let points = reveal.points();
                tracing::debug!(
                    "Reveal for {} in round {}: {:?}",
                    player_id,
                    round.index,
                    reveal.outcome()
                );
                self.send_to(player_id, ServerMessage::Reveal { reveal }).await;
                if points > 0 {
                    scores.increment(player_id, points);
                }
            }
            (score_seq, baseline)
        };

        tracing::info!("Revealed round {} to {} players", round.index, players.len());

        if let Err(e) = round.transition(RoundPhase::LeaderboardWait) {
            tracing::error!("Leaderboard wait failed: {}", e);
            return;
        }
        self.broadcast_phase(round);
        spawn_leaderboard_wait(self.clone(), round.index, score_seq, baseline);
    }

    /// End of the leaderboard-ready race
    pub async fn show_leaderboard(&self, round_no: u32, trigger: LeaderboardTrigger) -> bool {
        let mut round = self.round.write().await;
        if round.phase != RoundPhase::LeaderboardWait || round.index != round_no {
            tracing::debug!(
                "Ignoring leaderboard for round {} in {:?} (round {})",
                round_no,
                round.phase,
                round.index
            );
            return false;
        }
        if let Err(e) = round.transition(RoundPhase::LeaderboardShown) {
            tracing::error!("Leaderboard failed: {}", e);
            return false;
        }

        let rows = self.leaderboard().await;
        tracing::info!(
            "Leaderboard for round {} shown ({:?}, {} rows)",
            round.index,
            trigger,
            rows.len()
        );
        self.broadcast_phase(&round);
        self.broadcast(ServerMessage::Leaderboard {
            round: round.index,
            rows,
            trigger,
        });

        self.advance_if_all_ready(&mut round).await;
        true
    }

    /// Player acknowledgement that they have seen the leaderboard
    pub async fn mark_ready(&self, player_id: &PlayerId, round_no: u32) -> QuizResult<()> {
        let mut round = self.round.write().await;
        if round_no != round.index {
            return Err(QuizError::RoundMismatch {
                expected: round.index,
                got: round_no,
            });
        }
        match round.phase {
            RoundPhase::Revealing | RoundPhase::LeaderboardWait | RoundPhase::LeaderboardShown => {}
            phase => return Err(QuizError::NotAccepting { phase }),
        }
        if !self.is_connected(player_id).await {
            return Err(QuizError::UnknownPlayer);
        }

        round.ready.insert(player_id.clone());
        let players = self.current_players().await;
        let ready = players.iter().filter(|p| round.ready.contains(*p)).count();
        tracing::debug!(
            "Player {} ready for round {} ({}/{})",
            player_id,
            round.index,
            ready,
            players.len()
        );
        self.broadcast(ServerMessage::ReadyProgress {
            round: round.index,
            ready,
            expected: players.len(),
        });

        if round.phase == RoundPhase::LeaderboardShown {
            self.advance_if_all_ready(&mut round).await;
        }
        Ok(())
    }

    /// Host override for the ready gate
    pub async fn host_next(&self) -> QuizResult<()> {
        let mut round = self.round.write().await;
        match round.phase {
            RoundPhase::LeaderboardShown => {
                tracing::info!("Host advanced past round {}", round.index);
                self.advance_locked(&mut round).await;
                Ok(())
            }
            RoundPhase::Finished => Err(QuizError::Finished),
            phase => Err(QuizError::NotAccepting { phase }),
        }
    }

    /// Host timer controls
    pub async fn control_timer(&self, action: TimerAction) -> QuizResult<TimerSnapshot> {
        let mut round = self.round.write().await;
        if round.phase == RoundPhase::Finished {
            return Err(QuizError::Finished);
        }
        match action {
            TimerAction::Start { seconds } => round.timer.start(seconds),
            TimerAction::Stop => round.timer.stop(),
            TimerAction::Reset => round.timer.reset(),
        }
        let snapshot = round.timer.snapshot();
        tracing::info!("Host timer {:?} in round {}", action, round.index);
        self.push_timer(snapshot);
        Ok(snapshot)
    }

    /// Open the gate if policy says every connected player has acknowledged
    pub(crate) async fn advance_if_all_ready(&self, round: &mut RoundState) {
        if round.phase != RoundPhase::LeaderboardShown
            || self.config.advance_policy != AdvancePolicy::AllReady
        {
            return;
        }
        let players = self.current_players().await;
        if players.iter().all(|p| round.ready.contains(p)) {
            tracing::info!("All players ready after round {}", round.index);
            self.advance_locked(round).await;
        }
    }

    /// Move to the next index; answers and acknowledgements reset together
    async fn advance_locked(&self, round: &mut RoundState) {
        round.index += 1;
        round.answers.clear();
        round.ready.clear();

        if (round.index as usize) >= self.question_set.question_count() {
            self.finish_locked(round).await;
        } else {
            self.begin_round_locked(round).await;
        }
    }

    /// Enter `Active` for the current index, or `Finished` if there is no question
    async fn begin_round_locked(&self, round: &mut RoundState) {
        let Some(question) = self.question_set.get_question(round.index) else {
            self.finish_locked(round).await;
            return;
        };

        if let Err(e) = round.transition(RoundPhase::Active) {
            tracing::error!("Cannot begin round {}: {}", round.index, e);
            return;
        }
        round.answers.clear();
        round.ready.clear();
        round.timer.start(Some(self.question_set.time_per_question));

        tracing::info!("Round {} active: {:?}", round.index, question.text);
        self.broadcast_phase(round);
        self.broadcast(ServerMessage::Question {
            question: QuestionView::new(
                round.index,
                self.question_set.question_count(),
                question,
            ),
            timer: round.timer.snapshot(),
        });
    }

    async fn finish_locked(&self, round: &mut RoundState) {
        round.timer.stop();
        round.phase = RoundPhase::Finished;

        let rows = self.leaderboard().await;
        tracing::info!("Quiz finished after {} rounds", round.index);
        self.broadcast_phase(round);
        self.broadcast(ServerMessage::GameOver { rows });
    }

    fn broadcast_phase(&self, round: &RoundState) {
        self.broadcast(ServerMessage::Phase {
            phase: round.phase,
            round: round.index,
            server_now: chrono::Utc::now().to_rfc3339(),
        });
    }

    fn push_timer(&self, snapshot: TimerSnapshot) {
        let _ = self.timer_broadcast.send(ServerMessage::Timer {
            remaining: snapshot.remaining,
            duration: snapshot.duration,
        });
    }
}
