//! Observer-side session
//!
//! A `ClientSession` is what one connected client holds: replicas of the two
//! stores, the last round view, and the render state. It turns server
//! messages into `RenderEvent`s carrying only computed display values.
//!
//! After its own reveal arrives, a client races "any scores mutation since
//! this question started" against the leaderboard timeout, renders the
//! leaderboard from its replicas, then signals ready. Score deltas travel on
//! their own channel and may land before or after the reveal; a mutation that
//! already arrived wins the race immediately.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::reveal::{Highlight, RevealOutcome};
use crate::signal::{wait_for_leaderboard, LeaderboardTrigger};
use crate::store::Replica;
use crate::types::*;

/// Display values handed to the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Lobby {
        players: usize,
    },
    Question {
        question: QuestionView,
        timer: String,
    },
    Timer {
        text: String,
        fraction: f64,
    },
    AnswerLocked {
        option: usize,
    },
    Reveal {
        outcome: RevealOutcome,
        highlights: [Highlight; OPTION_COUNT],
    },
    Leaderboard {
        round: u32,
        rows: Vec<LeaderboardRow>,
        trigger: LeaderboardTrigger,
    },
    GameOver {
        rows: Vec<LeaderboardRow>,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// What applying one server message produced
#[derive(Debug, Default)]
pub struct ClientUpdate {
    pub events: Vec<RenderEvent>,
    /// Own reveal arrived for this round; start the leaderboard race
    pub start_wait: Option<u32>,
    /// The leaderboard for this round was rendered from a server push
    pub leaderboard_done: Option<u32>,
}

pub struct ClientSession {
    player_id: Option<PlayerId>,
    phase: RoundPhase,
    round: u32,
    question: Option<QuestionView>,
    nicknames: Replica<PlayerId, String>,
    scores: Replica<PlayerId, u32>,
    score_seq: watch::Sender<u64>,
    /// Scores sequence when the current question arrived
    question_seq: u64,
    rendered_leaderboard: Option<u32>,
    leaderboard_timeout: Duration,
}

impl ClientSession {
    pub fn new(leaderboard_timeout: Duration) -> Self {
        let (score_seq, _rx) = watch::channel(0);
        Self {
            player_id: None,
            phase: RoundPhase::Lobby,
            round: 0,
            question: None,
            nicknames: Replica::default(),
            scores: Replica::default(),
            score_seq,
            question_seq: 0,
            rendered_leaderboard: None,
            leaderboard_timeout,
        }
    }

    pub fn player_id(&self) -> Option<&PlayerId> {
        self.player_id.as_ref()
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn question(&self) -> Option<&QuestionView> {
        self.question.as_ref()
    }

    pub fn scores(&self) -> &Replica<PlayerId, u32> {
        &self.scores
    }

    pub fn nicknames(&self) -> &Replica<PlayerId, String> {
        &self.nicknames
    }

    pub fn apply(&mut self, msg: ServerMessage) -> ClientUpdate {
        let mut update = ClientUpdate::default();

        match msg {
            ServerMessage::Welcome {
                round,
                nicknames,
                scores,
                ..
            } => {
                self.nicknames.load_snapshot(&nicknames);
                self.scores.load_snapshot(&scores);
                self.publish_score_seq();
                self.phase = round.phase;
                self.round = round.index;
                self.question_seq = self.scores.seq();
                self.question = round.question;
                match &self.question {
                    Some(question) => update.events.push(RenderEvent::Question {
                        question: question.clone(),
                        timer: round.timer.display(),
                    }),
                    None => update.events.push(RenderEvent::Lobby {
                        players: round.players,
                    }),
                }
            }
            ServerMessage::Joined { player } => {
                tracing::debug!("Bound to player {}", player.id);
                self.player_id = Some(player.id);
            }
            ServerMessage::PlayerJoined { player_count, .. }
            | ServerMessage::PlayerLeft { player_count, .. } => {
                if self.phase == RoundPhase::Lobby {
                    update.events.push(RenderEvent::Lobby {
                        players: player_count,
                    });
                }
            }
            ServerMessage::Phase { phase, round, .. } => {
                self.phase = phase;
                self.round = round;
            }
            ServerMessage::Question { question, timer } => {
                self.round = question.index;
                self.phase = RoundPhase::Active;
                self.question_seq = self.scores.seq();
                self.question = Some(question.clone());
                update.events.push(RenderEvent::Question {
                    question,
                    timer: timer.display(),
                });
            }
            ServerMessage::Timer {
                remaining,
                duration,
            } => {
                let snapshot = TimerSnapshot {
                    remaining,
                    duration,
                };
                update.events.push(RenderEvent::Timer {
                    text: snapshot.display(),
                    fraction: snapshot.fraction(),
                });
            }
            ServerMessage::AnswerAccepted { round, option } if round == self.round => {
                update.events.push(RenderEvent::AnswerLocked { option });
            }
            ServerMessage::Reveal { reveal } => {
                if reveal.round != self.round {
                    tracing::debug!(
                        "Ignoring reveal for round {} (at {})",
                        reveal.round,
                        self.round
                    );
                } else {
                    update.events.push(RenderEvent::Reveal {
                        outcome: reveal.outcome(),
                        highlights: reveal.highlights(),
                    });
                    if self.rendered_leaderboard != Some(reveal.round) {
                        update.start_wait = Some(reveal.round);
                    }
                }
            }
            ServerMessage::NicknameChanged { delta } => {
                self.nicknames.apply(&delta);
            }
            ServerMessage::ScoreChanged { delta } => {
                if self.scores.apply(&delta) {
                    self.publish_score_seq();
                }
            }
            ServerMessage::StoreResync { nicknames, scores } => {
                self.nicknames.load_snapshot(&nicknames);
                if self.scores.load_snapshot(&scores) {
                    self.publish_score_seq();
                }
            }
            ServerMessage::Leaderboard {
                round,
                rows,
                trigger,
            } => {
                if self.rendered_leaderboard != Some(round) {
                    self.rendered_leaderboard = Some(round);
                    update.events.push(RenderEvent::Leaderboard {
                        round,
                        rows,
                        trigger,
                    });
                    update.leaderboard_done = Some(round);
                }
            }
            ServerMessage::GameOver { rows } => {
                self.phase = RoundPhase::Finished;
                self.question = None;
                update.events.push(RenderEvent::GameOver { rows });
            }
            ServerMessage::Error { code, msg } => {
                update.events.push(RenderEvent::Error { code, msg });
            }
            _ => {}
        }

        update
    }

    /// Leaderboard-ready race for the current question
    pub fn leaderboard_wait(&self) -> impl Future<Output = LeaderboardTrigger> + Send + 'static {
        wait_for_leaderboard(
            self.score_seq.subscribe(),
            self.question_seq,
            self.leaderboard_timeout,
        )
    }

    /// Rows from the local replicas, in scores key order
    pub fn leaderboard_rows(&self) -> Vec<LeaderboardRow> {
        self.scores
            .iter()
            .map(|(player_id, score)| LeaderboardRow {
                player_id: player_id.clone(),
                nickname: self.nicknames.get(player_id).cloned().unwrap_or_default(),
                score: *score,
            })
            .collect()
    }

    /// Render the leaderboard once per round
    pub fn render_leaderboard(
        &mut self,
        round: u32,
        trigger: LeaderboardTrigger,
    ) -> Option<RenderEvent> {
        if self.rendered_leaderboard == Some(round) {
            return None;
        }
        self.rendered_leaderboard = Some(round);
        Some(RenderEvent::Leaderboard {
            round,
            rows: self.leaderboard_rows(),
            trigger,
        })
    }

    fn publish_score_seq(&self) {
        self.score_seq.send_replace(self.scores.seq());
    }
}

type PendingWait = Pin<Box<dyn Future<Output = LeaderboardTrigger> + Send>>;

/// Drive a session: apply inbound messages, run the leaderboard race after
/// each reveal, and send `Ready` once the leaderboard is rendered. Returns the
/// session when the inbound channel closes.
pub async fn run_client(
    mut session: ClientSession,
    mut inbound: mpsc::Receiver<ServerMessage>,
    outbound: mpsc::Sender<ClientMessage>,
    render: mpsc::Sender<RenderEvent>,
) -> ClientSession {
    let mut pending: Option<(u32, PendingWait)> = None;

    loop {
        tokio::select! {
            msg = inbound.recv() => {
                let Some(msg) = msg else { break };
                let update = session.apply(msg);

                for event in update.events {
                    emit(&render, event).await;
                }
                if let Some(round) = update.start_wait {
                    pending = Some((round, Box::pin(session.leaderboard_wait())));
                }
                if let Some(round) = update.leaderboard_done {
                    if pending.as_ref().is_some_and(|(r, _)| *r == round) {
                        pending = None;
                    }
                    send_ready(&session, &outbound, round).await;
                }
            }

            resolved = async {
                match pending.as_mut() {
                    Some((round, wait)) => (*round, wait.await),
                    None => std::future::pending().await,
                }
            } => {
                let (round, trigger) = resolved;
                pending = None;
                tracing::debug!("Client leaderboard for round {} ready: {:?}", round, trigger);

                if let Some(event) = session.render_leaderboard(round, trigger) {
                    emit(&render, event).await;
                    send_ready(&session, &outbound, round).await;
                }
            }
        }
    }

    session
}

/// A closed renderer does not stop the session; readiness still goes out
async fn emit(render: &mpsc::Sender<RenderEvent>, event: RenderEvent) {
    if let Err(e) = render.send(event).await {
        tracing::debug!("Renderer gone, dropping {:?}", e.0);
    }
}

async fn send_ready(session: &ClientSession, outbound: &mpsc::Sender<ClientMessage>, round: u32) {
    if session.player_id().is_none() {
        return;
    }
    if outbound.send(ClientMessage::Ready { round }).await.is_err() {
        tracing::debug!("Server connection gone before ready for round {}", round);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reveal::Reveal;
    use crate::store::{ChangeKind, Delta};
    use tokio::time::Instant;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn question(index: u32) -> ServerMessage {
        ServerMessage::Question {
            question: QuestionView {
                index,
                count: 5,
                text: "Capital of France?".to_string(),
                options: vec![
                    "London".to_string(),
                    "Paris".to_string(),
                    "Berlin".to_string(),
                    "Madrid".to_string(),
                ],
            },
            timer: TimerSnapshot {
                remaining: 10.0,
                duration: 10.0,
            },
        }
    }

    fn score_delta(seq: u64, player: &str, score: u32) -> ServerMessage {
        ServerMessage::ScoreChanged {
            delta: Delta {
                seq,
                key: player.to_string(),
                value: Some(score),
                kind: ChangeKind::Set,
            },
        }
    }

    fn joined(id: &str) -> ServerMessage {
        ServerMessage::Joined {
            player: Player {
                id: id.to_string(),
                nickname: id.to_string(),
                connected: true,
            },
        }
    }

    fn reveal(round: u32, chosen: Option<usize>) -> ServerMessage {
        ServerMessage::Reveal {
            reveal: Reveal::new(round, chosen, 1),
        }
    }

    struct Harness {
        to_client: mpsc::Sender<ServerMessage>,
        from_client: mpsc::Receiver<ClientMessage>,
        rendered: mpsc::Receiver<RenderEvent>,
        handle: tokio::task::JoinHandle<ClientSession>,
    }

    fn spawn_client() -> Harness {
        let (to_client, inbound) = mpsc::channel(32);
        let (outbound, from_client) = mpsc::channel(32);
        let (render, rendered) = mpsc::channel(32);
        let handle = tokio::spawn(run_client(
            ClientSession::new(TIMEOUT),
            inbound,
            outbound,
            render,
        ));
        Harness {
            to_client,
            from_client,
            rendered,
            handle,
        }
    }

    async fn next_leaderboard(rendered: &mut mpsc::Receiver<RenderEvent>) -> RenderEvent {
        loop {
            let event = rendered.recv().await.unwrap();
            if matches!(event, RenderEvent::Leaderboard { .. }) {
                return event;
            }
        }
    }

    #[test]
    fn test_reveal_renders_highlights() {
        let mut session = ClientSession::new(TIMEOUT);
        session.apply(question(0));

        let update = session.apply(reveal(0, Some(3)));
        assert_eq!(update.start_wait, Some(0));
        assert_eq!(
            update.events,
            vec![RenderEvent::Reveal {
                outcome: RevealOutcome::Wrong,
                highlights: [
                    Highlight::Neutral,
                    Highlight::Correct,
                    Highlight::Neutral,
                    Highlight::Wrong
                ],
            }]
        );

        // Stale reveals do nothing
        let update = session.apply(reveal(4, Some(1)));
        assert!(update.events.is_empty());
        assert!(update.start_wait.is_none());
    }

    #[test]
    fn test_timer_renders_display_values() {
        let mut session = ClientSession::new(TIMEOUT);
        let update = session.apply(ServerMessage::Timer {
            remaining: 65.2,
            duration: 90.0,
        });
        match &update.events[..] {
            [RenderEvent::Timer { text, fraction }] => {
                assert_eq!(text, "1:06");
                assert!((fraction - 65.2 / 90.0).abs() < 1e-9);
            }
            other => panic!("Expected timer event, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_score_mutation_ends_wait_before_timeout() {
        let mut h = spawn_client();
        let started = Instant::now();
        h.to_client.send(joined("a")).await.unwrap();
        h.to_client.send(question(0)).await.unwrap();
        h.to_client.send(reveal(0, Some(1))).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        h.to_client.send(score_delta(1, "a", 1)).await.unwrap();

        match next_leaderboard(&mut h.rendered).await {
            RenderEvent::Leaderboard {
                round,
                rows,
                trigger,
            } => {
                assert_eq!(round, 0);
                assert_eq!(trigger, LeaderboardTrigger::ScoresChanged);
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].score, 1);
            }
            _ => unreachable!(),
        }
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert!(matches!(
            h.from_client.recv().await,
            Some(ClientMessage::Ready { round: 0 })
        ));

        // The cancelled timeout never renders a second leaderboard
        tokio::time::sleep(Duration::from_secs(10)).await;
        while let Ok(event) = h.rendered.try_recv() {
            assert!(!matches!(event, RenderEvent::Leaderboard { .. }));
        }
        assert!(h.from_client.try_recv().is_err());

        drop(h.to_client);
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_mutation_falls_back_to_timeout() {
        let mut h = spawn_client();
        let started = Instant::now();
        h.to_client.send(joined("a")).await.unwrap();
        h.to_client.send(question(0)).await.unwrap();
        h.to_client.send(reveal(0, None)).await.unwrap();

        match next_leaderboard(&mut h.rendered).await {
            RenderEvent::Leaderboard { trigger, .. } => {
                assert_eq!(trigger, LeaderboardTrigger::TimedOut);
            }
            _ => unreachable!(),
        }
        assert_eq!(started.elapsed(), TIMEOUT);
        assert!(matches!(
            h.from_client.recv().await,
            Some(ClientMessage::Ready { round: 0 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_renderer_still_signals_ready() {
        let mut h = spawn_client();
        drop(h.rendered);
        h.to_client.send(joined("a")).await.unwrap();
        h.to_client.send(question(0)).await.unwrap();
        h.to_client.send(reveal(0, Some(1))).await.unwrap();

        assert!(matches!(
            h.from_client.recv().await,
            Some(ClientMessage::Ready { round: 0 })
        ));
        drop(h.to_client);
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_delta_before_reveal_wins_immediately() {
        let mut h = spawn_client();
        let started = Instant::now();
        h.to_client.send(joined("a")).await.unwrap();
        h.to_client.send(question(0)).await.unwrap();
        h.to_client.send(score_delta(1, "a", 1)).await.unwrap();
        h.to_client.send(reveal(0, Some(1))).await.unwrap();

        match next_leaderboard(&mut h.rendered).await {
            RenderEvent::Leaderboard { trigger, .. } => {
                assert_eq!(trigger, LeaderboardTrigger::ScoresChanged);
            }
            _ => unreachable!(),
        }
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_leaderboard_cancels_own_wait() {
        let mut h = spawn_client();
        h.to_client.send(joined("a")).await.unwrap();
        h.to_client.send(question(0)).await.unwrap();
        h.to_client.send(reveal(0, None)).await.unwrap();
        h.to_client
            .send(ServerMessage::Leaderboard {
                round: 0,
                rows: vec![],
                trigger: LeaderboardTrigger::ScoresChanged,
            })
            .await
            .unwrap();

        assert!(matches!(
            next_leaderboard(&mut h.rendered).await,
            RenderEvent::Leaderboard {
                trigger: LeaderboardTrigger::ScoresChanged,
                ..
            }
        ));
        assert!(matches!(
            h.from_client.recv().await,
            Some(ClientMessage::Ready { round: 0 })
        ));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(h.from_client.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_never_signals_ready() {
        let mut h = spawn_client();
        h.to_client.send(question(0)).await.unwrap();
        h.to_client
            .send(ServerMessage::Leaderboard {
                round: 0,
                rows: vec![],
                trigger: LeaderboardTrigger::TimedOut,
            })
            .await
            .unwrap();

        next_leaderboard(&mut h.rendered).await;
        drop(h.to_client);
        let session = h.handle.await.unwrap();
        assert!(session.player_id().is_none());
        assert!(h.from_client.try_recv().is_err());
    }

    #[test]
    fn test_resync_replaces_replicas() {
        let mut session = ClientSession::new(TIMEOUT);
        session.apply(score_delta(1, "a", 1));
        session.apply(ServerMessage::StoreResync {
            nicknames: crate::store::StoreSnapshot {
                seq: 2,
                entries: vec![("a".to_string(), "Alice".to_string())],
            },
            scores: crate::store::StoreSnapshot {
                seq: 5,
                entries: vec![("a".to_string(), 3), ("b".to_string(), 0)],
            },
        });

        assert_eq!(session.scores().seq(), 5);
        let rows = session.leaderboard_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].nickname, "Alice");
        assert_eq!(rows[0].score, 3);
        assert_eq!(rows[1].nickname, "");
    }
}
