mod player;
mod round;
mod score;

pub use round::RoundState;

use crate::config::QuizConfig;
use crate::protocol::{RoundView, ServerMessage, PROTOCOL_VERSION};
use crate::store::ReplicatedMap;
use crate::types::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

pub(crate) const CHANNEL_CAPACITY: usize = 256;

/// Shared session state, constructed once per game session and handed to
/// every component that needs it.
///
/// Lock order: `round` -> `players` -> `nicknames` -> `scores` -> `outboxes`.
/// Any code path that holds more than one of these acquires them in that order.
#[derive(Clone)]
pub struct AppState {
    pub session_id: SessionId,
    pub config: Arc<QuizConfig>,
    pub question_set: Arc<QuestionSet>,
    pub round: Arc<RwLock<RoundState>>,
    /// Keyed by ULID, so iteration is join order
    pub players: Arc<RwLock<BTreeMap<PlayerId, Player>>>,
    pub nicknames: Arc<RwLock<ReplicatedMap<PlayerId, String>>>,
    pub scores: Arc<RwLock<ReplicatedMap<PlayerId, u32>>>,
    /// Phase, question, leaderboard and registry messages for everyone
    pub broadcast: broadcast::Sender<ServerMessage>,
    /// Timer snapshots, kept separate so tick traffic never delays other categories
    pub timer_broadcast: broadcast::Sender<ServerMessage>,
    /// Per-player queues for reveals, registered by the player's connection
    pub outboxes: Arc<RwLock<HashMap<PlayerId, mpsc::UnboundedSender<ServerMessage>>>>,
}

impl AppState {
    pub fn new(config: QuizConfig, question_set: QuestionSet) -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        let (timer_tx, _timer_rx) = broadcast::channel(CHANNEL_CAPACITY);
        let round = RoundState::new(config.default_round_secs);

        Self {
            session_id: ulid::Ulid::new().to_string(),
            config: Arc::new(config),
            question_set: Arc::new(question_set),
            round: Arc::new(RwLock::new(round)),
            players: Arc::new(RwLock::new(BTreeMap::new())),
            nicknames: Arc::new(RwLock::new(ReplicatedMap::new(
                "nicknames",
                CHANNEL_CAPACITY,
            ))),
            scores: Arc::new(RwLock::new(ReplicatedMap::new("scores", CHANNEL_CAPACITY))),
            broadcast: tx,
            timer_broadcast: timer_tx,
            outboxes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Send to every connected observer
    pub fn broadcast(&self, msg: ServerMessage) {
        // Ignore send errors (no receivers connected is fine)
        let _ = self.broadcast.send(msg);
    }

    /// Open the per-player queue for a bound connection, replacing any older one
    pub async fn attach(&self, player_id: &PlayerId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes.write().await.insert(player_id.clone(), tx);
        tracing::debug!("Attached outbox for {}", player_id);
        rx
    }

    pub(crate) async fn detach(&self, player_id: &PlayerId) {
        self.outboxes.write().await.remove(player_id);
    }

    /// Send to a single player's connection
    pub async fn send_to(&self, player_id: &PlayerId, msg: ServerMessage) {
        let outboxes = self.outboxes.read().await;
        match outboxes.get(player_id) {
            Some(tx) => {
                if tx.send(msg).is_err() {
                    tracing::debug!("Outbox for {} is closed", player_id);
                }
            }
            None => tracing::debug!("No outbox for {}, dropping message", player_id),
        }
    }

    /// Snapshot of the round for late joiners and the HTTP API
    pub async fn round_view(&self) -> RoundView {
        let round = self.round.read().await;
        let players = self.current_players().await;
        let question = match round.phase {
            RoundPhase::Lobby | RoundPhase::Finished => None,
            _ => self
                .question_set
                .get_question(round.index)
                .map(|q| QuestionView::new(round.index, self.question_set.question_count(), q)),
        };

        RoundView {
            phase: round.phase,
            index: round.index,
            question_count: self.question_set.question_count(),
            question,
            timer: round.timer.snapshot(),
            answered: round.answers.answered_among(&players),
            players: players.len(),
        }
    }

    /// Initial message for a fresh connection
    pub async fn welcome(&self, role: Role) -> ServerMessage {
        let round = self.round_view().await;
        let nicknames = self.nicknames.read().await.snapshot();
        let scores = self.scores.read().await.snapshot();

        ServerMessage::Welcome {
            protocol: PROTOCOL_VERSION.to_string(),
            role,
            round,
            nicknames,
            scores,
            server_now: chrono::Utc::now().to_rfc3339(),
        }
    }
}
