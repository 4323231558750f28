use crate::reveal::Reveal;
use crate::signal::LeaderboardTrigger;
use crate::store::{Delta, StoreSnapshot};
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind this connection to a new player
    Join {
        nickname: String,
    },
    Leave,
    SubmitAnswer {
        round: u32,
        option: usize,
    },
    /// Leaderboard rendered, ready for the next round
    Ready {
        round: u32,
    },
    // Host-only messages
    HostStartGame,
    /// Open the ready gate regardless of acknowledgements
    HostNext,
    HostTimer {
        action: TimerAction,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerAction {
    Start {
        #[serde(default)]
        seconds: Option<f64>,
    },
    Stop,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        role: Role,
        round: RoundView,
        nicknames: StoreSnapshot<PlayerId, String>,
        scores: StoreSnapshot<PlayerId, u32>,
        server_now: String,
    },
    /// Sent to the joining connection only
    Joined {
        player: Player,
    },
    PlayerJoined {
        player_id: PlayerId,
        nickname: String,
        player_count: usize,
    },
    PlayerLeft {
        player_id: PlayerId,
        player_count: usize,
    },
    Phase {
        phase: RoundPhase,
        round: u32,
        server_now: String,
    },
    Question {
        question: QuestionView,
        timer: TimerSnapshot,
    },
    Timer {
        remaining: f64,
        duration: f64,
    },
    AnswerAccepted {
        round: u32,
        option: usize,
    },
    /// Broadcast progress without revealing choices
    AnswerCount {
        round: u32,
        answered: usize,
        players: usize,
    },
    Locked {
        round: u32,
        trigger: LockTrigger,
    },
    /// Targeted at exactly one player
    Reveal {
        reveal: Reveal,
    },
    NicknameChanged {
        delta: Delta<PlayerId, String>,
    },
    ScoreChanged {
        delta: Delta<PlayerId, u32>,
    },
    /// Full store contents after a lagged subscription
    StoreResync {
        nicknames: StoreSnapshot<PlayerId, String>,
        scores: StoreSnapshot<PlayerId, u32>,
    },
    Leaderboard {
        round: u32,
        rows: Vec<LeaderboardRow>,
        trigger: LeaderboardTrigger,
    },
    ReadyProgress {
        round: u32,
        ready: usize,
        expected: usize,
    },
    GameOver {
        rows: Vec<LeaderboardRow>,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn error(err: &crate::error::QuizError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

/// Snapshot of the round state machine for late joiners and the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundView {
    pub phase: RoundPhase,
    pub index: u32,
    pub question_count: usize,
    pub question: Option<QuestionView>,
    pub timer: TimerSnapshot,
    pub answered: usize,
    pub players: usize,
}
