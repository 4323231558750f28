use crate::types::RoundPhase;

/// Errors raised at the round state machine boundary.
///
/// None of these are fatal to the round loop: handlers turn them into
/// `ServerMessage::Error` replies and background tasks log them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuizError {
    #[error("Not accepting this action during {phase:?}")]
    NotAccepting { phase: RoundPhase },

    #[error("Already answered this round")]
    AlreadyAnswered,

    #[error("Unknown or disconnected player")]
    UnknownPlayer,

    #[error("Option index {index} is out of range")]
    InvalidOption { index: usize },

    #[error("At least one player must join before starting")]
    NotEnoughPlayers,

    #[error("Invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: RoundPhase, to: RoundPhase },

    #[error("Stale round: expected {expected}, got {got}")]
    RoundMismatch { expected: u32, got: u32 },

    #[error("Not permitted to {action}")]
    Unauthorized { action: String },

    #[error("The quiz has finished")]
    Finished,
}

impl QuizError {
    /// Stable wire code for `ServerMessage::Error`
    pub fn code(&self) -> &'static str {
        match self {
            QuizError::NotAccepting { .. } => "NOT_ACCEPTING",
            QuizError::AlreadyAnswered => "ALREADY_ANSWERED",
            QuizError::UnknownPlayer => "UNKNOWN_PLAYER",
            QuizError::InvalidOption { .. } => "INVALID_OPTION",
            QuizError::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            QuizError::InvalidTransition { .. } => "INVALID_TRANSITION",
            QuizError::RoundMismatch { .. } => "ROUND_MISMATCH",
            QuizError::Unauthorized { .. } => "UNAUTHORIZED",
            QuizError::Finished => "FINISHED",
        }
    }
}

pub type QuizResult<T> = Result<T, QuizError>;

/// Errors that can occur while loading question sets
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("Question set not found: {0}")]
    NotFound(String),

    #[error("Failed to read question set: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse question set: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Question set {0} failed validation")]
    Invalid(String),
}

pub type BankResult<T> = Result<T, BankError>;
