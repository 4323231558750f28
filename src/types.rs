use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type SessionId = String;
pub type QuestionSetId = String;

/// Number of options every question carries
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn new(text: &str, options: [&str; OPTION_COUNT], correct_index: usize) -> Self {
        Self {
            text: text.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_index,
        }
    }

    /// Non-empty text, exactly four non-empty options, correct index in range
    pub fn is_valid(&self) -> bool {
        if self.text.trim().is_empty() {
            return false;
        }
        if self.options.len() != OPTION_COUNT {
            return false;
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return false;
        }
        self.correct_index < OPTION_COUNT
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionSet {
    pub set_name: String,
    pub questions: Vec<Question>,
    /// Time limit per question in seconds (<= 0 means "use the timer default")
    #[serde(default)]
    pub time_per_question: f64,
}

impl QuestionSet {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Returns None once the index runs past the end of the set
    pub fn get_question(&self, index: u32) -> Option<&Question> {
        self.questions.get(index as usize)
    }

    pub fn is_valid(&self) -> bool {
        !self.questions.is_empty() && self.questions.iter().all(Question::is_valid)
    }
}

/// Server-side phase of the current round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundPhase {
    Lobby,
    Active,
    Locked,
    Revealing,
    LeaderboardWait,
    LeaderboardShown,
    Finished,
}

impl RoundPhase {
    /// Check if a phase transition is valid
    pub fn can_transition_to(&self, to: RoundPhase) -> bool {
        use RoundPhase::*;

        match (self, to) {
            (Lobby, Active) => true,
            (Active, Locked) => true,
            (Locked, Revealing) => true,
            (Revealing, LeaderboardWait) => true,
            (LeaderboardWait, LeaderboardShown) => true,
            // Next round, or the end of the set
            (LeaderboardShown, Active) => true,
            (LeaderboardShown, Finished) => true,
            // Start of a set that turns out to have nothing to play
            (Lobby, Finished) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Player,
    Observer,
}

/// Who opens the gate between LeaderboardShown and the next round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdvancePolicy {
    /// Only the host's Next command advances
    #[default]
    Host,
    /// Every connected player must acknowledge (host may still override)
    AllReady,
}

/// What caused the round to lock
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LockTrigger {
    AllAnswered,
    TimerExpired,
}

/// Rendered timer state pushed to observers every tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimerSnapshot {
    pub remaining: f64,
    pub duration: f64,
}

impl TimerSnapshot {
    /// `M:SS` countdown text
    pub fn display(&self) -> String {
        let secs = self.remaining.max(0.0).ceil() as u64;
        format!("{}:{:02}", secs / 60, secs % 60)
    }

    /// Remaining fraction for a progress bar, 0.0..=1.0
    pub fn fraction(&self) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.remaining / self.duration).clamp(0.0, 1.0)
    }
}

/// Question as shown to players (the correct index is withheld)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionView {
    pub index: u32,
    pub count: usize,
    pub text: String,
    pub options: Vec<String>,
}

impl QuestionView {
    pub fn new(index: u32, count: usize, question: &Question) -> Self {
        Self {
            index,
            count,
            text: question.text.clone(),
            options: question.options.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardRow {
    pub player_id: PlayerId,
    pub nickname: String,
    pub score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_validation() {
        let q = Question::new("Capital?", ["London", "Paris", "Berlin", "Madrid"], 1);
        assert!(q.is_valid());

        let mut bad = q.clone();
        bad.options.pop();
        assert!(!bad.is_valid());

        let mut bad = q.clone();
        bad.options[2] = "  ".to_string();
        assert!(!bad.is_valid());

        let mut bad = q.clone();
        bad.correct_index = 4;
        assert!(!bad.is_valid());

        let mut bad = q;
        bad.text = String::new();
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_question_set_lookup_past_end() {
        let set = QuestionSet {
            set_name: "One".to_string(),
            questions: vec![Question::new("Q", ["a", "b", "c", "d"], 0)],
            time_per_question: 30.0,
        };
        assert!(set.is_valid());
        assert!(set.get_question(0).is_some());
        assert!(set.get_question(1).is_none());

        let empty = QuestionSet {
            set_name: "Empty".to_string(),
            questions: vec![],
            time_per_question: 30.0,
        };
        assert!(!empty.is_valid());
    }

    #[test]
    fn test_phase_transitions() {
        use RoundPhase::*;
        assert!(Lobby.can_transition_to(Active));
        assert!(Active.can_transition_to(Locked));
        assert!(LeaderboardShown.can_transition_to(Finished));
        assert!(!Active.can_transition_to(Revealing));
        assert!(!Locked.can_transition_to(Active));
        assert!(!Finished.can_transition_to(Active));
    }

    #[test]
    fn test_timer_snapshot_display() {
        let snap = TimerSnapshot {
            remaining: 65.2,
            duration: 90.0,
        };
        assert_eq!(snap.display(), "1:06");
        assert!((snap.fraction() - 65.2 / 90.0).abs() < 1e-9);

        let done = TimerSnapshot {
            remaining: 0.0,
            duration: 0.0,
        };
        assert_eq!(done.display(), "0:00");
        assert_eq!(done.fraction(), 0.0);
    }
}
