//! Question bank collaborators
//!
//! The round loop only ever reads question sets. Loading and validation live
//! behind the `QuestionBank` trait so the server can be pointed at a directory
//! of JSON files or run with the built-in sample set.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::{BankError, BankResult};
use crate::types::{Question, QuestionSet};

/// Id under which the built-in set is served
pub const SAMPLE_SET_ID: &str = "sample";

/// Trait that all question sources must implement
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Load a question set by id
    async fn load_set(&self, id: &str) -> BankResult<QuestionSet>;

    /// Whether a loaded set can be played
    fn validate(&self, set: &QuestionSet) -> bool {
        set.is_valid()
    }

    /// Get the name of this bank
    fn name(&self) -> &str;
}

/// Load a set and reject it if it fails validation, so malformed data never
/// reaches the round loop
pub async fn load_validated(bank: &dyn QuestionBank, id: &str) -> BankResult<QuestionSet> {
    let set = bank.load_set(id).await?;
    if !bank.validate(&set) {
        tracing::error!("Question set {} from {} failed validation", id, bank.name());
        return Err(BankError::Invalid(id.to_string()));
    }
    tracing::info!(
        "Loaded question set '{}' ({} questions) from {}",
        set.set_name,
        set.question_count(),
        bank.name()
    );
    Ok(set)
}

/// Reads `<dir>/<id>.json`
pub struct JsonQuestionBank {
    dir: PathBuf,
}

impl JsonQuestionBank {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl QuestionBank for JsonQuestionBank {
    async fn load_set(&self, id: &str) -> BankResult<QuestionSet> {
        // Ids are bare file stems
        if id.is_empty() || id.contains(|c: char| c == '/' || c == '\\') || id.contains("..") {
            return Err(BankError::NotFound(id.to_string()));
        }

        let path = self.dir.join(format!("{}.json", id));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BankError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let set: QuestionSet = serde_json::from_str(&raw)?;
        tracing::debug!("Read question set {} from {}", id, path.display());
        Ok(set)
    }

    fn name(&self) -> &str {
        "json"
    }
}

/// In-memory bank serving the sample questions
#[derive(Default)]
pub struct SampleQuestionBank;

impl SampleQuestionBank {
    pub fn sample_set() -> QuestionSet {
        QuestionSet {
            set_name: "Sample Quiz Questions".to_string(),
            questions: vec![
                Question::new(
                    "What is the capital of France?",
                    ["London", "Paris", "Berlin", "Madrid"],
                    1,
                ),
                Question::new(
                    "Which planet is known as the Red Planet?",
                    ["Venus", "Mars", "Jupiter", "Saturn"],
                    1,
                ),
                Question::new("What is 2 + 2?", ["3", "4", "5", "6"], 1),
                Question::new(
                    "In which year did World War II end?",
                    ["1944", "1945", "1946", "1947"],
                    1,
                ),
                Question::new(
                    "What is the largest mammal in the world?",
                    ["Elephant", "Blue Whale", "Giraffe", "Hippopotamus"],
                    1,
                ),
            ],
            time_per_question: 60.0,
        }
    }
}

#[async_trait]
impl QuestionBank for SampleQuestionBank {
    async fn load_set(&self, id: &str) -> BankResult<QuestionSet> {
        if id == SAMPLE_SET_ID {
            Ok(Self::sample_set())
        } else {
            Err(BankError::NotFound(id.to_string()))
        }
    }

    fn name(&self) -> &str {
        "sample"
    }
}
