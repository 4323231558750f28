//! Per-player round outcome
//!
//! Each connected player gets exactly one `Reveal` per round, carrying their
//! own choice (or none) and the correct option. Highlight colours are derived
//! from it so renderers only receive computed display values.

use serde::{Deserialize, Serialize};

use crate::types::OPTION_COUNT;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevealOutcome {
    NoAnswer,
    Correct,
    Wrong,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    Neutral,
    Correct,
    Wrong,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reveal {
    pub round: u32,
    /// None is the "no answer" sentinel
    pub chosen: Option<usize>,
    pub correct_index: usize,
}

impl Reveal {
    pub fn new(round: u32, chosen: Option<usize>, correct_index: usize) -> Self {
        Self {
            round,
            chosen,
            correct_index,
        }
    }

    pub fn outcome(&self) -> RevealOutcome {
        match self.chosen {
            None => RevealOutcome::NoAnswer,
            Some(c) if c == self.correct_index => RevealOutcome::Correct,
            Some(_) => RevealOutcome::Wrong,
        }
    }

    /// Highlight per option: the correct option is always marked, a wrong
    /// pick is flagged on top of it
    pub fn highlights(&self) -> [Highlight; OPTION_COUNT] {
        let mut highlights = [Highlight::Neutral; OPTION_COUNT];
        if let Some(chosen) = self.chosen.filter(|c| *c < OPTION_COUNT) {
            if chosen != self.correct_index {
                highlights[chosen] = Highlight::Wrong;
            }
        }
        if self.correct_index < OPTION_COUNT {
            highlights[self.correct_index] = Highlight::Correct;
        }
        highlights
    }

    /// Points this reveal is worth
    pub fn points(&self) -> u32 {
        match self.outcome() {
            RevealOutcome::Correct => 1,
            _ => 0,
        }
    }
}
