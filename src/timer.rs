//! Server-owned round countdown
//!
//! The timer itself is plain data driven by `tick`; the fixed-rate scheduler
//! lives in `broadcast::spawn_round_ticker`. Observers only ever see
//! `TimerSnapshot`s, never the running flag.

use std::time::Duration;

use crate::types::TimerSnapshot;

/// Result of advancing the timer by one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerTick {
    /// Not running; nothing to push
    Idle,
    /// Still counting down
    Running(TimerSnapshot),
    /// Reached zero on this tick (reported exactly once per start)
    Completed(TimerSnapshot),
}

#[derive(Debug, Clone)]
pub struct RoundTimer {
    default_duration: f64,
    duration: f64,
    remaining: f64,
    running: bool,
}

impl RoundTimer {
    pub fn new(default_duration: f64) -> Self {
        Self {
            default_duration,
            duration: default_duration,
            remaining: default_duration,
            running: false,
        }
    }

    /// Start counting down; a missing or non-positive duration uses the default
    pub fn start(&mut self, custom_duration: Option<f64>) {
        self.duration = match custom_duration {
            Some(d) if d > 0.0 => d,
            _ => self.default_duration,
        };
        self.remaining = self.duration;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Stop and restore the full duration without completing
    pub fn reset(&mut self) {
        self.remaining = self.duration;
        self.running = false;
    }

    pub fn tick(&mut self, elapsed: Duration) -> TimerTick {
        if !self.running {
            return TimerTick::Idle;
        }

        self.remaining -= elapsed.as_secs_f64();
        if self.remaining <= 0.0 {
            self.running = false;
            self.remaining = 0.0;
            return TimerTick::Completed(self.snapshot());
        }

        TimerTick::Running(self.snapshot())
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            remaining: self.remaining,
            duration: self.duration,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }
}
