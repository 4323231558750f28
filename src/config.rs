//! Runtime configuration loaded from the environment

use std::path::PathBuf;
use std::time::Duration;

use crate::bank::SAMPLE_SET_ID;
use crate::types::AdvancePolicy;

#[derive(Debug, Clone)]
pub struct QuizConfig {
    pub port: u16,
    /// Directory of `<id>.json` question sets (None = built-in sample set)
    pub question_dir: Option<PathBuf>,
    pub question_set: String,
    /// Timer duration used when a set has no positive time limit
    pub default_round_secs: f64,
    /// Fixed scheduler tick for the round timer
    pub tick: Duration,
    pub leaderboard_timeout: Duration,
    pub advance_policy: AdvancePolicy,
    /// Key `role=host` connections must present (None = host auth disabled)
    pub host_key: Option<String>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            port: 6574,
            question_dir: None,
            question_set: SAMPLE_SET_ID.to_string(),
            default_round_secs: 10.0,
            tick: Duration::from_millis(100),
            leaderboard_timeout: Duration::from_secs(5),
            advance_policy: AdvancePolicy::Host,
            host_key: None,
        }
    }
}

/// Read a trimmed, non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse an environment variable, falling back to `default` on absence or garbage
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env_string(key) {
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring unparseable {}={:?}, using default", key, raw);
                default
            }
        },
        None => default,
    }
}

impl QuizConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let advance_policy = match env_string("QUIZ_ADVANCE_POLICY").as_deref() {
            Some("all_ready") | Some("all-ready") => AdvancePolicy::AllReady,
            Some("host") | None => AdvancePolicy::Host,
            Some(other) => {
                tracing::warn!("Unknown QUIZ_ADVANCE_POLICY {:?}, using host", other);
                AdvancePolicy::Host
            }
        };

        let default_round_secs = env_parse("QUIZ_DEFAULT_ROUND_SECS", defaults.default_round_secs);
        let default_round_secs = if default_round_secs > 0.0 {
            default_round_secs
        } else {
            tracing::warn!("QUIZ_DEFAULT_ROUND_SECS must be positive, using default");
            defaults.default_round_secs
        };

        let tick_ms: u64 = env_parse("QUIZ_TICK_MS", defaults.tick.as_millis() as u64);
        let timeout_secs: u64 = env_parse(
            "QUIZ_LEADERBOARD_TIMEOUT_SECS",
            defaults.leaderboard_timeout.as_secs(),
        );

        let host_key = env_string("QUIZ_HOST_KEY");
        if host_key.is_none() {
            tracing::warn!("QUIZ_HOST_KEY not set - any connection may act as host!");
        }

        let config = Self {
            port: env_parse("QUIZ_PORT", defaults.port),
            question_dir: env_string("QUIZ_QUESTION_DIR").map(PathBuf::from),
            question_set: env_string("QUIZ_QUESTION_SET").unwrap_or(defaults.question_set),
            default_round_secs,
            tick: Duration::from_millis(tick_ms.max(1)),
            leaderboard_timeout: Duration::from_secs(timeout_secs),
            advance_policy,
            host_key,
        };

        tracing::info!(
            port = config.port,
            question_set = %config.question_set,
            tick_ms = config.tick.as_millis() as u64,
            ?config.advance_policy,
            "Quiz config loaded"
        );
        config
    }
}
