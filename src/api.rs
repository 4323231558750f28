//! Read-only HTTP endpoints for dashboards and health checks.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::protocol::RoundView;
use crate::state::AppState;
use crate::types::LeaderboardRow;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub session_id: String,
    pub question_set: String,
}

/// Current round snapshot.
///
/// GET /api/round
pub async fn get_round(State(state): State<Arc<AppState>>) -> Json<RoundView> {
    Json(state.round_view().await)
}

/// Leaderboard rows in scores order.
///
/// GET /api/leaderboard
pub async fn get_leaderboard(State(state): State<Arc<AppState>>) -> Json<Vec<LeaderboardRow>> {
    Json(state.leaderboard().await)
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        session_id: state.session_id.clone(),
        question_set: state.question_set.set_name.clone(),
    })
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/round", get(get_round))
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::SampleQuestionBank;
    use crate::config::QuizConfig;
    use crate::types::RoundPhase;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(state: Arc<AppState>) -> Router {
        routes().with_state(state)
    }

    async fn get_json(app: Router, uri: &str) -> serde_json::Value {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_round_endpoint() {
        let state = Arc::new(AppState::new(
            QuizConfig::default(),
            SampleQuestionBank::sample_set(),
        ));
        state.join_player("Alice").await.unwrap();
        state.start_game().await.unwrap();

        let json = get_json(app(state), "/api/round").await;
        let view: RoundView = serde_json::from_value(json).unwrap();
        assert_eq!(view.phase, RoundPhase::Active);
        assert_eq!(view.index, 0);
        assert_eq!(view.players, 1);
        assert_eq!(view.answered, 0);
        assert_eq!(
            view.question.map(|q| q.text),
            Some("What is the capital of France?".to_string())
        );
    }

    #[tokio::test]
    async fn test_leaderboard_endpoint() {
        let state = Arc::new(AppState::new(
            QuizConfig::default(),
            SampleQuestionBank::sample_set(),
        ));
        state.join_player("Alice").await.unwrap();
        state.join_player("Bob").await.unwrap();

        let json = get_json(app(state), "/api/leaderboard").await;
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["nickname"], "Alice");
        assert_eq!(rows[1]["score"], 0);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = Arc::new(AppState::new(
            QuizConfig::default(),
            SampleQuestionBank::sample_set(),
        ));
        let json = get_json(app(state), "/health").await;
        assert_eq!(json["status"], "ok");
    }
}
