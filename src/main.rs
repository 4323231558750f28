use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizsync::bank::{load_validated, JsonQuestionBank, QuestionBank, SampleQuestionBank};
use quizsync::{api, auth, broadcast, config::QuizConfig, state::AppState, ws};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizsync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quizsync...");

    let config = QuizConfig::from_env();

    let bank: Box<dyn QuestionBank> = match &config.question_dir {
        Some(dir) => Box::new(JsonQuestionBank::new(dir.clone())),
        None => Box::new(SampleQuestionBank),
    };
    let question_set = match load_validated(bank.as_ref(), &config.question_set).await {
        Ok(set) => set,
        Err(e) => {
            tracing::error!(
                "Failed to load question set '{}' from {}: {}",
                config.question_set,
                bank.name(),
                e
            );
            std::process::exit(1);
        }
    };

    let host_auth = Arc::new(auth::HostAuth::from_config(&config));
    let port = config.port;
    let state = Arc::new(AppState::new(config, question_set));
    tracing::info!("Session {} ready", state.session_id);

    // Fixed-rate round timer
    broadcast::spawn_round_ticker(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            host_auth,
            auth::host_ws_auth_middleware,
        ));

    let app = Router::new()
        .merge(ws_routes)
        .merge(api::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
