use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::AppConfig,
    error::ServiceError,
    protocol::{Command, Reply},
    worker::WorkerHandle,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub worker: WorkerHandle,
}

pub fn build_router(config: Arc<AppConfig>, worker: WorkerHandle) -> Router {
    let state = AppState { config, worker };

    Router::new()
        .route("/health", get(health))
        .route("/command", post(command))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health(State(state): State<AppState>) -> String {
    format!("ok ({})", state.config.version_tag)
}

async fn command(
    State(state): State<AppState>,
    Json(command): Json<Command>,
) -> Result<Json<Reply>, ServiceError> {
    info!(command = command.name(), "message received from page");
    let reply = state.worker.send(command).await?;
    Ok(Json(reply))
}
