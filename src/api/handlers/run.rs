//! Command execution handler

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use crate::api::AUTH_HEADER;
use crate::error::AppError;
use crate::models::RunResponse;
use crate::state::AppState;

/// POST /run/:command_name
pub async fn run_command(
    State(state): State<AppState>,
    Path(command_name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RunResponse>, AppError> {
    let supplied_key = headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // Runs on its own task: a caller hanging up must not abort a switch midway
    let dispatcher = state.dispatcher.clone();
    let task = tokio::spawn(async move {
        dispatcher
            .dispatch(&command_name, supplied_key.as_deref())
            .await
    });

    let outcome = task
        .await
        .map_err(|e| AppError::InternalError(format!("dispatch task failed: {}", e)))??;

    Ok(Json(outcome.into()))
}
