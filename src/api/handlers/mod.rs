//! HTTP handlers module

mod run;

pub use self::run::*;

use axum::{extract::State, response::IntoResponse, Json};

use crate::models::{HealthResponse, RootResponse};
use crate::state::AppState;

/// Static acknowledgement
pub async fn root() -> impl IntoResponse {
    Json(RootResponse {
        message: "Command server is running.",
    })
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "pc-remote".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        device_state: state.device.state().as_str().to_string(),
    })
}
