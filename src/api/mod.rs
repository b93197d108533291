//! API module - HTTP handlers and routes

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Header carrying the shared auth key
pub const AUTH_HEADER: &str = "x-auth-key";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/run/:command_name", post(handlers::run_command))
}
