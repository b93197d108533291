//! Error handling module

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::device::SyncError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Command not found even after reloading config: {0}")]
    CommandNotFound(String),

    #[error("Command failed: {stderr}")]
    CommandFailed { stderr: String },

    #[error("Config reload failed: {0}")]
    ConfigReload(String),

    #[error(transparent)]
    Device(#[from] SyncError),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::CommandNotFound(_) => "command_not_found",
            AppError::CommandFailed { .. } => "command_failed",
            AppError::ConfigReload(_) => "config_reload_failed",
            AppError::Device(e) => e.kind(),
            AppError::InternalError(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::CommandNotFound(_) => StatusCode::NOT_FOUND,
            AppError::CommandFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigReload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Device(e) => match e {
                SyncError::NoPriorSwitch => StatusCode::CONFLICT,
                SyncError::DeviceConnection(_)
                | SyncError::DeviceRequest(_)
                | SyncError::PairingRejected(_) => StatusCode::BAD_GATEWAY,
                SyncError::PairingTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                SyncError::SourceNotFound(_)
                | SyncError::ProfileSwitchFailed { .. }
                | SyncError::PairingStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::CommandNotFound(_) => {
                "Command not found even after reloading config.".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "kind": self.kind(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
