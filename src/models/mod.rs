//! Data models for API responses

use serde::Serialize;

/// Result of a dispatched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub message: String,
    /// Trimmed stdout for shell commands; `None` for device switches
    pub output: Option<String>,
}

impl ExecutionOutcome {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            output: None,
        }
    }

    pub fn with_output(message: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            output: Some(output.into()),
        }
    }
}

/// Body of a successful `POST /run/:command_name`
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl From<ExecutionOutcome> for RunResponse {
    fn from(outcome: ExecutionOutcome) -> Self {
        Self {
            status: "success",
            message: outcome.message,
            output: outcome.output,
        }
    }
}

/// Body of `GET /`
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub device_state: String,
}
