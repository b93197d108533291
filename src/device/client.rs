//! Device client capability - the TV remote-control operations the
//! synchronizer relies on

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pairing::PairingRecord;

/// An external input as enumerated by the TV.
///
/// Only meaningful within the session that listed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    /// Device-side handle (`HDMI_1`, ...)
    pub id: String,
    pub label: String,
    #[serde(rename = "appId")]
    pub application_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingResult {
    /// Stored credential was accepted without a prompt
    Registered,
    /// User accepted the on-screen prompt
    Confirmed,
}

#[derive(Error, Debug, Clone)]
pub enum DeviceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Pairing rejected: {0}")]
    PairingRejected(String),

    #[error("No pairing answer within {0:?}")]
    PairingTimeout(Duration),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Device error: {0}")]
    Protocol(String),
}

/// Called when the TV asks the user to confirm the pairing
pub type PairingPrompt<'a> = &'a (dyn Fn() + Send + Sync);

#[async_trait]
pub trait DeviceClient: Send {
    async fn connect(&mut self) -> Result<(), DeviceError>;

    /// Run the pairing handshake; returns the (possibly refreshed) record
    async fn pair(
        &mut self,
        record: PairingRecord,
        on_prompt: PairingPrompt<'_>,
    ) -> Result<(PairingResult, PairingRecord), DeviceError>;

    async fn list_sources(&mut self) -> Result<Vec<InputSource>, DeviceError>;

    /// Application id of whatever the TV is currently showing
    async fn current_application(&mut self) -> Result<String, DeviceError>;

    async fn set_source(&mut self, source: &InputSource) -> Result<(), DeviceError>;
}
