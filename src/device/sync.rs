//! Device synchronizer - owns the TV session and drives input/profile switches
//!
//! All device work is funnelled through one mutex, so the startup handshake,
//! `switch_to_device` and `switch_back` never interleave. Shell commands do
//! not touch this lock.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::client::{DeviceClient, DeviceError, InputSource, PairingResult};
use super::pairing::PairingStore;
use super::profile::ProfileSwitcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Disconnected,
    Connecting,
    Pairing,
    Ready,
    SwitchingToDevice,
    SwitchingBack,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Disconnected => "disconnected",
            SyncState::Connecting => "connecting",
            SyncState::Pairing => "pairing",
            SyncState::Ready => "ready",
            SyncState::SwitchingToDevice => "switching_to_device",
            SyncState::SwitchingBack => "switching_back",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Input source not found: {0}")]
    SourceNotFound(String),

    #[error("No prior switch to the TV in this session")]
    NoPriorSwitch,

    #[error("Device connection error: {0}")]
    DeviceConnection(String),

    #[error("Device request failed: {0}")]
    DeviceRequest(String),

    #[error("Pairing rejected by the TV: {0}")]
    PairingRejected(String),

    #[error("Pairing not confirmed: {0}")]
    PairingTimeout(String),

    #[error("Profile switch to {profile} failed: {reason}")]
    ProfileSwitchFailed {
        profile: String,
        reason: String,
        exit_status: Option<i32>,
    },

    #[error("Pairing store error: {0}")]
    PairingStore(String),
}

impl SyncError {
    /// Machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::SourceNotFound(_) => "source_not_found",
            SyncError::NoPriorSwitch => "no_prior_switch",
            SyncError::DeviceConnection(_) => "device_connection_error",
            SyncError::DeviceRequest(_) => "device_request_failed",
            SyncError::PairingRejected(_) => "pairing_rejected",
            SyncError::PairingTimeout(_) => "pairing_timeout",
            SyncError::ProfileSwitchFailed { .. } => "profile_switch_failed",
            SyncError::PairingStore(_) => "pairing_store_error",
        }
    }
}

impl From<DeviceError> for SyncError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Connection(msg) => SyncError::DeviceConnection(msg),
            DeviceError::Timeout(uri) => {
                SyncError::DeviceConnection(format!("request timed out: {}", uri))
            }
            DeviceError::PairingRejected(msg) => SyncError::PairingRejected(msg),
            DeviceError::PairingTimeout(after) => {
                SyncError::PairingTimeout(format!("TV did not answer within {:?}", after))
            }
            DeviceError::Protocol(msg) => SyncError::DeviceRequest(msg),
        }
    }
}

/// Switch parameters, fixed for the lifetime of the session
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub input_label: String,
    pub device_profile: String,
    pub desk_profile: String,
    pub settle_delay: Duration,
}

struct Session {
    client: Box<dyn DeviceClient>,
    store: PairingStore,
    started: bool,
    startup_error: Option<SyncError>,
    sources: Vec<InputSource>,
    /// Source showing when the session came up; informational only
    initial_source: Option<InputSource>,
    /// Source to restore on switch-back; only `switch_to_device` writes it
    saved_source: Option<InputSource>,
}

impl Session {
    fn by_label(&self, label: &str) -> Option<&InputSource> {
        self.sources.iter().find(|s| s.label == label)
    }

    fn by_application(&self, app_id: &str) -> Option<&InputSource> {
        self.sources.iter().find(|s| s.application_id == app_id)
    }

    fn ensure_usable(&self) -> Result<(), SyncError> {
        if let Some(e) = &self.startup_error {
            return Err(e.clone());
        }
        if !self.started {
            return Err(SyncError::DeviceConnection(
                "device session has not been started".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct DeviceSynchronizer {
    session: Arc<Mutex<Session>>,
    profiles: Arc<dyn ProfileSwitcher>,
    settings: SyncSettings,
    state: watch::Sender<SyncState>,
}

impl DeviceSynchronizer {
    pub fn new(
        client: Box<dyn DeviceClient>,
        store: PairingStore,
        profiles: Arc<dyn ProfileSwitcher>,
        settings: SyncSettings,
    ) -> Self {
        let session = Session {
            client,
            store,
            started: false,
            startup_error: None,
            sources: Vec::new(),
            initial_source: None,
            saved_source: None,
        };
        let (state, _) = watch::channel(SyncState::Disconnected);

        Self {
            session: Arc::new(Mutex::new(session)),
            profiles,
            settings,
            state,
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SyncState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!("[Device] {} -> {}", previous.as_str(), state.as_str());
        }
    }

    /// Run the startup handshake on a background task.
    ///
    /// The session lock is taken before this returns, so any switch request
    /// arriving afterwards waits for the handshake to finish.
    pub fn spawn_startup(self: &Arc<Self>) -> JoinHandle<Result<(), SyncError>> {
        let this = Arc::clone(self);
        let guard = self.session.clone().try_lock_owned();

        tokio::spawn(async move {
            let mut session = match guard {
                Ok(guard) => guard,
                Err(_) => this.session.clone().lock_owned().await,
            };
            this.startup(&mut session).await
        })
    }

    async fn startup(&self, session: &mut Session) -> Result<(), SyncError> {
        if session.started || session.startup_error.is_some() {
            return session.ensure_usable();
        }

        match self.handshake(session).await {
            Ok(()) => {
                session.started = true;
                self.set_state(SyncState::Ready);
                tracing::info!(
                    "[Device] Session ready: {} sources, current {}",
                    session.sources.len(),
                    session
                        .initial_source
                        .as_ref()
                        .map(|s| s.label.as_str())
                        .unwrap_or("<unrecognized>")
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("[Device] Startup failed: {}", e);
                session.startup_error = Some(e.clone());
                self.set_state(SyncState::Disconnected);
                Err(e)
            }
        }
    }

    async fn handshake(&self, session: &mut Session) -> Result<(), SyncError> {
        let record = session
            .store
            .load()
            .await
            .map_err(|e| SyncError::PairingStore(e.to_string()))?;

        self.set_state(SyncState::Connecting);
        session.client.connect().await?;

        self.set_state(SyncState::Pairing);
        let on_prompt = || tracing::warn!("[Pairing] Please accept the connection on the TV!");
        let (result, record) = session.client.pair(record, &on_prompt).await?;
        match result {
            PairingResult::Registered => tracing::info!("[Pairing] Registration successful"),
            PairingResult::Confirmed => tracing::info!("[Pairing] Pairing confirmed on the TV"),
        }

        // Saved even when unchanged
        session
            .store
            .save(&record)
            .await
            .map_err(|e| SyncError::PairingStore(e.to_string()))?;

        session.sources = session.client.list_sources().await?;

        let app_id = session.client.current_application().await?;
        session.initial_source = session.by_application(&app_id).cloned();
        if session.initial_source.is_none() {
            tracing::info!("[Device] Current application {} is not a known input", app_id);
        }

        Ok(())
    }

    /// Show the PC on the TV, then apply the TV monitor profile.
    pub async fn switch_to_device(&self) -> Result<(), SyncError> {
        let mut session = self.session.lock().await;
        session.ensure_usable()?;

        self.set_state(SyncState::SwitchingToDevice);
        let result = self.run_switch_to_device(&mut session).await;
        self.finish(&result);
        result
    }

    async fn run_switch_to_device(&self, session: &mut Session) -> Result<(), SyncError> {
        let target = session
            .by_label(&self.settings.input_label)
            .cloned()
            .ok_or_else(|| SyncError::SourceNotFound(self.settings.input_label.clone()))?;

        let app_id = session.client.current_application().await?;
        let previous = session.by_application(&app_id).cloned().ok_or_else(|| {
            SyncError::SourceNotFound(format!(
                "current application {} is not a known input",
                app_id
            ))
        })?;

        session.client.set_source(&target).await?;
        session.saved_source = Some(previous.clone());
        tracing::info!("[Device] Switched {} -> {}", previous.label, target.label);

        tokio::time::sleep(self.settings.settle_delay).await;

        self.apply_profile(&self.settings.device_profile).await
    }

    /// Restore the desk profile, then the source saved by the last switch to the TV.
    pub async fn switch_back(&self) -> Result<(), SyncError> {
        let mut session = self.session.lock().await;
        session.ensure_usable()?;

        let saved = session.saved_source.clone().ok_or(SyncError::NoPriorSwitch)?;

        self.set_state(SyncState::SwitchingBack);
        let result = self.run_switch_back(&mut session, &saved).await;
        self.finish(&result);
        result
    }

    async fn run_switch_back(
        &self,
        session: &mut Session,
        saved: &InputSource,
    ) -> Result<(), SyncError> {
        self.apply_profile(&self.settings.desk_profile).await?;

        session.client.set_source(saved).await?;
        tracing::info!("[Device] Restored input {}", saved.label);
        Ok(())
    }

    async fn apply_profile(&self, profile: &str) -> Result<(), SyncError> {
        match self.profiles.apply(profile).await {
            Ok(0) => Ok(()),
            Ok(code) => Err(SyncError::ProfileSwitchFailed {
                profile: profile.to_string(),
                reason: format!("switcher exited with status {}", code),
                exit_status: Some(code),
            }),
            Err(e) => Err(SyncError::ProfileSwitchFailed {
                profile: profile.to_string(),
                reason: e.to_string(),
                exit_status: None,
            }),
        }
    }

    fn finish(&self, result: &Result<(), SyncError>) {
        match result {
            Err(SyncError::DeviceConnection(msg)) => {
                tracing::error!("[Device] Connection lost: {} (restart required)", msg);
                self.set_state(SyncState::Disconnected);
            }
            Err(e) => {
                tracing::warn!("[Device] Switch aborted: {}", e);
                self.set_state(SyncState::Ready);
            }
            Ok(()) => self.set_state(SyncState::Ready),
        }
    }
}

#[cfg(test)]
impl DeviceSynchronizer {
    /// Connect, pair, enumerate sources and note the current one.
    pub async fn start(&self) -> Result<(), SyncError> {
        let mut session = self.session.lock().await;
        self.startup(&mut session).await
    }

    pub async fn saved_source(&self) -> Option<InputSource> {
        self.session.lock().await.saved_source.clone()
    }

    pub async fn initial_source(&self) -> Option<InputSource> {
        self.session.lock().await.initial_source.clone()
    }
}
