//! In-memory fakes for the capability traits, shared by the unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::commands::{ShellOutput, ShellRunner};
use crate::config::{
    ConfigError, ConfigSnapshot, ConfigSource, DeviceConfig, ServerConfig, ShellCommand,
};
use crate::device::client::{
    DeviceClient, DeviceError, InputSource, PairingPrompt, PairingResult,
};
use crate::device::pairing::PairingRecord;
use crate::device::profile::{ProfileError, ProfileSwitcher};
use crate::device::{DeviceSynchronizer, PairingStore, SyncSettings};

pub const TV_PROFILE: &str = "TV_Only";
pub const DESK_PROFILE: &str = "2_Monitor";

// ============================================================================
// Configuration
// ============================================================================

pub fn snapshot_with(auth_key: &str, commands: &[(&str, &str)]) -> ConfigSnapshot {
    ConfigSnapshot {
        auth_key: auth_key.to_string(),
        commands: commands
            .iter()
            .map(|(name, line)| {
                let command = ShellCommand {
                    name: name.to_string(),
                    command_line: line.to_string(),
                };
                (name.to_string(), command)
            })
            .collect(),
        server: ServerConfig {
            auth_key: auth_key.to_string(),
            tv_ip: "127.0.0.1".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            pc_tv_profile: TV_PROFILE.to_string(),
            pc_desk_profile: DESK_PROFILE.to_string(),
            pc_tv_input_label: "PC".to_string(),
        },
        device: DeviceConfig::default(),
    }
}

/// Hands out a fixed snapshot (or an error) and counts loads
pub struct ScriptedConfigSource {
    next: Mutex<Option<ConfigSnapshot>>,
    loads: AtomicUsize,
}

impl ScriptedConfigSource {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            next: Mutex::new(Some(snapshot)),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            next: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn set_next(&self, snapshot: ConfigSnapshot) {
        *self.next.lock().unwrap() = Some(snapshot);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ConfigSource for ScriptedConfigSource {
    fn load(&self) -> Result<ConfigSnapshot, ConfigError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.next
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ConfigError::Invalid("scripted failure".to_string()))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

// ============================================================================
// Shell
// ============================================================================

#[derive(Default)]
pub struct FakeShell {
    calls: Mutex<Vec<String>>,
    results: Mutex<HashMap<String, ShellOutput>>,
}

impl FakeShell {
    pub fn respond(&self, command_line: &str, output: ShellOutput) {
        self.results
            .lock()
            .unwrap()
            .insert(command_line.to_string(), output);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellRunner for FakeShell {
    async fn run(&self, command_line: &str) -> std::io::Result<ShellOutput> {
        self.calls.lock().unwrap().push(command_line.to_string());
        let output = self
            .results
            .lock()
            .unwrap()
            .get(command_line)
            .cloned()
            .unwrap_or(ShellOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            });
        Ok(output)
    }
}

// ============================================================================
// Device
// ============================================================================

/// Ordered log of device and profile calls, shared between fakes
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<(String, Instant)>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

pub struct CallGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Journal {
    fn enter(&self, entry: impl Into<String>) -> CallGuard {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .push((entry.into(), Instant::now()));
        CallGuard {
            active: self.active.clone(),
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(entry, _)| entry.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Time between the first `from` entry and the first `to` entry after it
    pub fn gap_between(&self, from: &str, to: &str) -> Option<Duration> {
        let entries = self.entries.lock().unwrap();
        let start = entries.iter().position(|(e, _)| e == from)?;
        let end = entries[start..].iter().find(|(e, _)| e == to)?;
        Some(end.1 - entries[start].1)
    }

    /// Highest number of calls observed in flight at once
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// What the fake TV is showing, by application id
#[derive(Clone)]
pub struct Screen(Arc<Mutex<String>>);

impl Screen {
    pub fn current(&self) -> String {
        self.0.lock().unwrap().clone()
    }
}

/// Injected failures, adjustable after the device is boxed
#[derive(Clone, Default)]
pub struct Faults(Arc<Mutex<Option<String>>>);

impl Faults {
    pub fn fail_set_source(&self, reason: &str) {
        *self.0.lock().unwrap() = Some(reason.to_string());
    }
}

enum PairingMode {
    Accept,
    Reject,
    Silent,
}

pub struct FakeDevice {
    journal: Journal,
    sources: Vec<InputSource>,
    screen: Screen,
    faults: Faults,
    pairing: PairingMode,
    prompts: Arc<AtomicUsize>,
    call_delay: Duration,
}

pub fn input(id: &str, label: &str, app: &str) -> InputSource {
    InputSource {
        id: id.to_string(),
        label: label.to_string(),
        application_id: app.to_string(),
    }
}

impl FakeDevice {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            sources: vec![
                input("HDMI_1", "Console", "com.webos.app.hdmi1"),
                input("HDMI_2", "PC", "com.webos.app.hdmi2"),
                input("HDMI_3", "Blu-ray", "com.webos.app.hdmi3"),
            ],
            screen: Screen(Arc::new(Mutex::new("com.webos.app.hdmi1".to_string()))),
            faults: Faults::default(),
            pairing: PairingMode::Accept,
            prompts: Arc::new(AtomicUsize::new(0)),
            call_delay: Duration::ZERO,
        }
    }

    pub fn showing(self, app_id: &str) -> Self {
        *self.screen.0.lock().unwrap() = app_id.to_string();
        self
    }

    pub fn rejecting_pairing(mut self) -> Self {
        self.pairing = PairingMode::Reject;
        self
    }

    pub fn silent_on_pairing(mut self) -> Self {
        self.pairing = PairingMode::Silent;
        self
    }

    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn screen(&self) -> Screen {
        self.screen.clone()
    }

    pub fn faults(&self) -> Faults {
        self.faults.clone()
    }

    /// Number of times the pairing prompt was raised
    pub fn prompts(&self) -> Arc<AtomicUsize> {
        self.prompts.clone()
    }

    async fn call(&self, entry: impl Into<String>) -> CallGuard {
        let guard = self.journal.enter(entry);
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
        guard
    }
}

#[async_trait]
impl DeviceClient for FakeDevice {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        let _call = self.call("connect").await;
        Ok(())
    }

    async fn pair(
        &mut self,
        mut record: PairingRecord,
        on_prompt: PairingPrompt<'_>,
    ) -> Result<(PairingResult, PairingRecord), DeviceError> {
        let _call = self.call("pair").await;
        match self.pairing {
            PairingMode::Accept => {
                let result = if record.client_key().is_some() {
                    PairingResult::Registered
                } else {
                    self.prompts.fetch_add(1, Ordering::SeqCst);
                    on_prompt();
                    PairingResult::Confirmed
                };
                record.set_client_key("fake-key");
                Ok((result, record))
            }
            PairingMode::Reject => Err(DeviceError::PairingRejected(
                "403 User denied access".to_string(),
            )),
            PairingMode::Silent => Err(DeviceError::PairingTimeout(Duration::from_secs(60))),
        }
    }

    async fn list_sources(&mut self) -> Result<Vec<InputSource>, DeviceError> {
        let _call = self.call("list_sources").await;
        Ok(self.sources.clone())
    }

    async fn current_application(&mut self) -> Result<String, DeviceError> {
        let _call = self.call("current_application").await;
        Ok(self.screen.current())
    }

    async fn set_source(&mut self, source: &InputSource) -> Result<(), DeviceError> {
        let _call = self.call(format!("set_source:{}", source.id)).await;
        if let Some(reason) = self.faults.0.lock().unwrap().clone() {
            return Err(DeviceError::Connection(reason));
        }
        *self.screen.0.lock().unwrap() = source.application_id.clone();
        Ok(())
    }
}

pub struct FakeProfiles {
    journal: Journal,
    exit_code: i32,
}

impl FakeProfiles {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            exit_code: 0,
        }
    }

    pub fn exiting_with(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }
}

#[async_trait]
impl ProfileSwitcher for FakeProfiles {
    async fn apply(&self, profile: &str) -> Result<i32, ProfileError> {
        let _call = self.journal.enter(format!("profile:{}", profile));
        Ok(self.exit_code)
    }
}

pub fn settings(settle_delay: Duration) -> SyncSettings {
    SyncSettings {
        input_label: "PC".to_string(),
        device_profile: TV_PROFILE.to_string(),
        desk_profile: DESK_PROFILE.to_string(),
        settle_delay,
    }
}

/// A started synchronizer over fakes; keep the `TempDir` alive for the test
pub async fn ready_synchronizer() -> (Arc<DeviceSynchronizer>, Journal, tempfile::TempDir) {
    let journal = Journal::default();
    ready_synchronizer_over(FakeDevice::new(journal.clone()), journal).await
}

/// Same as `ready_synchronizer`, over a device built on `journal`
pub async fn ready_synchronizer_over(
    device: FakeDevice,
    journal: Journal,
) -> (Arc<DeviceSynchronizer>, Journal, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let sync = DeviceSynchronizer::new(
        Box::new(device),
        PairingStore::new(dir.path().join("tv-config.json")),
        Arc::new(FakeProfiles::new(journal.clone())),
        settings(Duration::ZERO),
    );
    sync.start().await.unwrap();
    journal.clear();
    (Arc::new(sync), journal, dir)
}
