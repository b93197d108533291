//! Configuration module
//!
//! The whole document is read on every load. A load produces a
//! [`ConfigSnapshot`], which is never mutated afterwards; reloading installs a
//! fresh snapshot instead (see `commands::CommandTable`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "PC_REMOTE_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub commands: HashMap<String, CommandEntry>,
    #[serde(default)]
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub auth_key: String,
    pub tv_ip: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Monitor profile applied once the TV shows the PC
    pub pc_tv_profile: String,
    /// Monitor profile applied when handing the PC back to the desk
    pub pc_desk_profile: String,
    /// Label of the TV input the PC is plugged into
    pub pc_tv_input_label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandEntry {
    pub command: String,
}

/// Optional `device` section. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_secure")]
    pub secure: bool,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_pairing_timeout_secs")]
    pub pairing_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub pairing_file: Option<PathBuf>,
    #[serde(default)]
    pub profile_switcher: Option<PathBuf>,
    #[serde(default)]
    pub profiles_dir: Option<PathBuf>,
    #[serde(default = "default_profile_timeout_secs")]
    pub profile_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            secure: default_secure(),
            settle_delay_ms: default_settle_delay_ms(),
            pairing_timeout_secs: default_pairing_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            pairing_file: None,
            profile_switcher: None,
            profiles_dir: None,
            profile_timeout_secs: default_profile_timeout_secs(),
        }
    }
}

impl DeviceConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn pairing_timeout(&self) -> Duration {
        Duration::from_secs(self.pairing_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn profile_timeout(&self) -> Duration {
        Duration::from_secs(self.profile_timeout_secs)
    }

    pub fn pairing_file(&self) -> PathBuf {
        self.pairing_file
            .clone()
            .unwrap_or_else(|| install_dir().join("tv-config.json"))
    }

    pub fn profile_switcher(&self) -> PathBuf {
        self.profile_switcher.clone().unwrap_or_else(|| {
            install_dir()
                .join("3rd-party")
                .join("MonitorSwitcher.exe")
        })
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.profiles_dir.clone().unwrap_or_else(|| {
            let roaming = std::env::var_os("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(install_dir);
            roaming.join("MonitorSwitcher").join("Profiles")
        })
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_secure() -> bool {
    true
}

fn default_settle_delay_ms() -> u64 {
    4000
}

fn default_pairing_timeout_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_profile_timeout_secs() -> u64 {
    30
}

/// Directory holding the running executable (falls back to the working dir)
pub fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

// ============================================================================
// Snapshot
// ============================================================================

/// A named shell command from the `commands` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub name: String,
    pub command_line: String,
}

/// Immutable view of one configuration generation.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub auth_key: String,
    pub commands: HashMap<String, ShellCommand>,
    pub server: ServerConfig,
    pub device: DeviceConfig,
}

impl ConfigSnapshot {
    pub fn lookup(&self, name: &str) -> Option<&ShellCommand> {
        self.commands.get(name)
    }

    /// A missing key never authorizes, not even against an empty configured key.
    pub fn authorizes(&self, supplied: Option<&str>) -> bool {
        match supplied {
            Some(key) => key == self.auth_key,
            None => false,
        }
    }
}

impl TryFrom<Config> for ConfigSnapshot {
    type Error = ConfigError;

    fn try_from(config: Config) -> Result<Self, Self::Error> {
        if config.server.auth_key.is_empty() {
            return Err(ConfigError::Invalid("server.auth_key must not be empty".into()));
        }

        let commands = config
            .commands
            .into_iter()
            .map(|(name, entry)| {
                let command = ShellCommand {
                    name: name.clone(),
                    command_line: entry.command,
                };
                (name, command)
            })
            .collect();

        Ok(Self {
            auth_key: config.server.auth_key.clone(),
            commands,
            server: config.server,
            device: config.device,
        })
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Produces a complete snapshot on every call.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<ConfigSnapshot, ConfigError>;

    /// Human-readable origin for log lines
    fn describe(&self) -> String;
}

/// Reads a YAML/TOML/JSON document plus `PC_REMOTE__*` environment overrides.
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$PC_REMOTE_CONFIG`, or `config.*` next to the executable
    pub fn from_env_or_default() -> Self {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::new(path),
            None => Self::new(install_dir().join("config")),
        }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<ConfigSnapshot, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&self.path.to_string_lossy()))
            .add_source(config::Environment::with_prefix("PC_REMOTE").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        ConfigSnapshot::try_from(config)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
