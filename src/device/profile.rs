//! Monitor profile switcher
//!
//! Invokes MonitorSwitcher with `-load:<profiles_dir>/<name>.xml`. Output is
//! discarded; only the exit status is reported.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to launch {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Profile switch did not finish within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ProfileSwitcher: Send + Sync {
    /// Apply a named profile and return the switcher's exit code
    async fn apply(&self, profile: &str) -> Result<i32, ProfileError>;
}

pub struct MonitorSwitcher {
    executable: PathBuf,
    profiles_dir: PathBuf,
    timeout: Duration,
}

impl MonitorSwitcher {
    pub fn new(executable: PathBuf, profiles_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            executable,
            profiles_dir,
            timeout,
        }
    }

    fn load_argument(&self, profile: &str) -> String {
        let path = self.profiles_dir.join(format!("{}.xml", profile));
        format!("-load:{}", path.display())
    }
}

#[async_trait]
impl ProfileSwitcher for MonitorSwitcher {
    async fn apply(&self, profile: &str) -> Result<i32, ProfileError> {
        let argument = self.load_argument(profile);
        tracing::info!("[Profile] Switching profile: {}", argument);

        let status = Command::new(&self.executable)
            .arg(&argument)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.timeout, status).await {
            Ok(Ok(status)) => Ok(status.code().unwrap_or(-1)),
            Ok(Err(source)) => Err(ProfileError::Spawn {
                path: self.executable.clone(),
                source,
            }),
            Err(_) => Err(ProfileError::Timeout(self.timeout)),
        }
    }
}
