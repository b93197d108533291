//! Command table - the installed configuration generation
//!
//! Every request reads the current snapshot through an `Arc` clone; a reload
//! swaps the whole snapshot under the write lock, so readers see either the
//! old generation or the new one, never a mix of key and table.

mod shell;

pub use self::shell::{ShellOutput, ShellRunner, SystemShell};

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{ConfigError, ConfigSnapshot, ConfigSource};

pub struct CommandTable {
    current: RwLock<Arc<ConfigSnapshot>>,
    source: Arc<dyn ConfigSource>,
}

impl CommandTable {
    pub fn new(initial: ConfigSnapshot, source: Arc<dyn ConfigSource>) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            source,
        }
    }

    /// Snapshot in effect right now
    pub async fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.read().await.clone()
    }

    /// Re-read the configuration and install it, replacing the previous
    /// snapshot. On failure the previous snapshot stays installed.
    pub async fn reload(&self) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        let source = self.source.clone();
        let loaded = tokio::task::spawn_blocking(move || source.load())
            .await
            .map_err(|e| ConfigError::Invalid(format!("config loader panicked: {}", e)))??;

        let snapshot = Arc::new(loaded);
        {
            let mut current = self.current.write().await;
            *current = snapshot.clone();
        }

        tracing::info!(
            "[Config] Reloaded from {}: {} commands",
            self.source.describe(),
            snapshot.commands.len()
        );
        Ok(snapshot)
    }
}
