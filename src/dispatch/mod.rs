//! Dispatcher - authorizes a named command and routes it to the TV or the shell
//!
//! The key is checked once, against the snapshot installed when the request
//! arrived. A name missing from that snapshot triggers exactly one reload;
//! a bad key never does.

use std::sync::Arc;

use crate::commands::{CommandTable, ShellRunner};
use crate::config::ShellCommand;
use crate::device::DeviceSynchronizer;
use crate::error::AppError;
use crate::models::ExecutionOutcome;

/// Reserved command names handled by the device synchronizer
pub const SWITCH_TO_DEVICE: &str = "switch_pc_to_tv";
pub const SWITCH_BACK: &str = "switch_pc_back";

pub struct Dispatcher {
    table: Arc<CommandTable>,
    device: Arc<DeviceSynchronizer>,
    shell: Arc<dyn ShellRunner>,
}

impl Dispatcher {
    pub fn new(
        table: Arc<CommandTable>,
        device: Arc<DeviceSynchronizer>,
        shell: Arc<dyn ShellRunner>,
    ) -> Self {
        Self {
            table,
            device,
            shell,
        }
    }

    pub async fn dispatch(
        &self,
        name: &str,
        supplied_key: Option<&str>,
    ) -> Result<ExecutionOutcome, AppError> {
        let snapshot = self.table.current().await;
        if !snapshot.authorizes(supplied_key) {
            tracing::warn!("[Dispatch] Rejected {}: bad auth key", name);
            return Err(AppError::Unauthorized);
        }

        let command = match snapshot.lookup(name) {
            Some(command) => command.clone(),
            None => self.lookup_after_reload(name).await?,
        };

        match command.name.as_str() {
            SWITCH_TO_DEVICE => {
                self.device.switch_to_device().await?;
                Ok(ExecutionOutcome::message("Switched PC to TV"))
            }
            SWITCH_BACK => {
                self.device.switch_back().await?;
                Ok(ExecutionOutcome::message("Switched PC back"))
            }
            _ => self.run_shell(&command).await,
        }
    }

    async fn lookup_after_reload(&self, name: &str) -> Result<ShellCommand, AppError> {
        tracing::info!("[Dispatch] {} not configured, reloading config", name);

        let snapshot = self
            .table
            .reload()
            .await
            .map_err(|e| AppError::ConfigReload(e.to_string()))?;

        snapshot
            .lookup(name)
            .cloned()
            .ok_or_else(|| AppError::CommandNotFound(name.to_string()))
    }

    async fn run_shell(&self, command: &ShellCommand) -> Result<ExecutionOutcome, AppError> {
        tracing::info!("[Dispatch] Running {}: {}", command.name, command.command_line);

        let output = self
            .shell
            .run(&command.command_line)
            .await
            .map_err(|e| AppError::CommandFailed {
                stderr: e.to_string(),
            })?;

        if !output.success() {
            tracing::warn!(
                "[Dispatch] {} exited with {}: {}",
                command.name,
                output.exit_code,
                output.stderr
            );
            return Err(AppError::CommandFailed {
                stderr: output.stderr,
            });
        }

        Ok(ExecutionOutcome::with_output(
            format!("Executed {}", command.name),
            output.stdout,
        ))
    }
}
