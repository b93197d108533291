//! Shell runner - executes configured command lines through the platform shell

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Captured result of one command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal
    pub exit_code: i32,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn run(&self, command_line: &str) -> std::io::Result<ShellOutput>;
}

/// `cmd /C` on Windows, `sh -c` elsewhere
pub struct SystemShell;

impl SystemShell {
    /// cmd.exe parses its own quoting, so the line is passed verbatim
    #[cfg(windows)]
    fn command(command_line: &str) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.raw_arg("/C").raw_arg(command_line);
        cmd
    }

    #[cfg(not(windows))]
    fn command(command_line: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command_line);
        cmd
    }
}

#[async_trait]
impl ShellRunner for SystemShell {
    async fn run(&self, command_line: &str) -> std::io::Result<ShellOutput> {
        let output = Self::command(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
