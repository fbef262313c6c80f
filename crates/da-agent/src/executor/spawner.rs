//! Process launching

use std::io;
use std::process::Stdio;

use tokio::process::Command;

/// Launches a command line without waiting for it
pub trait Spawner: Send + Sync {
    /// Start `command_line`. Success means the process was launched.
    fn spawn(&self, command_line: &str) -> io::Result<()>;
}

/// Runs command lines through `sh -c`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellSpawner;

impl Spawner for ShellSpawner {
    fn spawn(&self, command_line: &str) -> io::Result<()> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // Reap in the background; the exit status is only logged
        let command_line = command_line.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::debug!("'{}' exited with {}", command_line, status),
                Err(e) => tracing::debug!("Failed to wait for '{}': {}", command_line, e),
            }
        });

        Ok(())
    }
}
