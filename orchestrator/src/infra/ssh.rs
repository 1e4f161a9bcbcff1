//! Remote execution over the system `ssh` client.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::application::ports::{CommandOutput, CommandRunner, RemoteExec};

/// Where and how to reach the container host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub key_path: String,
}

impl SshTarget {
    /// Arguments for `ssh` that run `command` on the target.
    #[must_use]
    pub fn args<'a>(&'a self, port: &'a str, destination: &'a str, command: &'a str) -> Vec<&'a str> {
        vec![
            "-i",
            self.key_path.as_str(),
            "-p",
            port,
            "-o",
            "BatchMode=yes",
            "-o",
            "StrictHostKeyChecking=accept-new",
            destination,
            "--",
            command,
        ]
    }
}

/// [`RemoteExec`] that shells out to `ssh` through a [`CommandRunner`].
pub struct SshRemoteExec {
    target: SshTarget,
    runner: Arc<dyn CommandRunner>,
}

impl SshRemoteExec {
    #[must_use]
    pub fn new(target: SshTarget, runner: Arc<dyn CommandRunner>) -> Self {
        Self { target, runner }
    }
}

#[async_trait]
impl RemoteExec for SshRemoteExec {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let port = self.target.port.to_string();
        let destination = format!("{}@{}", self.target.user, self.target.host);
        let args = self.target.args(&port, &destination, command);
        let output = self
            .runner
            .run("ssh", &args)
            .await
            .with_context(|| format!("ssh to {destination}"))?;

        // 255 is ssh's own failure (connect, auth); anything else is the
        // remote command's exit code and is judged from stderr.
        if output.status.code() == Some(255) {
            anyhow::bail!(
                "ssh to {destination} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
