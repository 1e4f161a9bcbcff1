//! Remote command rendering.
//!
//! Every command the orchestrator sends to the container host is built here,
//! from validated names only. Free-form values (tokens, URLs, volume specs)
//! are single-quoted.

use serde::{Deserialize, Serialize};

/// How dynamic instances are launched and addressed on the container host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchProfile {
    pub image: String,
    pub container_port: u16,
    pub volume: Option<String>,
    pub cfg_url: Option<String>,
    /// Console prefix; `{name}` expands to the instance name.
    pub console_prefix: String,
}

impl Default for LaunchProfile {
    fn default() -> Self {
        Self {
            image: "joedwards32/cs2".to_string(),
            container_port: 27015,
            volume: None,
            cfg_url: None,
            console_prefix: "cs2-server @prac{name} exec".to_string(),
        }
    }
}

/// A command to run on the container host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand<'a> {
    Launch {
        name: &'a str,
        port: u16,
        token: &'a str,
    },
    Start(&'a str),
    Stop(&'a str),
    Remove(&'a str),
    Console {
        name: &'a str,
        line: &'a str,
    },
}

impl RemoteCommand<'_> {
    /// Short verb for logs. Never includes the credential.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Launch { .. } => "launch",
            Self::Start(_) => "start",
            Self::Stop(_) => "stop",
            Self::Remove(_) => "remove",
            Self::Console { .. } => "console",
        }
    }
}

/// Whether a `docker rm` error only says the container is already gone.
#[must_use]
pub fn is_missing_container(stderr: &str) -> bool {
    stderr.contains("No such container")
}

impl LaunchProfile {
    /// Render `command` into the shell line executed remotely.
    #[must_use]
    pub fn render(&self, command: &RemoteCommand<'_>) -> String {
        match *command {
            RemoteCommand::Launch { name, port, token } => {
                let mut parts = vec![
                    format!("docker run -dit --name={name}"),
                    format!("-e SRCDS_TOKEN={}", sh_quote(token)),
                ];
                if let Some(url) = &self.cfg_url {
                    parts.push(format!("-e CS2_CFG_URL={}", sh_quote(url)));
                }
                if let Some(volume) = &self.volume {
                    parts.push(format!("-v {}", sh_quote(volume)));
                }
                let inner = self.container_port;
                parts.push(format!("-p {port}:{inner}/tcp -p {port}:{inner}/udp"));
                parts.push(sh_quote(&self.image));
                parts.join(" ")
            }
            RemoteCommand::Start(name) => format!("docker start {name}"),
            RemoteCommand::Stop(name) => format!("docker stop {name}"),
            RemoteCommand::Remove(name) => format!("docker rm {name}"),
            RemoteCommand::Console { name, line } => {
                format!("{} {line}", self.console_prefix.replace("{name}", name))
            }
        }
    }
}

/// Whether `word` can be placed in a shell line unquoted.
#[must_use]
pub fn is_shell_safe(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'))
}

fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
