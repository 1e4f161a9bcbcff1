//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `arena_common`, never
//! from `crate::infra`.
//!
//! All ports are object-safe (`async_trait`) and `Send + Sync` so the
//! orchestrator can share them with detached reaper tasks.

use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use arena_common::{MapItem, StatusSnapshot};
use async_trait::async_trait;

use crate::domain::{Credential, Instance, PortRecord};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Captured streams of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// The remote side's error stream, if it wrote anything.
    ///
    /// The container host reports failures on stderr; a non-empty stderr is
    /// treated as a failed command regardless of exit status.
    #[must_use]
    pub fn reported_error(&self) -> Option<&str> {
        let stderr = self.stderr.trim();
        (!stderr.is_empty()).then_some(stderr)
    }
}

// ── Status Feed Port ──────────────────────────────────────────────────────────

/// Live status of every known game server.
#[async_trait]
pub trait StatusFeed: Send + Sync {
    /// Fetch the full server list. The result is a fresh observation; nothing
    /// is cached between calls.
    async fn list(&self) -> Result<Vec<StatusSnapshot>>;
}

// ── Store Ports ───────────────────────────────────────────────────────────────

/// The port table.
///
/// Implementations must make `reserve` atomic with respect to other
/// reservers: a port handed out by one call is invisible to every other
/// `reserve` until it is released or its reservation expires.
#[async_trait]
pub trait PortTable: Send + Sync {
    /// Claim the numerically smallest free, unreserved port.
    /// Returns `None` when the pool is exhausted.
    async fn reserve(&self) -> Result<Option<u16>>;
    /// Bind `port` to `instance`. Returns `false` if the port is already
    /// occupied or the instance already owns another port.
    async fn occupy(&self, port: u16, instance: &str) -> Result<bool>;
    /// Free the port bound to `instance`. Returns `false` if none was bound.
    async fn release(&self, instance: &str) -> Result<bool>;
    /// Free `port` and drop any reservation on it. Returns `false` if the
    /// port was neither occupied nor reserved.
    async fn release_by_number(&self, port: u16) -> Result<bool>;
    /// Drop an outstanding reservation on `port`. A bound port is left
    /// untouched. Returns `false` if there was no reservation to drop.
    async fn release_reservation(&self, port: u16) -> Result<bool>;
    /// Every row, ordered by port number.
    async fn list(&self) -> Result<Vec<PortRecord>>;
}

/// Instance rows.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Insert a new row. Returns `false` if the name is already taken.
    async fn insert(&self, instance: &Instance) -> Result<bool>;
    /// Delete a row. Returns `false` if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool>;
    async fn get_by_name(&self, name: &str) -> Result<Option<Instance>>;
    /// All rows, optionally restricted to one owner.
    async fn list(&self, owner: Option<&str>) -> Result<Vec<Instance>>;
    /// Record the map an instance switched to. Returns `false` if the row is missing.
    async fn set_map(&self, name: &str, map: &str) -> Result<bool>;
}

/// The map catalog.
#[async_trait]
pub trait MapCatalog: Send + Sync {
    async fn maps(&self) -> Result<Vec<MapItem>>;
}

// ── Remote Execution Ports ────────────────────────────────────────────────────

/// Runs a shell command on the container host.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Run `command` remotely. `Err` means the command could not be
    /// delivered; a delivered command that failed is reported via
    /// [`CommandOutput::reported_error`].
    async fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Abstracts local process execution so infrastructure can be swapped or mocked.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Credential Port ───────────────────────────────────────────────────────────

/// Issues and revokes the per-instance game-server credential.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Issue a credential for the instance `name`.
    async fn issue(&self, name: &str) -> Result<Credential>;
    /// Revoke the account behind a previously issued credential.
    async fn revoke(&self, account_id: &str) -> Result<()>;
}
