//! Shared test doubles for service tests.
//!
//! Each fake records what it was asked to do so tests can assert on the
//! side effects a service produced, not only on its return value.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::Result;
use arena_common::{MapItem, StatusSnapshot};
use async_trait::async_trait;

use crate::application::ports::{
    CommandOutput, CredentialIssuer, InstanceStore, MapCatalog, PortTable, RemoteExec, StatusFeed,
};
use crate::domain::{Credential, Instance, PortRecord};

// ── Status feed ───────────────────────────────────────────────────────────────

/// Replays a script of feed responses; the last frame repeats forever.
/// `None` frames fail the fetch.
pub struct ScriptedFeed {
    frames: Vec<Option<Vec<StatusSnapshot>>>,
    calls: Mutex<usize>,
}

impl ScriptedFeed {
    pub fn new(frames: Vec<Option<Vec<StatusSnapshot>>>) -> Self {
        Self {
            frames,
            calls: Mutex::new(0),
        }
    }

    /// A feed that always reports the same list.
    pub fn fixed(snapshots: Vec<StatusSnapshot>) -> Self {
        Self::new(vec![Some(snapshots)])
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("feed lock")
    }
}

#[async_trait]
impl StatusFeed for ScriptedFeed {
    async fn list(&self) -> Result<Vec<StatusSnapshot>> {
        let mut calls = self.calls.lock().expect("feed lock");
        let idx = (*calls).min(self.frames.len().saturating_sub(1));
        *calls += 1;
        match self.frames.get(idx).cloned().flatten() {
            Some(frame) => Ok(frame),
            None => anyhow::bail!("status feed unavailable"),
        }
    }
}

// ── Remote execution ──────────────────────────────────────────────────────────

/// Records every command and answers with an empty, successful output
/// unless the command contains one of the configured failure needles.
#[derive(Default)]
pub struct RecordingRemote {
    pub commands: Mutex<Vec<String>>,
    stderr_on: Vec<&'static str>,
    unreachable_on: Vec<&'static str>,
}

impl RecordingRemote {
    /// Commands containing `needle` come back with text on stderr.
    pub fn failing_on(needle: &'static str) -> Self {
        Self {
            stderr_on: vec![needle],
            ..Self::default()
        }
    }

    /// Commands containing `needle` cannot be delivered at all.
    pub fn unreachable_on(needle: &'static str) -> Self {
        Self {
            unreachable_on: vec![needle],
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.commands.lock().expect("remote lock").clone()
    }
}

#[async_trait]
impl RemoteExec for RecordingRemote {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.commands
            .lock()
            .expect("remote lock")
            .push(command.to_string());
        if self.unreachable_on.iter().any(|n| command.contains(n)) {
            anyhow::bail!("connection refused");
        }
        if self.stderr_on.iter().any(|n| command.contains(n)) {
            return Ok(CommandOutput {
                stdout: String::new(),
                stderr: format!("Error response from daemon: {command} failed"),
            });
        }
        Ok(CommandOutput::default())
    }
}

// ── Stores ────────────────────────────────────────────────────────────────────

/// Minimal port table over a fixed range; reservations never expire.
pub struct FakePorts {
    state: Mutex<FakePortState>,
}

#[derive(Default)]
struct FakePortState {
    owners: BTreeMap<u16, String>,
    reserved: BTreeSet<u16>,
    free: BTreeSet<u16>,
}

impl FakePorts {
    pub fn with_range(range: std::ops::RangeInclusive<u16>) -> Self {
        Self {
            state: Mutex::new(FakePortState {
                free: range.collect(),
                ..FakePortState::default()
            }),
        }
    }

    pub fn owner_of(&self, port: u16) -> Option<String> {
        self.state
            .lock()
            .expect("ports lock")
            .owners
            .get(&port)
            .cloned()
    }

    pub fn is_reserved(&self, port: u16) -> bool {
        self.state
            .lock()
            .expect("ports lock")
            .reserved
            .contains(&port)
    }
}

#[async_trait]
impl PortTable for FakePorts {
    async fn reserve(&self) -> Result<Option<u16>> {
        let mut state = self.state.lock().expect("ports lock");
        let next = state
            .free
            .iter()
            .copied()
            .find(|p| !state.reserved.contains(p) && !state.owners.contains_key(p));
        if let Some(port) = next {
            state.reserved.insert(port);
        }
        Ok(next)
    }

    async fn occupy(&self, port: u16, instance: &str) -> Result<bool> {
        let mut state = self.state.lock().expect("ports lock");
        if state.owners.contains_key(&port) || state.owners.values().any(|o| o == instance) {
            return Ok(false);
        }
        state.reserved.remove(&port);
        state.owners.insert(port, instance.to_string());
        Ok(true)
    }

    async fn release(&self, instance: &str) -> Result<bool> {
        let mut state = self.state.lock().expect("ports lock");
        let port = state
            .owners
            .iter()
            .find(|(_, o)| o.as_str() == instance)
            .map(|(p, _)| *p);
        Ok(port.is_some_and(|p| state.owners.remove(&p).is_some()))
    }

    async fn release_by_number(&self, port: u16) -> Result<bool> {
        let mut state = self.state.lock().expect("ports lock");
        let was_reserved = state.reserved.remove(&port);
        Ok(state.owners.remove(&port).is_some() || was_reserved)
    }

    async fn release_reservation(&self, port: u16) -> Result<bool> {
        let mut state = self.state.lock().expect("ports lock");
        if state.owners.contains_key(&port) {
            return Ok(false);
        }
        Ok(state.reserved.remove(&port))
    }

    async fn list(&self) -> Result<Vec<PortRecord>> {
        let state = self.state.lock().expect("ports lock");
        Ok(state
            .free
            .iter()
            .map(|p| match state.owners.get(p) {
                Some(owner) => PortRecord {
                    number: *p,
                    is_occupied: true,
                    owning_instance: Some(owner.clone()),
                    occupied_at: None,
                },
                None => PortRecord::free(*p),
            })
            .collect())
    }
}

/// Instance rows plus a fixed map catalog.
#[derive(Default)]
pub struct FakeRows {
    pub rows: Mutex<BTreeMap<String, Instance>>,
    pub maps: Vec<MapItem>,
}

impl FakeRows {
    pub fn with_maps(maps: &[(i64, &str)]) -> Self {
        Self {
            maps: maps
                .iter()
                .map(|(id, name)| MapItem {
                    map_id: *id,
                    name: (*name).to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn current_map(&self, name: &str) -> Option<String> {
        self.rows
            .lock()
            .expect("rows lock")
            .get(name)
            .and_then(|i| i.current_map.clone())
    }
}

#[async_trait]
impl InstanceStore for FakeRows {
    async fn insert(&self, instance: &Instance) -> Result<bool> {
        let mut rows = self.rows.lock().expect("rows lock");
        if rows.contains_key(&instance.name) {
            return Ok(false);
        }
        rows.insert(instance.name.clone(), instance.clone());
        Ok(true)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.rows.lock().expect("rows lock").remove(name).is_some())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Instance>> {
        Ok(self.rows.lock().expect("rows lock").get(name).cloned())
    }

    async fn list(&self, owner: Option<&str>) -> Result<Vec<Instance>> {
        Ok(self
            .rows
            .lock()
            .expect("rows lock")
            .values()
            .filter(|i| owner.is_none_or(|o| i.owner == o))
            .cloned()
            .collect())
    }

    async fn set_map(&self, name: &str, map: &str) -> Result<bool> {
        let mut rows = self.rows.lock().expect("rows lock");
        Ok(rows.get_mut(name).is_some_and(|i| {
            i.current_map = Some(map.to_string());
            true
        }))
    }
}

#[async_trait]
impl MapCatalog for FakeRows {
    async fn maps(&self) -> Result<Vec<MapItem>> {
        Ok(self.maps.clone())
    }
}

// ── Credentials ───────────────────────────────────────────────────────────────

/// Issues `tok-<name>` for account `acct-<name>` and records revocations.
#[derive(Default)]
pub struct FakeIssuer {
    pub revoked: Mutex<Vec<String>>,
    pub fail_issue: bool,
}

impl FakeIssuer {
    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().expect("issuer lock").clone()
    }
}

#[async_trait]
impl CredentialIssuer for FakeIssuer {
    async fn issue(&self, name: &str) -> Result<Credential> {
        if self.fail_issue {
            anyhow::bail!("account api returned 429");
        }
        Ok(Credential {
            account_id: Some(format!("acct-{name}")),
            token: format!("tok-{name}"),
        })
    }

    async fn revoke(&self, account_id: &str) -> Result<()> {
        self.revoked
            .lock()
            .expect("issuer lock")
            .push(account_id.to_string());
        Ok(())
    }
}
