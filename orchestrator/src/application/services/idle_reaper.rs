//! Idle reaping of dynamic instances.
//!
//! Every non-static instance gets a detached task that samples the status
//! feed once per tick and tears the instance down after enough consecutive
//! empty observations. Tasks are tracked in a [`ReaperRegistry`] keyed by
//! instance name so `destroy` and shutdown can cancel them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::services::status_poller::StatusPoller;

/// Destroys an instance on behalf of its reaper.
#[async_trait]
pub trait Teardown: Send + Sync {
    /// Returns whether the teardown completed.
    async fn teardown(&self, name: &str) -> bool;
}

/// How a reaper task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaperExit {
    /// Cancelled by `destroy`, a newer reaper or shutdown.
    Cancelled,
    /// The instance vanished from the feed.
    InstanceGone,
    /// The idle threshold was reached but another party owned the teardown.
    Superseded,
    /// The idle threshold was reached and this reaper ran the teardown.
    Reaped { destroyed: bool },
}

/// Tick period and idle threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperSettings {
    pub tick: Duration,
    pub threshold: u32,
}

struct Entry {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct RegistryState {
    next_generation: u64,
    entries: HashMap<String, Entry>,
}

/// Process-wide table of live reapers.
#[derive(Clone, Default)]
pub struct ReaperRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ReaperRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a reaper for `name`, cancelling any reaper already watching it.
    pub fn register(&self, name: &str) -> (u64, CancellationToken) {
        let mut state = self.lock();
        state.next_generation += 1;
        let generation = state.next_generation;
        let token = CancellationToken::new();
        let previous = state.entries.insert(
            name.to_string(),
            Entry {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(instance = %name, "replacing existing reaper");
            previous.token.cancel();
        }
        (generation, token)
    }

    /// Take ownership of the teardown of `name`.
    ///
    /// Succeeds only for the currently registered generation, and only once:
    /// the entry is removed on success.
    pub fn claim(&self, name: &str, generation: u64) -> bool {
        let mut state = self.lock();
        match state.entries.get(name) {
            Some(entry) if entry.generation == generation && !entry.token.is_cancelled() => {
                state.entries.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Cancel the reaper watching `name`. Returns `false` if there was none.
    pub fn cancel(&self, name: &str) -> bool {
        let entry = self.lock().entries.remove(name);
        entry.is_some_and(|entry| {
            entry.token.cancel();
            true
        })
    }

    /// Cancel every reaper. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Entry> = self.lock().entries.drain().map(|(_, e)| e).collect();
        for entry in &drained {
            entry.token.cancel();
        }
        drained.len()
    }

    #[must_use]
    pub fn is_watching(&self, name: &str) -> bool {
        self.lock().entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn forget(&self, name: &str, generation: u64) {
        let mut state = self.lock();
        if state
            .entries
            .get(name)
            .is_some_and(|e| e.generation == generation)
        {
            state.entries.remove(name);
        }
    }
}

/// Register and spawn a reaper for `name`.
pub fn spawn_reaper(
    registry: &ReaperRegistry,
    poller: StatusPoller,
    teardown: Arc<dyn Teardown>,
    name: String,
    settings: ReaperSettings,
) -> JoinHandle<ReaperExit> {
    let (generation, token) = registry.register(&name);
    let registry = registry.clone();
    tracing::info!(instance = %name, tick_secs = settings.tick.as_secs(), threshold = settings.threshold, "reaper started");
    tokio::spawn(async move {
        let exit = run_reaper(
            &registry,
            &poller,
            teardown.as_ref(),
            &name,
            generation,
            &token,
            settings,
        )
        .await;
        tracing::info!(instance = %name, ?exit, "reaper finished");
        exit
    })
}

async fn run_reaper(
    registry: &ReaperRegistry,
    poller: &StatusPoller,
    teardown: &dyn Teardown,
    name: &str,
    generation: u64,
    token: &CancellationToken,
    settings: ReaperSettings,
) -> ReaperExit {
    let mut idle_ticks: u32 = 0;
    loop {
        tokio::select! {
            () = token.cancelled() => return ReaperExit::Cancelled,
            () = tokio::time::sleep(settings.tick) => {}
        }

        match poller.snapshot(name).await {
            Ok(Some(snapshot)) if snapshot.is_idle() => idle_ticks += 1,
            Ok(Some(_)) => idle_ticks = 0,
            Ok(None) => {
                registry.forget(name, generation);
                return ReaperExit::InstanceGone;
            }
            Err(e) => {
                tracing::warn!(instance = %name, error = %e, "reaper tick skipped");
                continue;
            }
        }
        tracing::debug!(instance = %name, idle_ticks, threshold = settings.threshold, "reaper tick");

        if idle_ticks >= settings.threshold {
            if !registry.claim(name, generation) {
                return ReaperExit::Superseded;
            }
            tracing::info!(instance = %name, idle_ticks, "instance idle, tearing down");
            let destroyed = teardown.teardown(name).await;
            return ReaperExit::Reaped { destroyed };
        }
    }
}
