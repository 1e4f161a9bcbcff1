//! In-process store: port table, instance rows and map catalog behind one
//! async mutex. Used when no Valkey URL is configured, and by tests.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::Result;
use arena_common::MapItem;
use arena_common::ttl::PORT_RESERVATION_SECS;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::application::ports::{InstanceStore, MapCatalog, PortTable};
use crate::domain::{Instance, PortRecord};

#[derive(Debug, Clone)]
enum Slot {
    Free,
    Reserved { since: Instant },
    Occupied { owner: String, at: DateTime<Utc> },
}

#[derive(Default)]
struct State {
    ports: BTreeMap<u16, Slot>,
    instances: BTreeMap<String, Instance>,
    maps: Vec<MapItem>,
}

pub struct InMemoryStore {
    state: Mutex<State>,
    lease: Duration,
}

impl InMemoryStore {
    #[must_use]
    pub fn new(ports: RangeInclusive<u16>, maps: Vec<MapItem>) -> Self {
        Self {
            state: Mutex::new(State {
                ports: ports.map(|p| (p, Slot::Free)).collect(),
                instances: BTreeMap::new(),
                maps,
            }),
            lease: Duration::from_secs(PORT_RESERVATION_SECS),
        }
    }

    /// Override how long an unconfirmed reservation holds its port.
    #[must_use]
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }
}

#[async_trait]
impl PortTable for InMemoryStore {
    async fn reserve(&self) -> Result<Option<u16>> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let lease = self.lease;
        let claimable = state.ports.iter_mut().find(|(_, slot)| match slot {
            Slot::Free => true,
            Slot::Reserved { since } => now.duration_since(*since) >= lease,
            Slot::Occupied { .. } => false,
        });
        Ok(claimable.map(|(port, slot)| {
            *slot = Slot::Reserved { since: now };
            *port
        }))
    }

    async fn occupy(&self, port: u16, instance: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let name_bound = state
            .ports
            .values()
            .any(|slot| matches!(slot, Slot::Occupied { owner, .. } if owner == instance));
        if name_bound {
            return Ok(false);
        }
        let Some(slot) = state.ports.get_mut(&port) else {
            return Ok(false);
        };
        if matches!(slot, Slot::Occupied { .. }) {
            return Ok(false);
        }
        *slot = Slot::Occupied {
            owner: instance.to_string(),
            at: Utc::now(),
        };
        Ok(true)
    }

    async fn release(&self, instance: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let slot = state
            .ports
            .values_mut()
            .find(|slot| matches!(slot, Slot::Occupied { owner, .. } if owner == instance));
        Ok(slot.is_some_and(|slot| {
            *slot = Slot::Free;
            true
        }))
    }

    async fn release_by_number(&self, port: u16) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(slot) = state.ports.get_mut(&port) else {
            return Ok(false);
        };
        let held = !matches!(slot, Slot::Free);
        *slot = Slot::Free;
        Ok(held)
    }

    async fn release_reservation(&self, port: u16) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(slot) = state.ports.get_mut(&port) else {
            return Ok(false);
        };
        if !matches!(slot, Slot::Reserved { .. }) {
            return Ok(false);
        }
        *slot = Slot::Free;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<PortRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .ports
            .iter()
            .map(|(port, slot)| match slot {
                Slot::Occupied { owner, at } => PortRecord {
                    number: *port,
                    is_occupied: true,
                    owning_instance: Some(owner.clone()),
                    occupied_at: Some(*at),
                },
                Slot::Free | Slot::Reserved { .. } => PortRecord::free(*port),
            })
            .collect())
    }
}

#[async_trait]
impl InstanceStore for InMemoryStore {
    async fn insert(&self, instance: &Instance) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.instances.contains_key(&instance.name) {
            return Ok(false);
        }
        state
            .instances
            .insert(instance.name.clone(), instance.clone());
        Ok(true)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().await.instances.remove(name).is_some())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Instance>> {
        Ok(self.state.lock().await.instances.get(name).cloned())
    }

    async fn list(&self, owner: Option<&str>) -> Result<Vec<Instance>> {
        let state = self.state.lock().await;
        Ok(state
            .instances
            .values()
            .filter(|i| owner.is_none_or(|o| i.owner == o))
            .cloned()
            .collect())
    }

    async fn set_map(&self, name: &str, map: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(state.instances.get_mut(name).is_some_and(|i| {
            i.current_map = Some(map.to_string());
            true
        }))
    }
}

#[async_trait]
impl MapCatalog for InMemoryStore {
    async fn maps(&self) -> Result<Vec<MapItem>> {
        Ok(self.state.lock().await.maps.clone())
    }
}
