//! Valkey-backed store using the fred client.
//!
//! Port reservation is lock-and-skip: candidates are walked in ascending
//! order and claimed with `SET claim NX EX lease`, so concurrent reservers
//! (in this process or another) skip each other's claims. Bindings live in
//! two hashes (`port → name`, `name → port`) written with `HSETNX`.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::{Context, Result};
use arena_common::redis_keys::{keys, port_claim_key, port_field, ttl};
use arena_common::MapItem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fred::prelude::*;
use fred::types::SetOptions;

use crate::application::ports::{InstanceStore, MapCatalog, PortTable};
use crate::domain::{Instance, PortRecord};

#[derive(Clone)]
pub struct ValkeyStore {
    client: Client,
    lease_secs: i64,
}

impl ValkeyStore {
    /// Connect, authenticate and verify with a PING.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str, user: Option<&str>, password: Option<&str>) -> Result<Self> {
        let mut config = Config::from_url(url).context("invalid Valkey URL")?;
        if let Some(user) = user {
            config.username = Some(user.to_string());
        }
        if let Some(password) = password {
            config.password = Some(password.to_string());
        }

        let client = Builder::from_config(config)
            .with_connection_config(|conn_config| {
                conn_config.connection_timeout = Duration::from_secs(5);
                conn_config.internal_command_timeout = Duration::from_secs(10);
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 5000, 5))
            .build()?;

        client.init().await?;
        client
            .ping::<String>(None)
            .await
            .context("Valkey startup PING failed")?;

        tracing::info!("Valkey connection ready");
        Ok(Self {
            client,
            lease_secs: i64::try_from(ttl::PORT_RESERVATION_SECS).unwrap_or(i64::MAX),
        })
    }

    /// Override how long an unconfirmed reservation holds its port.
    #[must_use]
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease_secs = i64::try_from(lease.as_secs().max(1)).unwrap_or(i64::MAX);
        self
    }

    /// Register the port pool and map catalog. Existing bindings are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails.
    pub async fn seed(&self, ports: RangeInclusive<u16>, maps: &[MapItem]) -> Result<()> {
        let count = ports.len();
        for port in ports {
            self.client
                .zadd::<(), _, _>(
                    keys::PORT_POOL,
                    None,
                    None,
                    false,
                    false,
                    (f64::from(port), port_field(port)),
                )
                .await?;
        }
        for map in maps {
            self.client
                .hset::<(), _, _>(keys::MAPS, (map.map_id.to_string(), map.name.clone()))
                .await?;
        }
        tracing::info!(ports = count, maps = maps.len(), "store seeded");
        Ok(())
    }

    async fn pool(&self) -> Result<Vec<u16>> {
        let members: Vec<String> = self
            .client
            .zrange(keys::PORT_POOL, 0_i64, -1_i64, None, false, None, false)
            .await?;
        Ok(members.iter().filter_map(|m| m.parse().ok()).collect())
    }

    async fn clear_binding(&self, port: u16, name: &str) -> Result<()> {
        let field = port_field(port);
        self.client
            .hdel::<i64, _, _>(keys::PORT_BY_NAME, name)
            .await?;
        self.client
            .hdel::<i64, _, _>(keys::PORT_OWNER, field.as_str())
            .await?;
        self.client
            .hdel::<i64, _, _>(keys::PORT_OCCUPIED_AT, field.as_str())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PortTable for ValkeyStore {
    async fn reserve(&self) -> Result<Option<u16>> {
        let owned: Vec<String> = self.client.hkeys(keys::PORT_OWNER).await?;
        for port in self.pool().await? {
            if owned.contains(&port_field(port)) {
                continue;
            }
            let claimed: Option<String> = self
                .client
                .set(
                    port_claim_key(port),
                    "reserved",
                    Some(Expiration::EX(self.lease_secs)),
                    Some(SetOptions::NX),
                    false,
                )
                .await?;
            if claimed.is_some() {
                tracing::debug!(port, lease_secs = self.lease_secs, "port claimed");
                return Ok(Some(port));
            }
        }
        Ok(None)
    }

    async fn occupy(&self, port: u16, instance: &str) -> Result<bool> {
        let field = port_field(port);
        let name_bound: bool = self
            .client
            .hsetnx(keys::PORT_BY_NAME, instance, field.as_str())
            .await?;
        if !name_bound {
            return Ok(false);
        }
        let port_bound: bool = self
            .client
            .hsetnx(keys::PORT_OWNER, field.as_str(), instance)
            .await?;
        if !port_bound {
            self.client
                .hdel::<i64, _, _>(keys::PORT_BY_NAME, instance)
                .await?;
            return Ok(false);
        }
        self.client
            .hset::<(), _, _>(keys::PORT_OCCUPIED_AT, (field, Utc::now().to_rfc3339()))
            .await?;
        self.client.del::<i64, _>(port_claim_key(port)).await?;
        Ok(true)
    }

    async fn release(&self, instance: &str) -> Result<bool> {
        let bound: Option<String> = self.client.hget(keys::PORT_BY_NAME, instance).await?;
        let Some(port) = bound.and_then(|p| p.parse::<u16>().ok()) else {
            return Ok(false);
        };
        // occupy already dropped the claim; a claim seen here belongs to the
        // next reserver.
        self.clear_binding(port, instance).await?;
        tracing::debug!(port, instance = %instance, "binding cleared");
        Ok(true)
    }

    async fn release_by_number(&self, port: u16) -> Result<bool> {
        let owner: Option<String> = self
            .client
            .hget(keys::PORT_OWNER, port_field(port))
            .await?;
        // Claim first: reservers skip the port until the owner field is gone.
        let claims: i64 = self.client.del(port_claim_key(port)).await?;
        if let Some(owner) = &owner {
            self.clear_binding(port, owner).await?;
        }
        Ok(owner.is_some() || claims > 0)
    }

    async fn release_reservation(&self, port: u16) -> Result<bool> {
        let bound: bool = self
            .client
            .hexists(keys::PORT_OWNER, port_field(port))
            .await?;
        if bound {
            return Ok(false);
        }
        let claims: i64 = self.client.del(port_claim_key(port)).await?;
        Ok(claims > 0)
    }

    async fn list(&self) -> Result<Vec<PortRecord>> {
        let owners: HashMap<String, String> = self.client.hgetall(keys::PORT_OWNER).await?;
        let stamps: HashMap<String, String> =
            self.client.hgetall(keys::PORT_OCCUPIED_AT).await?;
        Ok(self
            .pool()
            .await?
            .into_iter()
            .map(|port| {
                let field = port_field(port);
                match owners.get(&field) {
                    Some(owner) => PortRecord {
                        number: port,
                        is_occupied: true,
                        owning_instance: Some(owner.clone()),
                        occupied_at: stamps
                            .get(&field)
                            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                            .map(|t| t.with_timezone(&Utc)),
                    },
                    None => PortRecord::free(port),
                }
            })
            .collect())
    }
}

#[async_trait]
impl InstanceStore for ValkeyStore {
    async fn insert(&self, instance: &Instance) -> Result<bool> {
        let json = serde_json::to_string(instance)?;
        let inserted: bool = self
            .client
            .hsetnx(keys::INSTANCES, instance.name.as_str(), json)
            .await?;
        Ok(inserted)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let removed: i64 = self.client.hdel(keys::INSTANCES, name).await?;
        Ok(removed > 0)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Instance>> {
        let raw: Option<String> = self.client.hget(keys::INSTANCES, name).await?;
        raw.map(|json| {
            serde_json::from_str(&json).with_context(|| format!("malformed instance row '{name}'"))
        })
        .transpose()
    }

    async fn list(&self, owner: Option<&str>) -> Result<Vec<Instance>> {
        let rows: Vec<String> = self.client.hvals(keys::INSTANCES).await?;
        let mut instances = Vec::with_capacity(rows.len());
        for json in rows {
            match serde_json::from_str::<Instance>(&json) {
                Ok(instance) if owner.is_none_or(|o| instance.owner == o) => {
                    instances.push(instance);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "skipping malformed instance row"),
            }
        }
        instances.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(instances)
    }

    async fn set_map(&self, name: &str, map: &str) -> Result<bool> {
        let Some(mut instance) = self.get_by_name(name).await? else {
            return Ok(false);
        };
        instance.current_map = Some(map.to_string());
        let json = serde_json::to_string(&instance)?;
        self.client
            .hset::<(), _, _>(keys::INSTANCES, (name, json))
            .await?;
        Ok(true)
    }
}

#[async_trait]
impl MapCatalog for ValkeyStore {
    async fn maps(&self) -> Result<Vec<MapItem>> {
        let raw: HashMap<String, String> = self.client.hgetall(keys::MAPS).await?;
        Ok(parse_catalog(raw))
    }
}

fn parse_catalog(raw: HashMap<String, String>) -> Vec<MapItem> {
    let mut maps: Vec<MapItem> = raw
        .into_iter()
        .filter_map(|(id, name)| {
            id.parse()
                .ok()
                .map(|map_id| MapItem { map_id, name })
        })
        .collect();
    maps.sort_by_key(|m| m.map_id);
    maps
}
