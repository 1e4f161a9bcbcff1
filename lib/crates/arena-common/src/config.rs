use serde::Deserialize;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use thiserror::Error;

use crate::types::MapItem;

/// Lowest and highest accepted idle thresholds, in reaper ticks.
pub const IDLE_THRESHOLD_BOUNDS: (u32, u32) = (2, 5);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port range {start}..={end} is empty")]
    EmptyPortRange { start: u16, end: u16 },

    #[error("invalid map entry '{0}': expected <map_id>:<name>")]
    InvalidMapEntry(String),
}

/// arenad configuration, loaded from `ARENA_*` environment variables.
///
/// Only the SSH target is required; everything else has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Listen address (default: 0.0.0.0:8080)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Valkey URL. When unset the daemon keeps ports and instances in memory.
    pub valkey_url: Option<String>,

    /// ACL username for Valkey.
    pub valkey_user: Option<String>,

    /// Path to a file containing the Valkey ACL password (Docker secret).
    pub valkey_pass_file: Option<String>,

    /// Endpoint returning the live server list as JSON.
    #[serde(default = "default_status_feed_url")]
    pub status_feed_url: String,

    /// Host running the game-server containers.
    pub ssh_host: String,

    pub ssh_user: String,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// Private key used for the SSH connection.
    #[serde(default = "default_ssh_key_path")]
    pub ssh_key_path: String,

    /// First port of the pool (inclusive).
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,

    /// Last port of the pool (inclusive).
    #[serde(default = "default_port_range_end")]
    pub port_range_end: u16,

    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_reaper_tick_secs")]
    pub reaper_tick_secs: u64,

    /// Consecutive empty ticks before an instance is reaped.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold: u32,

    /// Pause between a map-change console command and the verification poll.
    #[serde(default = "default_map_change_grace_secs")]
    pub map_change_grace_secs: u64,

    /// Lifetime of an unconfirmed port reservation.
    #[serde(default = "default_port_reservation_secs")]
    pub port_reservation_secs: u64,

    /// Container image launched for every dynamic instance.
    #[serde(default = "default_image")]
    pub image: String,

    /// Game port inside the container.
    #[serde(default = "default_container_port")]
    pub container_port: u16,

    /// Volume mount passed to `docker run -v`.
    pub volume: Option<String>,

    /// Server config archive URL passed as `CS2_CFG_URL`.
    pub cfg_url: Option<String>,

    /// Console command prefix; `{name}` is replaced by the instance name.
    #[serde(default = "default_console_prefix")]
    pub console_prefix: String,

    /// Game-server account web API key. Takes precedence over `server_token`.
    pub steam_web_api_key: Option<String>,

    /// Fixed server login token used when no web API key is configured.
    pub server_token: Option<String>,

    /// Map catalog seed for the in-memory store, as `<id>:<name>` entries.
    #[serde(default)]
    pub maps: Vec<String>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_status_feed_url() -> String {
    "http://status-feed:8080/api/cs2/servers".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_key_path() -> String {
    "ssh_key".to_string()
}

fn default_port_range_start() -> u16 {
    28015
}

fn default_port_range_end() -> u16 {
    28034
}

fn default_poll_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_reaper_tick_secs() -> u64 {
    60
}

fn default_idle_threshold() -> u32 {
    5
}

fn default_map_change_grace_secs() -> u64 {
    2
}

fn default_port_reservation_secs() -> u64 {
    crate::redis_keys::ttl::PORT_RESERVATION_SECS
}

fn default_image() -> String {
    "joedwards32/cs2".to_string()
}

fn default_container_port() -> u16 {
    27015
}

fn default_console_prefix() -> String {
    "cs2-server @prac{name} exec".to_string()
}

impl DaemonConfig {
    /// The managed port pool.
    pub fn port_range(&self) -> Result<RangeInclusive<u16>, ConfigError> {
        if self.port_range_start > self.port_range_end {
            return Err(ConfigError::EmptyPortRange {
                start: self.port_range_start,
                end: self.port_range_end,
            });
        }
        Ok(self.port_range_start..=self.port_range_end)
    }

    /// Idle threshold clamped to [`IDLE_THRESHOLD_BOUNDS`].
    #[must_use]
    pub fn idle_threshold(&self) -> u32 {
        let (lo, hi) = IDLE_THRESHOLD_BOUNDS;
        self.idle_threshold.clamp(lo, hi)
    }

    /// Parse the `maps` seed entries.
    pub fn map_items(&self) -> Result<Vec<MapItem>, ConfigError> {
        self.maps
            .iter()
            .map(|entry| {
                let (id, name) = entry
                    .split_once(':')
                    .ok_or_else(|| ConfigError::InvalidMapEntry(entry.clone()))?;
                let map_id = id
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ConfigError::InvalidMapEntry(entry.clone()))?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(ConfigError::InvalidMapEntry(entry.clone()));
                }
                Ok(MapItem {
                    map_id,
                    name: name.to_string(),
                })
            })
            .collect()
    }
}
