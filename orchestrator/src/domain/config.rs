//! Lifecycle timing configuration.
//!
//! This module is intentionally free of I/O, async, and external layer imports.

use std::time::Duration;

use arena_common::DaemonConfig;
use arena_common::config::ConfigError;

use crate::domain::commands::LaunchProfile;

/// Timings that drive polling, reaping and settings verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Deadline for a start/stop/create confirmation poll.
    pub poll_timeout: Duration,
    /// Pause between two status fetches while polling.
    pub poll_interval: Duration,
    /// Reaper observation period.
    pub reaper_tick: Duration,
    /// Consecutive idle ticks before an instance is destroyed.
    pub idle_threshold: u32,
    /// Pause between a map-change console command and its verification.
    pub map_change_grace: Duration,
    pub launch: LaunchProfile,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            reaper_tick: Duration::from_secs(60),
            idle_threshold: 5,
            map_change_grace: Duration::from_secs(2),
            launch: LaunchProfile::default(),
        }
    }
}

impl LifecycleConfig {
    /// Build from the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured port range is empty.
    pub fn from_daemon(cfg: &DaemonConfig) -> Result<Self, ConfigError> {
        cfg.port_range()?;
        Ok(Self {
            poll_timeout: Duration::from_secs(cfg.poll_timeout_secs),
            poll_interval: Duration::from_secs(cfg.poll_interval_secs.max(1)),
            reaper_tick: Duration::from_secs(cfg.reaper_tick_secs.max(1)),
            idle_threshold: cfg.idle_threshold(),
            map_change_grace: Duration::from_secs(cfg.map_change_grace_secs),
            launch: LaunchProfile {
                image: cfg.image.clone(),
                container_port: cfg.container_port,
                volume: cfg.volume.clone(),
                cfg_url: cfg.cfg_url.clone(),
                console_prefix: cfg.console_prefix.clone(),
            },
        })
    }
}
