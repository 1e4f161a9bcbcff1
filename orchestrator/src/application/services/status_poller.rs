//! Bounded polling of the status feed.
//!
//! One poller serves start, stop and create: callers pick the [`Target`]
//! state and the poller retries until it is observed or the deadline passes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use arena_common::StatusSnapshot;
use tokio::time::Instant;

use crate::application::ports::StatusFeed;
use crate::domain::LifecycleError;

/// State a poll waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Online,
    Offline,
}

impl Target {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }

    #[must_use]
    pub fn holds(self, snapshot: &StatusSnapshot) -> bool {
        match self {
            Self::Online => snapshot.is_online(),
            Self::Offline => snapshot.is_offline(),
        }
    }
}

/// Polls the status feed for one instance at a time.
#[derive(Clone)]
pub struct StatusPoller {
    feed: Arc<dyn StatusFeed>,
    timeout: Duration,
    interval: Duration,
}

impl StatusPoller {
    #[must_use]
    pub fn new(feed: Arc<dyn StatusFeed>, timeout: Duration, interval: Duration) -> Self {
        Self {
            feed,
            timeout,
            interval,
        }
    }

    /// Fetch the feed once and pick out `name`.
    ///
    /// # Errors
    ///
    /// Returns the feed's error unchanged.
    pub async fn snapshot(&self, name: &str) -> Result<Option<StatusSnapshot>> {
        let list = self.feed.list().await?;
        Ok(list.into_iter().find(|s| s.name == name))
    }

    /// Fetch the whole feed once.
    ///
    /// # Errors
    ///
    /// Returns the feed's error unchanged.
    pub async fn all(&self) -> Result<Vec<StatusSnapshot>> {
        self.feed.list().await
    }

    /// Poll until `name` reaches `target`.
    ///
    /// The deadline is measured from entry. Feed errors count as failed
    /// attempts and are retried until the deadline.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::InstanceNotFound`] as soon as the feed answers
    ///   without an entry for `name`.
    /// - [`LifecycleError::OperationTimeout`] when the deadline passes.
    pub async fn wait_for(
        &self,
        name: &str,
        target: Target,
    ) -> Result<StatusSnapshot, LifecycleError> {
        let deadline = Instant::now() + self.timeout;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.snapshot(name).await {
                Ok(Some(snapshot)) if target.holds(&snapshot) => {
                    tracing::info!(instance = %name, target = target.label(), attempt, "target state reached");
                    return Ok(snapshot);
                }
                Ok(Some(snapshot)) => {
                    tracing::debug!(instance = %name, status = ?snapshot.status, attempt, "waiting");
                }
                Ok(None) => return Err(LifecycleError::InstanceNotFound(name.to_string())),
                Err(e) => {
                    tracing::debug!(instance = %name, error = %e, attempt, "status fetch failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(instance = %name, target = target.label(), attempt, "poll timed out");
                return Err(LifecycleError::OperationTimeout {
                    name: name.to_string(),
                    target: target.label(),
                    timeout: self.timeout,
                });
            }
            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }
    }
}
