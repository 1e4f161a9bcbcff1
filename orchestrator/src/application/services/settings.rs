//! Settings dispatch and the map-change handler.
//!
//! Requests are `{field: value}` objects; each recognised field is routed to
//! the handler registered for it at startup.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arena_common::{ResponseStatus, StatusBody};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::application::ports::{InstanceStore, MapCatalog, RemoteExec};
use crate::application::services::status_poller::StatusPoller;
use crate::domain::commands::is_shell_safe;
use crate::domain::settings::{MAP_FIELD, requested_fields};
use crate::domain::{LaunchProfile, LifecycleError, RemoteCommand, SettingsReport};

/// Applies one setting to a running instance.
#[async_trait]
pub trait SettingHandler: Send + Sync {
    /// Apply `value` to instance `name`.
    ///
    /// Outcomes the caller should see (applied, rejected, remote failure) are
    /// returned as a [`StatusBody`]; `Err` is reserved for lookups that fail
    /// outright.
    ///
    /// # Errors
    ///
    /// Returns a [`LifecycleError`] when the instance or its status cannot be
    /// found.
    async fn apply(&self, name: &str, value: &Value) -> Result<StatusBody, LifecycleError>;
}

/// Field → handler table.
#[derive(Clone, Default)]
pub struct SettingsDispatcher {
    handlers: BTreeMap<&'static str, Arc<dyn SettingHandler>>,
}

impl SettingsDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_handler(mut self, field: &'static str, handler: Arc<dyn SettingHandler>) -> Self {
        self.handlers.insert(field, handler);
        self
    }

    /// Recognised fields, in order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Route every recognised field in `changes` to its handler.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Validation`] if no field in `changes` has a handler.
    /// - [`LifecycleError::Setting`] for the first handler that reports
    ///   `failed` or `error`.
    /// - Any error a handler returns.
    pub async fn dispatch(
        &self,
        name: &str,
        changes: &Map<String, Value>,
    ) -> Result<SettingsReport, LifecycleError> {
        let mut work = Vec::new();
        for (field, value) in requested_fields(changes) {
            match self.handlers.get(field) {
                Some(handler) => work.push((field, value, Arc::clone(handler))),
                None => tracing::debug!(instance = %name, field, "ignoring unsupported setting"),
            }
        }
        if work.is_empty() {
            return Err(LifecycleError::Validation(
                "Validation Error - no supported settings in request".to_string(),
            ));
        }

        let mut report = SettingsReport::default();
        for (field, value, handler) in work {
            let outcome = handler.apply(name, value).await?;
            if outcome.status != ResponseStatus::Success {
                tracing::warn!(instance = %name, field, msg = %outcome.msg, "setting not applied");
                return Err(LifecycleError::Setting {
                    field: field.to_string(),
                    status: outcome.status,
                    message: outcome.msg,
                });
            }
            report.data.insert(field.to_string(), outcome);
        }
        Ok(report)
    }
}

/// Changes the map of a running instance through its console.
pub struct MapChangeHandler {
    catalog: Arc<dyn MapCatalog>,
    store: Arc<dyn InstanceStore>,
    remote: Arc<dyn RemoteExec>,
    poller: StatusPoller,
    profile: LaunchProfile,
    grace: Duration,
}

impl MapChangeHandler {
    pub const FIELD: &'static str = MAP_FIELD;

    #[must_use]
    pub fn new(
        catalog: Arc<dyn MapCatalog>,
        store: Arc<dyn InstanceStore>,
        remote: Arc<dyn RemoteExec>,
        poller: StatusPoller,
        profile: LaunchProfile,
        grace: Duration,
    ) -> Self {
        Self {
            catalog,
            store,
            remote,
            poller,
            profile,
            grace,
        }
    }

    async fn resolve(&self, value: &Value) -> Result<Result<String, StatusBody>, LifecycleError> {
        let Some(map_id) = parse_map_id(value) else {
            return Ok(Err(StatusBody::failed("Invalid map_id")));
        };
        let maps = self
            .catalog
            .maps()
            .await
            .map_err(|e| LifecycleError::internal(&e))?;
        Ok(match maps.into_iter().find(|m| m.map_id == map_id) {
            Some(map) if is_shell_safe(&map.name) => Ok(map.name),
            Some(map) => {
                tracing::warn!(map_id, map = %map.name, "catalog map name is not shell-safe");
                Err(StatusBody::failed(format!("Map {map_id} cannot be used")))
            }
            None => Err(StatusBody::failed(format!("Map {map_id} not found"))),
        })
    }

    async fn current_map(&self, name: &str) -> Result<Option<String>, LifecycleError> {
        match self.poller.snapshot(name).await {
            Ok(Some(snapshot)) => Ok(snapshot.map),
            Ok(None) => Err(LifecycleError::InstanceNotFound(name.to_string())),
            Err(e) => Err(LifecycleError::internal(&e)),
        }
    }
}

#[async_trait]
impl SettingHandler for MapChangeHandler {
    async fn apply(&self, name: &str, value: &Value) -> Result<StatusBody, LifecycleError> {
        let target = match self.resolve(value).await? {
            Ok(target) => target,
            Err(rejection) => return Ok(rejection),
        };

        if self.current_map(name).await?.as_deref() == Some(target.as_str()) {
            return Ok(StatusBody::failed("Map already set"));
        }

        let line = format!("map {target}");
        let command = self
            .profile
            .render(&RemoteCommand::Console { name, line: &line });
        match self.remote.run(&command).await {
            Ok(out) => {
                if let Some(stderr) = out.reported_error() {
                    return Ok(StatusBody::error(format!("Map change failed: {stderr}")));
                }
            }
            Err(e) => return Ok(StatusBody::error(format!("Map change failed: {e:#}"))),
        }
        tracing::info!(instance = %name, map = %target, "map change sent");

        tokio::time::sleep(self.grace).await;

        let observed = match self.poller.snapshot(name).await {
            Ok(snapshot) => snapshot.and_then(|s| s.map),
            Err(e) => {
                tracing::warn!(instance = %name, error = %e, "map change verification fetch failed");
                None
            }
        };
        if observed.as_deref() != Some(target.as_str()) {
            return Ok(StatusBody::failed("Map has not been changed"));
        }
        if let Err(e) = self.store.set_map(name, &target).await {
            tracing::warn!(instance = %name, error = %e, "could not record current map");
        }
        Ok(StatusBody::success("Map has been changed"))
    }
}

fn parse_map_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
