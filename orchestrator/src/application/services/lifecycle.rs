//! Game-server lifecycle: create, start, stop, destroy and settings.
//!
//! Imports only from `crate::domain` and `crate::application`.

use std::collections::HashSet;
use std::sync::Arc;

use arena_common::{MapItem, StatusSnapshot};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::application::ports::{
    CommandOutput, CredentialIssuer, InstanceStore, MapCatalog, PortTable, RemoteExec, StatusFeed,
};
use crate::application::services::idle_reaper::{
    ReaperRegistry, ReaperSettings, Teardown, spawn_reaper,
};
use crate::application::services::port_allocator::PortAllocator;
use crate::application::services::rollback::{Compensation, Compensations, Compensator};
use crate::application::services::settings::{MapChangeHandler, SettingsDispatcher};
use crate::application::services::status_poller::{StatusPoller, Target};
use crate::domain::commands::is_missing_container;
use crate::domain::{
    CreateSpec, Instance, LifecycleConfig, LifecycleError, PortRecord, RemoteCommand,
    SettingsReport, validate_name,
};

/// Adapters the orchestrator runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub feed: Arc<dyn StatusFeed>,
    pub ports: Arc<dyn PortTable>,
    pub instances: Arc<dyn InstanceStore>,
    pub maps: Arc<dyn MapCatalog>,
    pub remote: Arc<dyn RemoteExec>,
    pub credentials: Arc<dyn CredentialIssuer>,
}

/// Result of a successful `create`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreatedInstance {
    pub instance: Instance,
    pub snapshot: StatusSnapshot,
}

/// Entry point for every lifecycle operation. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: LifecycleConfig,
    poller: StatusPoller,
    ports: PortAllocator,
    instances: Arc<dyn InstanceStore>,
    maps: Arc<dyn MapCatalog>,
    remote: Arc<dyn RemoteExec>,
    credentials: Arc<dyn CredentialIssuer>,
    settings: SettingsDispatcher,
    reapers: ReaperRegistry,
}

impl Orchestrator {
    /// Wire the orchestrator and its settings handlers.
    #[must_use]
    pub fn new(collaborators: Collaborators, config: LifecycleConfig) -> Self {
        let poller = StatusPoller::new(
            Arc::clone(&collaborators.feed),
            config.poll_timeout,
            config.poll_interval,
        );
        let map_change = MapChangeHandler::new(
            Arc::clone(&collaborators.maps),
            Arc::clone(&collaborators.instances),
            Arc::clone(&collaborators.remote),
            poller.clone(),
            config.launch.clone(),
            config.map_change_grace,
        );
        let settings =
            SettingsDispatcher::new().with_handler(MapChangeHandler::FIELD, Arc::new(map_change));
        Self {
            inner: Arc::new(Inner {
                poller,
                ports: PortAllocator::new(collaborators.ports),
                instances: collaborators.instances,
                maps: collaborators.maps,
                remote: collaborators.remote,
                credentials: collaborators.credentials,
                settings,
                reapers: ReaperRegistry::new(),
                config,
            }),
        }
    }

    /// Launch a new instance and wait for it to come online.
    ///
    /// Steps run strictly in order: credential, port, container, row,
    /// port binding, online confirmation. Any failure undoes the completed
    /// steps in reverse. A port lost to another instance is never released,
    /// and if the container cannot be removed its port and row are kept for
    /// a later [`destroy`](Self::destroy).
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Validation`] for a bad name.
    /// - [`LifecycleError::NameTaken`] if the name is already in use.
    /// - [`LifecycleError::ResourceExhausted`] if no port is free.
    /// - [`LifecycleError::RemoteExecution`] if the credential cannot be
    ///   issued or the container cannot be launched.
    /// - [`LifecycleError::ResourceConflict`] if the port was taken before it
    ///   could be bound.
    /// - [`LifecycleError::OperationTimeout`] if the server never came online.
    pub async fn create(
        &self,
        spec: &CreateSpec,
        owner: &str,
    ) -> Result<CreatedInstance, LifecycleError> {
        let name = spec.name.as_str();
        validate_name(name)?;
        match self.inner.instances.get_by_name(name).await {
            Ok(Some(_)) => return Err(LifecycleError::NameTaken(name.to_string())),
            Ok(None) => {}
            Err(e) => return Err(LifecycleError::internal(&e)),
        }

        let mut undo = Compensations::new();
        match self.create_steps(spec, owner, &mut undo).await {
            Ok(created) => {
                undo.commit();
                if !spec.is_static {
                    self.watch(name);
                }
                tracing::info!(instance = %name, port = created.instance.port, "server created");
                Ok(created)
            }
            Err(err) => {
                tracing::warn!(instance = %name, error = %err, steps = undo.len(), "create failed, rolling back");
                let outcome = undo.unwind(self.inner.as_ref()).await;
                if !outcome.is_complete() {
                    tracing::warn!(
                        instance = %name,
                        failed = outcome.failed,
                        kept = outcome.kept,
                        "rollback incomplete, destroy to retry"
                    );
                }
                Err(err)
            }
        }
    }

    async fn create_steps(
        &self,
        spec: &CreateSpec,
        owner: &str,
        undo: &mut Compensations,
    ) -> Result<CreatedInstance, LifecycleError> {
        let name = spec.name.as_str();
        let inner = &self.inner;

        let credential = inner
            .credentials
            .issue(name)
            .await
            .map_err(|e| LifecycleError::remote(&e.context("issuing server credential")))?;
        if let Some(account) = &credential.account_id {
            undo.push(Compensation::RevokeCredential(account.clone()));
        }

        let port = inner.ports.reserve().await?;
        undo.push(Compensation::ReleaseReservation(port));

        inner
            .run(&RemoteCommand::Launch {
                name,
                port,
                token: &credential.token,
            })
            .await?;
        undo.push(Compensation::RemoveContainer(name.to_string()));

        let mut instance = Instance {
            name: name.to_string(),
            port,
            owner: owner.to_string(),
            is_static: spec.is_static,
            external_account_id: credential.account_id.clone(),
            external_token: Some(credential.token.clone()),
            current_map: None,
            created_at: Utc::now(),
        };
        match inner.instances.insert(&instance).await {
            Ok(true) => undo.push(Compensation::DeleteRow(name.to_string())),
            Ok(false) => return Err(LifecycleError::NameTaken(name.to_string())),
            Err(e) => return Err(LifecycleError::internal(&e)),
        }

        inner.ports.occupy(port, name).await?;
        undo.replace(
            &Compensation::ReleaseReservation(port),
            Compensation::ReleaseBinding(name.to_string()),
        );

        let snapshot = inner.poller.wait_for(name, Target::Online).await?;
        if let Some(map) = &snapshot.map {
            if let Err(e) = inner.instances.set_map(name, map).await {
                tracing::warn!(instance = %name, error = %e, "could not record current map");
            }
            instance.current_map = Some(map.clone());
        }
        Ok(CreatedInstance { instance, snapshot })
    }

    fn watch(&self, name: &str) {
        let settings = ReaperSettings {
            tick: self.inner.config.reaper_tick,
            threshold: self.inner.config.idle_threshold,
        };
        let teardown: Arc<dyn Teardown> = Arc::new(self.clone());
        // Detached: the registry owns cancellation, not the handle.
        drop(spawn_reaper(
            &self.inner.reapers,
            self.inner.poller.clone(),
            teardown,
            name.to_string(),
            settings,
        ));
    }

    /// Start a stopped container and wait for it to come online.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Validation`] for a bad name.
    /// - [`LifecycleError::RemoteExecution`] if the start command fails.
    /// - [`LifecycleError::InstanceNotFound`] / [`LifecycleError::OperationTimeout`]
    ///   from the confirmation poll. Nothing is rolled back.
    pub async fn start(&self, name: &str) -> Result<StatusSnapshot, LifecycleError> {
        validate_name(name)?;
        self.inner.run(&RemoteCommand::Start(name)).await?;
        let snapshot = self.inner.poller.wait_for(name, Target::Online).await?;
        tracing::info!(instance = %name, "server started");
        Ok(snapshot)
    }

    /// Stop a running container, refusing while players are connected.
    ///
    /// The player check and the stop command are not atomic.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Validation`] for a bad name.
    /// - [`LifecycleError::Internal`] if the status feed is unreachable.
    /// - [`LifecycleError::InstanceNotFound`] if the feed does not list it.
    /// - [`LifecycleError::PlayersPresent`] if anyone is connected; no
    ///   command is sent.
    /// - [`LifecycleError::RemoteExecution`] / [`LifecycleError::OperationTimeout`]
    ///   as for `start`.
    pub async fn stop(&self, name: &str) -> Result<StatusSnapshot, LifecycleError> {
        validate_name(name)?;
        let snapshot = match self.inner.poller.snapshot(name).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Err(LifecycleError::InstanceNotFound(name.to_string())),
            Err(e) => return Err(LifecycleError::internal(&e)),
        };
        if snapshot.player_count >= 1 {
            return Err(LifecycleError::PlayersPresent {
                name: name.to_string(),
                players: snapshot.player_count,
            });
        }
        self.inner.run(&RemoteCommand::Stop(name)).await?;
        let snapshot = self.inner.poller.wait_for(name, Target::Offline).await?;
        tracing::info!(instance = %name, "server stopped");
        Ok(snapshot)
    }

    /// Tear an instance down completely.
    ///
    /// Cancels its reaper, revokes its credential, stops and removes the
    /// container, then frees the port and deletes the row. Returns `false`
    /// if the container could not be removed, in which case the port
    /// and row are kept so the teardown can be retried. A name that fails
    /// validation is refused with `false` before anything is touched.
    pub async fn destroy(&self, name: &str) -> bool {
        if let Err(e) = validate_name(name) {
            tracing::warn!(instance = %name, error = %e, "refusing to destroy");
            return false;
        }
        let inner = &self.inner;
        if inner.reapers.cancel(name) {
            tracing::debug!(instance = %name, "reaper cancelled");
        }

        let row = inner.instances.get_by_name(name).await.unwrap_or_else(|e| {
            tracing::warn!(instance = %name, error = %e, "instance lookup failed");
            None
        });
        if let Some(account) = row.as_ref().and_then(|r| r.external_account_id.as_deref()) {
            if let Err(e) = inner.credentials.revoke(account).await {
                tracing::warn!(instance = %name, error = %e, "credential revoke failed");
            }
        }

        if let Err(e) = inner.remove_container(name).await {
            tracing::warn!(instance = %name, error = %e, "container removal failed");
            return false;
        }

        inner.ports.release(name).await;
        if let Err(e) = inner.instances.delete(name).await {
            tracing::warn!(instance = %name, error = %e, "row delete failed");
        }
        tracing::info!(instance = %name, "server destroyed");
        true
    }

    /// Apply a settings request to `name`.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Validation`] for a bad name or a request with no
    ///   supported field.
    /// - [`LifecycleError::Setting`] when a handler rejects or fails a change.
    /// - [`LifecycleError::InstanceNotFound`] if the server is not in the feed.
    pub async fn execute_settings(
        &self,
        name: &str,
        changes: &Map<String, Value>,
    ) -> Result<SettingsReport, LifecycleError> {
        validate_name(name)?;
        self.inner.settings.dispatch(name, changes).await
    }

    /// Live status of every server, or of `owner`'s servers only.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Internal`] if the feed or the store is unreachable.
    pub async fn list_servers(
        &self,
        owner: Option<&str>,
    ) -> Result<Vec<StatusSnapshot>, LifecycleError> {
        let all = self
            .inner
            .poller
            .all()
            .await
            .map_err(|e| LifecycleError::internal(&e))?;
        let Some(owner) = owner else {
            return Ok(all);
        };
        let owned: HashSet<String> = self
            .inner
            .instances
            .list(Some(owner))
            .await
            .map_err(|e| LifecycleError::internal(&e))?
            .into_iter()
            .map(|i| i.name)
            .collect();
        Ok(all.into_iter().filter(|s| owned.contains(&s.name)).collect())
    }

    /// The map catalog.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Internal`] if the catalog is unreachable.
    pub async fn maps(&self) -> Result<Vec<MapItem>, LifecycleError> {
        self.inner
            .maps
            .maps()
            .await
            .map_err(|e| LifecycleError::internal(&e))
    }

    /// Port table rows.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Internal`] if the table is unreachable.
    pub async fn ports(&self) -> Result<Vec<PortRecord>, LifecycleError> {
        self.inner.ports.list().await
    }

    /// Whether a reaper is currently watching `name`.
    #[must_use]
    pub fn is_reaping(&self, name: &str) -> bool {
        self.inner.reapers.is_watching(name)
    }

    /// Cancel every reaper. Returns how many were running.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.inner.reapers.cancel_all();
        tracing::info!(cancelled, "reapers cancelled");
        cancelled
    }
}

#[async_trait]
impl Teardown for Orchestrator {
    async fn teardown(&self, name: &str) -> bool {
        self.destroy(name).await
    }
}

impl Inner {
    /// Render and run a remote command; text on stderr counts as failure.
    async fn run(&self, command: &RemoteCommand<'_>) -> Result<CommandOutput, LifecycleError> {
        let line = self.config.launch.render(command);
        tracing::debug!(action = command.action(), "running remote command");
        let out = self
            .remote
            .run(&line)
            .await
            .map_err(|e| LifecycleError::remote(&e))?;
        match out.reported_error() {
            Some(stderr) => Err(LifecycleError::RemoteExecution(stderr.to_string())),
            None => Ok(out),
        }
    }

    /// `docker stop` then `docker rm`. A container that no longer exists
    /// counts as removed.
    async fn remove_container(&self, name: &str) -> anyhow::Result<()> {
        if let Err(e) = self.run(&RemoteCommand::Stop(name)).await {
            tracing::debug!(instance = %name, error = %e, "stop before remove failed");
        }
        match self.run(&RemoteCommand::Remove(name)).await {
            Ok(_) => Ok(()),
            Err(LifecycleError::RemoteExecution(stderr)) if is_missing_container(&stderr) => Ok(()),
            Err(e) => Err(anyhow::anyhow!(e)),
        }
    }
}

#[async_trait]
impl Compensator for Inner {
    async fn compensate(&self, step: &Compensation) -> anyhow::Result<()> {
        match step {
            Compensation::RevokeCredential(account) => self.credentials.revoke(account).await,
            Compensation::ReleaseReservation(port) => {
                self.ports.release_reservation(*port).await;
                Ok(())
            }
            Compensation::ReleaseBinding(name) => {
                self.ports.release(name).await;
                Ok(())
            }
            Compensation::RemoveContainer(name) => self.remove_container(name).await,
            Compensation::DeleteRow(name) => self.instances.delete(name).await.map(|_| ()),
        }
    }
}
