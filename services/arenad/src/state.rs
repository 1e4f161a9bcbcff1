//! Adapter wiring for the daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use arena_common::DaemonConfig;
use arena_orchestrator::application::ports::{
    CredentialIssuer, InstanceStore, MapCatalog, PortTable,
};
use arena_orchestrator::infra::{
    GameServerAccountIssuer, HttpStatusFeed, InMemoryStore, SshRemoteExec, SshTarget,
    StaticTokenIssuer, TokioCommandRunner, ValkeyStore,
};
use arena_orchestrator::{Collaborators, LifecycleConfig, Orchestrator};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// One adapter serving the port table, the instance rows and the map catalog.
struct Stores {
    ports: Arc<dyn PortTable>,
    instances: Arc<dyn InstanceStore>,
    maps: Arc<dyn MapCatalog>,
}

impl Stores {
    fn shared<S>(store: Arc<S>) -> Self
    where
        S: PortTable + InstanceStore + MapCatalog + 'static,
    {
        Self {
            ports: store.clone(),
            instances: store.clone(),
            maps: store,
        }
    }
}

impl AppState {
    /// Build every adapter from `config` and wire the orchestrator.
    ///
    /// Connects to Valkey (and seeds it) when a URL is configured, otherwise
    /// keeps everything in memory.
    pub async fn new(config: &DaemonConfig) -> Result<Self> {
        let lifecycle = LifecycleConfig::from_daemon(config).context("invalid lifecycle config")?;
        let range = config.port_range()?;
        let maps = config.map_items()?;
        let lease = Duration::from_secs(config.port_reservation_secs);

        let stores = match &config.valkey_url {
            Some(url) => {
                let password = match &config.valkey_pass_file {
                    Some(path) => Some(
                        std::fs::read_to_string(path)
                            .with_context(|| format!("failed to read password from {path}"))?
                            .trim()
                            .to_string(),
                    ),
                    None => None,
                };
                let store = ValkeyStore::connect(
                    url,
                    config.valkey_user.as_deref(),
                    password.as_deref(),
                )
                .await
                .context("failed to initialise Valkey connection")?
                .with_lease(lease);
                store
                    .seed(range, &maps)
                    .await
                    .context("failed to seed port pool")?;
                tracing::info!(valkey_url = %url, "using Valkey store");
                Stores::shared(Arc::new(store))
            }
            None => {
                tracing::warn!("no Valkey URL configured, state is kept in memory");
                Stores::shared(Arc::new(InMemoryStore::new(range, maps).with_lease(lease)))
            }
        };

        let runner = Arc::new(TokioCommandRunner::default());
        let remote = SshRemoteExec::new(
            SshTarget {
                host: config.ssh_host.clone(),
                user: config.ssh_user.clone(),
                port: config.ssh_port,
                key_path: config.ssh_key_path.clone(),
            },
            runner,
        );
        let feed = HttpStatusFeed::new(config.status_feed_url.clone())?;

        let orchestrator = Orchestrator::new(
            Collaborators {
                feed: Arc::new(feed),
                ports: stores.ports,
                instances: stores.instances,
                maps: stores.maps,
                remote: Arc::new(remote),
                credentials: credentials(config)?,
            },
            lifecycle,
        );
        Ok(Self { orchestrator })
    }
}

fn credentials(config: &DaemonConfig) -> Result<Arc<dyn CredentialIssuer>> {
    if let Some(key) = &config.steam_web_api_key {
        tracing::info!("issuing a game-server account per instance");
        return Ok(Arc::new(GameServerAccountIssuer::new(key.clone())?));
    }
    if let Some(token) = &config.server_token {
        tracing::info!("using the configured static server token");
        return Ok(Arc::new(StaticTokenIssuer::new(token.clone())));
    }
    bail!("either ARENA_STEAM_WEB_API_KEY or ARENA_SERVER_TOKEN must be set")
}
