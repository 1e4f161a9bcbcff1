//! Port allocation over the [`PortTable`] port.
//!
//! Translates store results into lifecycle errors; the atomicity of
//! `reserve` is the table's responsibility.

use std::sync::Arc;

use crate::application::ports::PortTable;
use crate::domain::{LifecycleError, PortRecord};

/// Hands out and reclaims game-server ports.
#[derive(Clone)]
pub struct PortAllocator {
    table: Arc<dyn PortTable>,
}

impl PortAllocator {
    #[must_use]
    pub fn new(table: Arc<dyn PortTable>) -> Self {
        Self { table }
    }

    /// Reserve the lowest free port.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::ResourceExhausted`] when every port is taken,
    /// [`LifecycleError::Internal`] when the table cannot be reached.
    pub async fn reserve(&self) -> Result<u16, LifecycleError> {
        match self.table.reserve().await {
            Ok(Some(port)) => {
                tracing::debug!(port, "port reserved");
                Ok(port)
            }
            Ok(None) => {
                tracing::warn!("port pool exhausted");
                Err(LifecycleError::ResourceExhausted)
            }
            Err(e) => Err(LifecycleError::internal(&e)),
        }
    }

    /// Bind a reserved port to `name`.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::ResourceConflict`] if the port or the name is
    /// already bound.
    pub async fn occupy(&self, port: u16, name: &str) -> Result<(), LifecycleError> {
        match self.table.occupy(port, name).await {
            Ok(true) => {
                tracing::info!(port, instance = %name, "port occupied");
                Ok(())
            }
            Ok(false) => Err(LifecycleError::ResourceConflict {
                port,
                name: name.to_string(),
            }),
            Err(e) => Err(LifecycleError::internal(&e)),
        }
    }

    /// Free the port bound to `name`. Store failures are logged and reported
    /// as `false`.
    pub async fn release(&self, name: &str) -> bool {
        match self.table.release(name).await {
            Ok(released) => {
                if released {
                    tracing::info!(instance = %name, "port released");
                }
                released
            }
            Err(e) => {
                tracing::warn!(instance = %name, error = %e, "port release failed");
                false
            }
        }
    }

    /// Free `port` and any reservation on it.
    pub async fn release_port(&self, port: u16) -> bool {
        match self.table.release_by_number(port).await {
            Ok(released) => released,
            Err(e) => {
                tracing::warn!(port, error = %e, "port release failed");
                false
            }
        }
    }

    /// Drop this caller's reservation on `port` without touching a binding.
    pub async fn release_reservation(&self, port: u16) -> bool {
        match self.table.release_reservation(port).await {
            Ok(dropped) => {
                if dropped {
                    tracing::debug!(port, "reservation dropped");
                }
                dropped
            }
            Err(e) => {
                tracing::warn!(port, error = %e, "reservation release failed");
                false
            }
        }
    }

    /// # Errors
    ///
    /// [`LifecycleError::Internal`] when the table cannot be read.
    pub async fn list(&self) -> Result<Vec<PortRecord>, LifecycleError> {
        self.table
            .list()
            .await
            .map_err(|e| LifecycleError::internal(&e))
    }
}
