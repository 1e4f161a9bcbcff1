//! Typed lifecycle error taxonomy.
//!
//! This module has zero imports from `crate::infra`, `crate::application`,
//! `tokio`, or `std::process`. Collaborator failures arrive as
//! `anyhow::Error` and are translated into these variants at the
//! orchestration boundary.

use std::time::Duration;

use arena_common::ResponseStatus;
use thiserror::Error;

/// Coarse classification of a [`LifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    ResourceExhausted,
    ResourceConflict,
    RemoteExecution,
    InstanceNotFound,
    OperationTimeout,
    Setting,
    Internal,
}

/// Errors returned by the lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),

    #[error("Server '{0}' already exists")]
    NameTaken(String),

    #[error("You can't stop server '{name}' while there are players on it ({players} connected)")]
    PlayersPresent { name: String, players: u32 },

    #[error("No available ports")]
    ResourceExhausted,

    #[error("Failed to occupy port {port} for '{name}'")]
    ResourceConflict { port: u16, name: String },

    #[error("Remote command failed: {0}")]
    RemoteExecution(String),

    #[error("Server '{0}' not found")]
    InstanceNotFound(String),

    #[error("Request timeout - server '{name}' did not become {target} within {}s", .timeout.as_secs())]
    OperationTimeout {
        name: String,
        target: &'static str,
        timeout: Duration,
    },

    #[error("{message}")]
    Setting {
        field: String,
        status: ResponseStatus,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LifecycleError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NameTaken(_) | Self::PlayersPresent { .. } => ErrorKind::Conflict,
            Self::ResourceExhausted => ErrorKind::ResourceExhausted,
            Self::ResourceConflict { .. } => ErrorKind::ResourceConflict,
            Self::RemoteExecution(_) => ErrorKind::RemoteExecution,
            Self::InstanceNotFound(_) => ErrorKind::InstanceNotFound,
            Self::OperationTimeout { .. } => ErrorKind::OperationTimeout,
            Self::Setting { .. } => ErrorKind::Setting,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether repeating the same request later can succeed without the
    /// caller changing anything.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PlayersPresent { .. }
                | Self::ResourceExhausted
                | Self::ResourceConflict { .. }
                | Self::OperationTimeout { .. }
                | Self::RemoteExecution(_)
        )
    }

    /// `failed` for caller-side problems, `error` for server-side ones.
    #[must_use]
    pub fn response_status(&self) -> ResponseStatus {
        match self {
            Self::Setting { status, .. } => *status,
            Self::RemoteExecution(_) | Self::Internal(_) | Self::ResourceConflict { .. } => {
                ResponseStatus::Error
            }
            _ => ResponseStatus::Failed,
        }
    }

    /// HTTP status code the transport layer should use.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 422,
            Self::NameTaken(_) | Self::PlayersPresent { .. } => 409,
            Self::ResourceExhausted => 503,
            Self::InstanceNotFound(_) => 404,
            Self::OperationTimeout { .. } => 408,
            Self::Setting { status, .. } => {
                if *status == ResponseStatus::Error {
                    500
                } else {
                    400
                }
            }
            Self::ResourceConflict { .. } | Self::RemoteExecution(_) | Self::Internal(_) => 500,
        }
    }

    pub(crate) fn internal(err: &anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }

    pub(crate) fn remote(err: &anyhow::Error) -> Self {
        Self::RemoteExecution(format!("{err:#}"))
    }
}
