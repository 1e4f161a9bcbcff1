//! Instance and port domain types.
//!
//! This module is intentionally free of I/O, async, and external layer imports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::LifecycleError;

/// Request to create a dynamic game server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateSpec {
    pub name: String,
    /// Static servers are never reaped.
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

impl CreateSpec {
    #[must_use]
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_static: false,
        }
    }
}

/// Per-instance credential handed out by the credential issuer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    /// Remote account the token belongs to; `None` when the issuer does not
    /// track accounts (nothing to revoke).
    pub account_id: Option<String>,
    pub token: String,
}

/// Persisted server row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    pub port: u16,
    pub owner: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_map: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row of the port table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortRecord {
    pub number: u16,
    pub is_occupied: bool,
    pub owning_instance: Option<String>,
    pub occupied_at: Option<DateTime<Utc>>,
}

impl PortRecord {
    #[must_use]
    pub fn free(number: u16) -> Self {
        Self {
            number,
            is_occupied: false,
            owning_instance: None,
            occupied_at: None,
        }
    }
}

/// Validate a server name taken from a request.
///
/// # Errors
///
/// Returns [`LifecycleError::Validation`] for empty names and names that are
/// unsafe to use as a store key or shell word.
pub fn validate_name(name: &str) -> Result<(), LifecycleError> {
    if name.trim().is_empty() {
        return Err(LifecycleError::Validation(
            "Validation Error - server name is required".to_string(),
        ));
    }
    arena_common::validate_instance_name(name)
        .map_err(|reason| LifecycleError::Validation(format!("Validation Error - {reason}")))
}
