//! Settings request/report types.
//!
//! This module is intentionally free of I/O, async, and external layer imports.

use std::collections::BTreeMap;

use arena_common::StatusBody;
use serde::Serialize;
use serde_json::{Map, Value};

/// Field carrying a map change (`{"map_id": 5}`).
pub const MAP_FIELD: &str = "map_id";

/// Keys that identify the target server rather than request a change.
pub const IDENTIFIER_FIELDS: &[&str] = &["name", "server_name", "server_id"];

/// Aggregated per-field results of a settings request.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SettingsReport {
    pub data: BTreeMap<String, StatusBody>,
}

/// The change-carrying fields of a request, in key order.
#[must_use]
pub fn requested_fields(changes: &Map<String, Value>) -> Vec<(&str, &Value)> {
    changes
        .iter()
        .filter(|(key, value)| !IDENTIFIER_FIELDS.contains(&key.as_str()) && !value.is_null())
        .map(|(key, value)| (key.as_str(), value))
        .collect()
}
