use serde::{Deserialize, Serialize};

/// Liveness reported by the status feed for one game server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
}

/// One entry of the status feed.
///
/// The feed has shipped with two spellings for the occupancy fields
/// (`players_current` / `players_max` and `player_count` / `max_players`);
/// both are accepted on input, the latter is emitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub name: String,
    pub status: ServerStatus,
    #[serde(default, alias = "players_current")]
    pub player_count: u32,
    #[serde(default, alias = "players_max")]
    pub max_players: u32,
    /// Map currently loaded, by name (e.g. `de_dust2`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl StatusSnapshot {
    /// A minimal offline entry, as the feed reports a server it cannot reach.
    #[must_use]
    pub fn offline(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ServerStatus::Offline,
            player_count: 0,
            max_players: 0,
            map: None,
            ip: None,
            port: None,
        }
    }

    /// An online entry with the given occupancy and map.
    #[must_use]
    pub fn online(name: impl Into<String>, player_count: u32, map: Option<&str>) -> Self {
        Self {
            name: name.into(),
            status: ServerStatus::Online,
            player_count,
            max_players: 10,
            map: map.map(str::to_owned),
            ip: None,
            port: None,
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status == ServerStatus::Online
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.status == ServerStatus::Offline
    }

    /// Online with nobody connected. Offline servers are never idle: the
    /// feed cannot observe occupancy for them.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.is_online() && self.player_count == 0
    }
}

/// Entry of the map catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MapItem {
    pub map_id: i64,
    pub name: String,
}

/// Outcome classification used in every response body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    /// The request was understood but could not be honoured (client side).
    Failed,
    /// Something broke while serving the request (server side).
    Error,
}

/// `{status, msg}` body returned for every non-data response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusBody {
    pub status: ResponseStatus,
    pub msg: String,
}

impl StatusBody {
    #[must_use]
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            msg: msg.into(),
        }
    }

    #[must_use]
    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failed,
            msg: msg.into(),
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            msg: msg.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}
