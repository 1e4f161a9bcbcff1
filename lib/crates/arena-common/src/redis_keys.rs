/// Valkey key layout for the arena store
pub mod keys {
    /// Every managed port
    /// Format: arena:ports:pool (sorted set)
    /// Score: port number, so ZRANGE yields ascending order
    pub const PORT_POOL: &str = "arena:ports:pool";

    /// Occupied ports
    /// Format: arena:ports:owner (hash)
    /// Field: port number, Value: owning instance name
    pub const PORT_OWNER: &str = "arena:ports:owner";

    /// Reverse binding, one port per instance
    /// Format: arena:ports:by_name (hash)
    /// Field: instance name, Value: port number
    pub const PORT_BY_NAME: &str = "arena:ports:by_name";

    /// When each occupied port was bound
    /// Format: arena:ports:occupied_at (hash)
    /// Field: port number, Value: RFC 3339 timestamp
    pub const PORT_OCCUPIED_AT: &str = "arena:ports:occupied_at";

    /// Pending reservations (lock-and-skip claims)
    /// Format: arena:ports:claim:{port}
    /// Value: "reserved"
    /// TTL: ttl::PORT_RESERVATION_SECS
    pub const PORT_CLAIM: &str = "arena:ports:claim";

    /// Instance rows
    /// Format: arena:instances (hash)
    /// Field: instance name, Value: JSON-serialized instance
    pub const INSTANCES: &str = "arena:instances";

    /// Map catalog
    /// Format: arena:maps (hash)
    /// Field: map id, Value: map name
    pub const MAPS: &str = "arena:maps";
}

/// TTL constants
pub mod ttl {
    /// Lifetime of an unconfirmed port reservation (2 minutes).
    /// Long enough to cover launch plus persistence before `occupy`.
    pub const PORT_RESERVATION_SECS: u64 = 120;
}

/// Hash field for a port number.
pub fn port_field(port: u16) -> String {
    port.to_string()
}

pub fn port_claim_key(port: u16) -> String {
    format!("{}:{}", keys::PORT_CLAIM, port)
}

/// Validate an instance name before it is used in a store key or rendered
/// into a remote shell command.
///
/// Accepted: 1-63 chars, `[A-Za-z0-9][A-Za-z0-9_.-]*`.
pub fn validate_instance_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("instance name must not be empty");
    }
    if name.len() > 63 {
        return Err("instance name must be at most 63 characters");
    }
    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err("instance name must start with a letter or digit");
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err("instance name may only contain [A-Za-z0-9_.-]");
    }
    Ok(())
}
