pub mod config;
pub mod redis_keys;
pub mod types;

pub use config::{ConfigError, DaemonConfig};
pub use redis_keys::{
    keys, port_claim_key, port_field, ttl, validate_instance_name,
};
pub use types::*;
