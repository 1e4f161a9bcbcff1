//! Domain layer: pure types, validation and command rendering.
//!
//! This module has zero imports from `crate::infra`, `crate::application`,
//! `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod commands;
pub mod config;
pub mod error;
pub mod instance;
pub mod settings;

pub use commands::{LaunchProfile, RemoteCommand};
pub use config::LifecycleConfig;
pub use error::{ErrorKind, LifecycleError};
pub use instance::{CreateSpec, Credential, Instance, PortRecord, validate_name};
pub use settings::SettingsReport;
