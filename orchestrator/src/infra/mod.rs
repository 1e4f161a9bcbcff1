//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, SSH,
//! HTTP clients and stores.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.

pub mod command_runner;
pub mod credentials;
pub mod memory;
pub mod ssh;
pub mod status_feed;
pub mod valkey;

pub use command_runner::TokioCommandRunner;
pub use credentials::{GameServerAccountIssuer, StaticTokenIssuer};
pub use memory::InMemoryStore;
pub use ssh::{SshRemoteExec, SshTarget};
pub use status_feed::HttpStatusFeed;
pub use valkey::ValkeyStore;
