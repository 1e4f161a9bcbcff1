//! Arena orchestrator library: lifecycle of ephemeral game-server containers.
//!
//! Layers: `domain` (pure types and rules), `application` (ports and
//! services), `infra` (adapters).

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod application;
pub mod domain;
pub mod infra;

pub use application::services::{Collaborators, CreatedInstance, Orchestrator};
pub use domain::{CreateSpec, LifecycleConfig, LifecycleError};
