//! Application services: use-case orchestration.
//!
//! Each service module implements one concern by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`.

pub mod idle_reaper;
pub mod lifecycle;
pub mod port_allocator;
pub mod rollback;
pub mod settings;
pub mod status_poller;

#[cfg(test)]
pub(crate) mod test_support;

pub use idle_reaper::{ReaperExit, ReaperRegistry, ReaperSettings, Teardown, spawn_reaper};
pub use lifecycle::{Collaborators, CreatedInstance, Orchestrator};
pub use port_allocator::PortAllocator;
pub use settings::{MapChangeHandler, SettingHandler, SettingsDispatcher};
pub use status_poller::{StatusPoller, Target};
