//! Scenario tests for the arena orchestrator.
//!
//! Every scenario runs on a paused tokio clock against in-memory stores and
//! scripted collaborators, so timeouts and reaper ticks cost no wall time.

mod ports;
mod reaper;
mod settings;
mod start_stop;
