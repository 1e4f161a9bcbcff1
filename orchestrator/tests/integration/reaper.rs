//! Idle reaper scenarios, end to end through the orchestrator.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use arena_orchestrator::application::ports::{InstanceStore, PortTable};
use arena_orchestrator::application::services::{
    ReaperExit, ReaperRegistry, ReaperSettings, StatusPoller, Teardown, spawn_reaper,
};
use arena_orchestrator::{CreateSpec, LifecycleConfig};
use async_trait::async_trait;

use crate::support::{RecordingRemote, ScriptedFeed, arena_with, online};

#[derive(Default)]
struct CountingTeardown {
    calls: AtomicUsize,
}

#[async_trait]
impl Teardown for CountingTeardown {
    async fn teardown(&self, _name: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

fn config(threshold: u32) -> LifecycleConfig {
    LifecycleConfig {
        idle_threshold: threshold,
        ..LifecycleConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn idle_server_is_destroyed_after_threshold() {
    let feed = ScriptedFeed::new(vec![online("srv1", 0, "de_dust2")]);
    let remote = RecordingRemote::new();
    let a = arena_with(feed, remote.clone(), config(3));
    a.orchestrator
        .create(&CreateSpec::dynamic("srv1"), "alice")
        .await
        .expect("create");

    tokio::time::sleep(Duration::from_secs(2 * 60 + 30)).await;
    assert_eq!(remote.count("docker rm"), 0, "two idle ticks are not enough");

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(remote.count("docker rm srv1"), 1);
    assert_eq!(a.issuer.revoked(), vec!["acct-srv1"]);
    assert!(a.store.get_by_name("srv1").await.expect("get").is_none());
    let ports = PortTable::list(a.store.as_ref()).await.expect("ports");
    assert!(ports.iter().all(|p| !p.is_occupied));
}

#[tokio::test(start_paused = true)]
async fn busy_server_is_kept() {
    let feed = ScriptedFeed::new(vec![online("srv1", 4, "de_dust2")]);
    let remote = RecordingRemote::new();
    let a = arena_with(feed, remote.clone(), config(2));
    a.orchestrator
        .create(&CreateSpec::dynamic("srv1"), "alice")
        .await
        .expect("create");

    tokio::time::sleep(Duration::from_secs(10 * 60)).await;

    assert_eq!(remote.count("docker rm"), 0);
    assert!(a.orchestrator.is_reaping("srv1"));
}

#[tokio::test(start_paused = true)]
async fn explicit_destroy_cancels_the_reaper() {
    let feed = ScriptedFeed::new(vec![online("srv1", 0, "de_dust2")]);
    let remote = RecordingRemote::new();
    let a = arena_with(feed, remote.clone(), config(2));
    a.orchestrator
        .create(&CreateSpec::dynamic("srv1"), "alice")
        .await
        .expect("create");

    assert!(a.orchestrator.destroy("srv1").await);
    assert!(!a.orchestrator.is_reaping("srv1"));

    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    assert_eq!(remote.count("docker rm srv1"), 1);
    assert_eq!(a.issuer.revoked().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn overlapping_reapers_tear_down_once() {
    let feed = ScriptedFeed::new(vec![online("srv1", 0, "de_dust2")]);
    let poller = StatusPoller::new(feed, Duration::from_secs(60), Duration::from_secs(1));
    let registry = ReaperRegistry::new();
    let teardown = Arc::new(CountingTeardown::default());
    let settings = ReaperSettings {
        tick: Duration::from_secs(60),
        threshold: 3,
    };

    let first = spawn_reaper(
        &registry,
        poller.clone(),
        teardown.clone(),
        "srv1".into(),
        settings,
    );
    tokio::time::sleep(Duration::from_secs(90)).await;
    let second = spawn_reaper(
        &registry,
        poller,
        teardown.clone(),
        "srv1".into(),
        settings,
    );

    let exits = [
        first.await.expect("join first"),
        second.await.expect("join second"),
    ];
    assert_eq!(teardown.calls.load(Ordering::SeqCst), 1);
    assert!(exits.contains(&ReaperExit::Reaped { destroyed: true }));
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_every_reaper() {
    let feed = ScriptedFeed::new(vec![Some(vec![
        arena_common::StatusSnapshot::online("a", 0, Some("de_dust2")),
        arena_common::StatusSnapshot::online("b", 0, Some("de_dust2")),
    ])]);
    let remote = RecordingRemote::new();
    let a = arena_with(feed, remote.clone(), config(2));
    for name in ["a", "b"] {
        a.orchestrator
            .create(&CreateSpec::dynamic(name), "alice")
            .await
            .expect("create");
    }

    assert_eq!(a.orchestrator.shutdown(), 2);
    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    assert_eq!(remote.count("docker rm"), 0);
}
