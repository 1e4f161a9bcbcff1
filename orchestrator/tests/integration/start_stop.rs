//! Start and stop scenarios.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use arena_orchestrator::application::ports::{CommandOutput, RemoteExec};
use arena_orchestrator::domain::ErrorKind;
use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::eq;
use tokio::time::Instant;

use crate::support::{RecordingRemote, ScriptedFeed, arena, offline, online};

mock! {
    pub Remote {}

    #[async_trait]
    impl RemoteExec for Remote {
        async fn run(&self, command: &str) -> Result<CommandOutput>;
    }
}

#[tokio::test(start_paused = true)]
async fn stop_with_a_player_connected_sends_no_command() {
    let mut remote = MockRemote::new();
    remote.expect_run().never();
    let a = arena(
        ScriptedFeed::new(vec![online("srv1", 1, "de_dust2")]),
        Arc::new(remote),
    );

    let err = a.orchestrator.stop("srv1").await.expect_err("occupied");

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.status_code(), 409);
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn stop_of_unknown_server_sends_no_command() {
    let mut remote = MockRemote::new();
    remote.expect_run().never();
    let a = arena(
        ScriptedFeed::new(vec![online("other", 0, "de_dust2")]),
        Arc::new(remote),
    );

    let err = a.orchestrator.stop("srv1").await.expect_err("absent");

    assert_eq!(err.kind(), ErrorKind::InstanceNotFound);
}

#[tokio::test(start_paused = true)]
async fn stop_with_feed_down_is_internal() {
    let mut remote = MockRemote::new();
    remote.expect_run().never();
    let a = arena(ScriptedFeed::new(vec![None]), Arc::new(remote));

    let err = a.orchestrator.stop("srv1").await.expect_err("feed down");

    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test(start_paused = true)]
async fn empty_server_stops_and_is_confirmed_offline() {
    let mut remote = MockRemote::new();
    remote
        .expect_run()
        .with(eq("docker stop srv1"))
        .times(1)
        .returning(|_| Ok(CommandOutput::default()));
    let feed = ScriptedFeed::new(vec![
        online("srv1", 0, "de_dust2"),
        online("srv1", 0, "de_dust2"),
        offline("srv1"),
    ]);
    let a = arena(feed.clone(), Arc::new(remote));

    let snapshot = a.orchestrator.stop("srv1").await.expect("stopped");

    assert!(snapshot.is_offline());
    assert_eq!(feed.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn start_is_confirmed_online() {
    let remote = RecordingRemote::new();
    let feed = ScriptedFeed::new(vec![offline("srv1"), online("srv1", 0, "de_nuke")]);
    let a = arena(feed, remote.clone());

    let snapshot = a.orchestrator.start("srv1").await.expect("started");

    assert_eq!(snapshot.map.as_deref(), Some("de_nuke"));
    assert_eq!(remote.sent(), vec!["docker start srv1"]);
}

#[tokio::test(start_paused = true)]
async fn start_timeout_is_reported_without_rollback() {
    let remote = RecordingRemote::new();
    let a = arena(ScriptedFeed::new(vec![offline("srv1")]), remote.clone());

    let started = Instant::now();
    let err = a.orchestrator.start("srv1").await.expect_err("stays offline");

    assert_eq!(err.kind(), ErrorKind::OperationTimeout);
    assert_eq!(err.status_code(), 408);
    assert_eq!(started.elapsed(), Duration::from_secs(60));
    assert_eq!(remote.sent(), vec!["docker start srv1"]);
}

#[tokio::test(start_paused = true)]
async fn start_failure_on_host_is_remote_execution() {
    let remote = RecordingRemote::failing_on("docker start");
    let feed = ScriptedFeed::new(vec![offline("srv1")]);
    let a = arena(feed.clone(), remote);

    let err = a.orchestrator.start("srv1").await.expect_err("host refused");

    assert_eq!(err.kind(), ErrorKind::RemoteExecution);
    assert_eq!(feed.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn blank_name_is_rejected() {
    let mut remote = MockRemote::new();
    remote.expect_run().never();
    let a = arena(ScriptedFeed::new(vec![offline("srv1")]), Arc::new(remote));

    let start = a.orchestrator.start("").await.expect_err("blank");
    let stop = a.orchestrator.stop(" ").await.expect_err("blank");

    assert_eq!(start.kind(), ErrorKind::Validation);
    assert_eq!(stop.kind(), ErrorKind::Validation);
}
