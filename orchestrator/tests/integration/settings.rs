//! Settings requests through the orchestrator.

#![allow(clippy::expect_used)]

use arena_common::ResponseStatus;
use arena_orchestrator::CreateSpec;
use arena_orchestrator::application::ports::InstanceStore;
use arena_orchestrator::domain::{ErrorKind, LifecycleError};
use serde_json::{Map, Value, json};

use crate::support::{RecordingRemote, ScriptedFeed, arena, online};

fn request(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn map_change_is_applied_and_recorded() {
    let feed = ScriptedFeed::new(vec![
        online("srv1", 0, "de_dust2"),
        online("srv1", 0, "de_dust2"),
        online("srv1", 0, "de_mirage"),
    ]);
    let remote = RecordingRemote::new();
    let a = arena(feed, remote.clone());
    let spec = CreateSpec {
        name: "srv1".into(),
        is_static: true,
    };
    a.orchestrator.create(&spec, "alice").await.expect("create");

    let report = a
        .orchestrator
        .execute_settings("srv1", &request(json!({"name": "srv1", "map_id": 5})))
        .await
        .expect("applied");

    let body = &report.data["map_id"];
    assert_eq!(body.status, ResponseStatus::Success);
    assert_eq!(body.msg, "Map has been changed");
    assert_eq!(remote.count("cs2-server @pracsrv1 exec map de_mirage"), 1);
    let row = a
        .store
        .get_by_name("srv1")
        .await
        .expect("get")
        .expect("row");
    assert_eq!(row.current_map.as_deref(), Some("de_mirage"));
}

#[tokio::test(start_paused = true)]
async fn same_map_is_rejected_without_console_command() {
    let remote = RecordingRemote::new();
    let a = arena(
        ScriptedFeed::new(vec![online("srv1", 2, "de_mirage")]),
        remote.clone(),
    );

    let err = a
        .orchestrator
        .execute_settings("srv1", &request(json!({"name": "srv1", "map_id": 5})))
        .await
        .expect_err("already on that map");

    assert_eq!(err.status_code(), 400);
    match err {
        LifecycleError::Setting {
            field,
            status,
            message,
        } => {
            assert_eq!(field, "map_id");
            assert_eq!(status, ResponseStatus::Failed);
            assert_eq!(message, "Map already set");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(remote.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn map_that_never_switches_is_reported() {
    let remote = RecordingRemote::new();
    let a = arena(
        ScriptedFeed::new(vec![online("srv1", 0, "de_dust2")]),
        remote.clone(),
    );

    let err = a
        .orchestrator
        .execute_settings("srv1", &request(json!({"map_id": "2"})))
        .await
        .expect_err("still on dust2");

    assert_eq!(err.kind(), ErrorKind::Setting);
    assert_eq!(err.to_string(), "Map has not been changed");
    assert_eq!(remote.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_map_is_rejected() {
    let remote = RecordingRemote::new();
    let a = arena(
        ScriptedFeed::new(vec![online("srv1", 0, "de_dust2")]),
        remote.clone(),
    );

    let err = a
        .orchestrator
        .execute_settings("srv1", &request(json!({"map_id": 42})))
        .await
        .expect_err("not in catalog");

    assert_eq!(err.to_string(), "Map 42 not found");
    assert!(remote.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn request_without_a_known_field_is_invalid() {
    let remote = RecordingRemote::new();
    let a = arena(
        ScriptedFeed::new(vec![online("srv1", 0, "de_dust2")]),
        remote.clone(),
    );

    let err = a
        .orchestrator
        .execute_settings("srv1", &request(json!({"name": "srv1", "hostname": "x"})))
        .await
        .expect_err("nothing to apply");

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.status_code(), 422);
    assert!(remote.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn settings_for_a_server_missing_from_the_feed() {
    let a = arena(
        ScriptedFeed::new(vec![online("other", 0, "de_dust2")]),
        RecordingRemote::new(),
    );

    let err = a
        .orchestrator
        .execute_settings("srv1", &request(json!({"map_id": 1})))
        .await
        .expect_err("absent");

    assert_eq!(err.kind(), ErrorKind::InstanceNotFound);
}
