// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios through the public API.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use common::{
    build_core, memory_core, settings, status_change, usage, KitchenServer, KitchenStub,
};
use galley_core::{ErrorCode, OrderStatus};
use galley_sync::{ActionOutcome, Connectivity, JsonFileStore, RemoteFailure, WsRemote};

#[tokio::test(start_paused = true)]
async fn offline_changes_replay_in_order_after_reconnect() {
    let remote = KitchenStub::new();
    let core = memory_core(remote.clone(), settings(5), Connectivity::Offline);
    let payloads = vec![
        status_change("O1", OrderStatus::Preparing),
        status_change("O1", OrderStatus::Ready),
        status_change("O1", OrderStatus::Served),
    ];
    for p in &payloads {
        let outcome = core.enqueue_or_execute(p.clone(), None).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Queued { applied: true, .. }));
    }
    assert_eq!(core.snapshot().order("O1").unwrap().status, OrderStatus::Served);

    core.report_connectivity(Connectivity::Online);
    let result = core.drain().await.unwrap();

    assert_eq!(result.synced_count, 3);
    assert_eq!(core.pending_count(), 0);
    assert_eq!(remote.calls(), payloads);
}

#[tokio::test(start_paused = true)]
async fn queue_and_snapshot_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let remote = KitchenStub::new();

    let ids: Vec<String> = {
        let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
        let core = build_core(store, remote.clone(), settings(5), Connectivity::Offline);
        let mut ids = Vec::new();
        for p in [status_change("O2", OrderStatus::Preparing), usage("basil", -15.0)] {
            let outcome = core.enqueue_or_execute(p, None).await.unwrap();
            let ActionOutcome::Queued { action, .. } = outcome else {
                panic!("expected the action to be queued");
            };
            ids.push(action.id);
        }
        ids
    };

    let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    let core = build_core(store, remote.clone(), settings(5), Connectivity::Online);
    let reloaded: Vec<String> = core.pending_actions().into_iter().map(|a| a.id).collect();
    assert_eq!(reloaded, ids);
    assert_eq!(core.snapshot().order("O2").unwrap().status, OrderStatus::Preparing);

    let result = core.drain().await.unwrap();
    assert_eq!(result.synced_count, 2);
    assert_eq!(remote.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failing_action_is_dead_lettered_exactly_once() {
    let remote = KitchenStub::new();
    remote.set_failure(Some(RemoteFailure::rejected(500, "boom")));
    let core = memory_core(remote.clone(), settings(2), Connectivity::Offline);
    core.enqueue_or_execute(status_change("O3", OrderStatus::Cancelled), None).await.unwrap();
    core.report_connectivity(Connectivity::Online);

    for _ in 0..4 {
        core.drain().await.unwrap();
    }

    let dead = core.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempt_count, 2);
    assert_eq!(core.pending_count(), 0);
    assert_eq!(remote.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failure_on_one_order_does_not_hold_back_others() {
    let remote = KitchenStub::new();
    remote.push_result(Err(RemoteFailure::rejected(409, "stale version")));
    let core = memory_core(remote.clone(), settings(5), Connectivity::Offline);
    for p in [
        status_change("O4", OrderStatus::Ready),
        status_change("O4", OrderStatus::Served),
        status_change("O5", OrderStatus::Ready),
    ] {
        core.enqueue_or_execute(p, None).await.unwrap();
    }
    core.report_connectivity(Connectivity::Online);

    let first = core.drain().await.unwrap();
    assert_eq!(first.synced_count, 1);
    assert_eq!(first.deferred.len(), 1);
    assert_eq!(first.errors[0].code(), ErrorCode::Conflict);

    let second = core.drain().await.unwrap();
    assert_eq!(second.synced_count, 2);
    assert_eq!(core.pending_count(), 0);
    assert_eq!(
        remote.calls(),
        vec![
            status_change("O4", OrderStatus::Ready),
            status_change("O5", OrderStatus::Ready),
            status_change("O4", OrderStatus::Ready),
            status_change("O4", OrderStatus::Served),
        ]
    );
}

#[tokio::test]
async fn queued_actions_reach_kitchen_server_over_websocket() {
    let server = KitchenServer::start().await;
    let remote = Arc::new(WsRemote::new(server.url()));
    let core = memory_core(remote, settings(5), Connectivity::Offline);

    core.enqueue_or_execute(status_change("O6", OrderStatus::Preparing), None).await.unwrap();
    core.enqueue_or_execute(usage("rice", -200.0), None).await.unwrap();
    core.report_connectivity(Connectivity::Online);

    let result = core.drain().await.unwrap();
    assert_eq!(result.synced_count, 2);

    let ready = status_change("O6", OrderStatus::Ready);
    let outcome = core.enqueue_or_execute(ready, None).await.unwrap();
    assert_eq!(outcome, ActionOutcome::Executed);

    assert_eq!(
        server.methods(),
        vec!["update_status", "record_usage", "fetch_snapshot", "update_status"]
    );
}

#[tokio::test]
async fn unreachable_server_keeps_actions_queued() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let remote = Arc::new(WsRemote::new(format!("ws://{addr}")));
    let core = memory_core(remote, settings(5), Connectivity::Online);

    let ready = status_change("O8", OrderStatus::Ready);
    let outcome = core.enqueue_or_execute(ready, None).await.unwrap();

    assert!(matches!(outcome, ActionOutcome::Queued { .. }));
    assert_eq!(core.connectivity(), Connectivity::Offline);
    assert_eq!(core.pending_count(), 1);
}
