// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Fixtures shared by the integration tests.

#![allow(clippy::unwrap_used)]
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use galley_core::{
    ActionPayload, Backoff, IssueReport, ManualClock, OrderStatus, ResourceAssignment,
    SnapshotEntities, StatusChange, UsageAdjustment,
};
use galley_sync::{
    Connectivity, CoreParts, CoreSettings, DurableStore, KindPolicies, MemoryStore, RemoteApi,
    RemoteFailure, RemoteFuture, RemoteResult, ResilienceCore, RetryPolicy,
};

pub const T0_MS: u64 = 1_700_000_000_000;

pub fn status_change(order: &str, to: OrderStatus) -> ActionPayload {
    ActionPayload::StatusChange(StatusChange {
        order_id: order.to_string(),
        item_id: None,
        from: None,
        to,
    })
}

pub fn usage(item: &str, delta: f64) -> ActionPayload {
    ActionPayload::ResourceUsageAdjustment(UsageAdjustment {
        item_id: item.to_string(),
        quantity_delta: delta,
        unit: "g".to_string(),
        reason: "prep".to_string(),
        order_id: None,
    })
}

/// Remote that records mutations and answers from a script.
#[derive(Default)]
pub struct KitchenStub {
    script: Mutex<VecDeque<RemoteResult<()>>>,
    failure: Mutex<Option<RemoteFailure>>,
    calls: Mutex<Vec<ActionPayload>>,
}

impl KitchenStub {
    pub fn new() -> Arc<Self> {
        Arc::new(KitchenStub::default())
    }

    pub fn push_result(&self, result: RemoteResult<()>) {
        self.script.lock().unwrap().push_back(result);
    }

    /// Unscripted calls fail with `failure` until cleared with `None`.
    pub fn set_failure(&self, failure: Option<RemoteFailure>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn calls(&self) -> Vec<ActionPayload> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, payload: ActionPayload) -> RemoteFuture<'_, ()> {
        self.calls.lock().unwrap().push(payload);
        let scripted = self.script.lock().unwrap().pop_front();
        let result = scripted.unwrap_or_else(|| match self.failure.lock().unwrap().clone() {
            Some(failure) => Err(failure),
            None => Ok(()),
        });
        Box::pin(async move { result })
    }
}

impl RemoteApi for KitchenStub {
    fn update_status(&self, change: StatusChange) -> RemoteFuture<'_, ()> {
        self.answer(ActionPayload::StatusChange(change))
    }

    fn record_usage(&self, usage: UsageAdjustment) -> RemoteFuture<'_, ()> {
        self.answer(ActionPayload::ResourceUsageAdjustment(usage))
    }

    fn assign_resource(&self, assignment: ResourceAssignment) -> RemoteFuture<'_, ()> {
        self.answer(ActionPayload::ResourceAssignment(assignment))
    }

    fn report_issue(&self, report: IssueReport) -> RemoteFuture<'_, ()> {
        self.answer(ActionPayload::IssueReport(report))
    }

    fn ping(&self) -> RemoteFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn fetch_snapshot(&self) -> RemoteFuture<'_, SnapshotEntities> {
        Box::pin(async { Err(RemoteFailure::rejected(503, "snapshot unavailable")) })
    }
}

/// Single attempt per pass, `queue_max` attempts before dead-lettering.
pub fn settings(queue_max: u32) -> CoreSettings {
    let backoff = Backoff::new(Duration::from_millis(5), Duration::from_millis(20), 2.0).unwrap();
    CoreSettings {
        policies: KindPolicies::uniform(RetryPolicy::new(1, backoff).unwrap(), queue_max),
        ..CoreSettings::default()
    }
}

pub fn build_core(
    store: Arc<dyn DurableStore>,
    remote: Arc<dyn RemoteApi>,
    settings: CoreSettings,
    initial: Connectivity,
) -> Arc<ResilienceCore> {
    let core = ResilienceCore::new(CoreParts {
        store,
        remote,
        clock: Arc::new(ManualClock::new(T0_MS)),
        settings,
        initial,
    })
    .unwrap();
    Arc::new(core)
}

pub fn memory_core(
    remote: Arc<dyn RemoteApi>,
    settings: CoreSettings,
    initial: Connectivity,
) -> Arc<ResilienceCore> {
    build_core(Arc::new(MemoryStore::new()), remote, settings, initial)
}

/// Loopback kitchen server speaking the terminal protocol. Accepts every
/// mutation and records the method names it saw.
pub struct KitchenServer {
    pub addr: SocketAddr,
    pub methods: Arc<Mutex<Vec<String>>>,
}

impl KitchenServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let methods = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&methods);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(Message::Text(text))) = ws.next().await {
                        let frame: Value = serde_json::from_str(&text).unwrap();
                        let method = frame["method"].as_str().unwrap_or_default().to_string();
                        let result = match method.as_str() {
                            "fetch_snapshot" => json!({}),
                            _ => Value::Null,
                        };
                        seen.lock().unwrap().push(method);
                        let reply = json!({ "id": frame["id"].clone(), "result": result });
                        if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        KitchenServer { addr, methods }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }
}
