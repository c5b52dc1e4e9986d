// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for unit tests in this crate.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use galley_core::{
    ActionPayload, Backoff, DomainError, IssueReport, IssueSubject, ManualClock, OrderStatus,
    ResourceAssignment, Severity, SnapshotEntities, StatusChange, TransportFault, UsageAdjustment,
};

use crate::connectivity::Connectivity;
use crate::remote::{RemoteApi, RemoteFailure, RemoteFuture, RemoteResult};
use crate::resilience::{ActionOutcome, CoreParts, CoreSettings, ResilienceCore};
use crate::retry::{KindPolicies, RetryPolicy};
use crate::store::MemoryStore;

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

pub fn assignment(order: &str, station: &str) -> ActionPayload {
    ActionPayload::ResourceAssignment(ResourceAssignment {
        order_id: order.to_string(),
        station_id: station.to_string(),
        item_ids: Vec::new(),
        priority: 0,
    })
}

pub fn issue(station: &str) -> ActionPayload {
    ActionPayload::IssueReport(IssueReport {
        subject: IssueSubject::Station(station.to_string()),
        category: "equipment".to_string(),
        description: "fryer not heating".to_string(),
        severity: Severity::Medium,
    })
}

type CallHook = Box<dyn Fn(&ActionPayload) + Send + Sync>;

/// Scripted [`RemoteApi`] that records every mutation it receives.
///
/// Mutation calls pop results from the script in order; once the script is
/// empty they return the default result (success unless `fail_with` was
/// called).
pub struct MockRemote {
    script: Mutex<VecDeque<RemoteResult<()>>>,
    default: Mutex<RemoteResult<()>>,
    calls: Mutex<Vec<ActionPayload>>,
    reachable: AtomicBool,
    pings: AtomicUsize,
    snapshot: Mutex<Option<SnapshotEntities>>,
    snapshot_fetches: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    on_call: Mutex<Option<CallHook>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(MockRemote {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(Ok(())),
            calls: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
            pings: AtomicUsize::new(0),
            snapshot: Mutex::new(Some(SnapshotEntities::default())),
            snapshot_fetches: AtomicUsize::new(0),
            delay: Mutex::new(None),
            on_call: Mutex::new(None),
        })
    }

    /// Queues one result for the next mutation call.
    pub fn push_result(&self, result: RemoteResult<()>) {
        self.script.lock().unwrap().push_back(result);
    }

    /// Every unscripted mutation call fails with `failure`.
    pub fn fail_with(&self, failure: RemoteFailure) {
        *self.default.lock().unwrap() = Err(failure);
    }

    pub fn succeed(&self) {
        *self.default.lock().unwrap() = Ok(());
    }

    pub fn set_ping(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// `None` makes snapshot fetches fail.
    pub fn set_snapshot(&self, snapshot: Option<SnapshotEntities>) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    /// Every mutation call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Runs `hook` at the start of every mutation call.
    pub fn on_call(&self, hook: impl Fn(&ActionPayload) + Send + Sync + 'static) {
        *self.on_call.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<ActionPayload> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn snapshot_fetches(&self) -> usize {
        self.snapshot_fetches.load(Ordering::SeqCst)
    }

    fn mutation(&self, payload: ActionPayload) -> RemoteFuture<'_, ()> {
        Box::pin(async move {
            if let Some(hook) = self.on_call.lock().unwrap().as_ref() {
                hook(&payload);
            }
            self.calls.lock().unwrap().push(payload);
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let scripted = self.script.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| self.default.lock().unwrap().clone())
        })
    }
}

impl RemoteApi for MockRemote {
    fn update_status(&self, change: StatusChange) -> RemoteFuture<'_, ()> {
        self.mutation(ActionPayload::StatusChange(change))
    }

    fn record_usage(&self, usage: UsageAdjustment) -> RemoteFuture<'_, ()> {
        self.mutation(ActionPayload::ResourceUsageAdjustment(usage))
    }

    fn assign_resource(&self, assignment: ResourceAssignment) -> RemoteFuture<'_, ()> {
        self.mutation(ActionPayload::ResourceAssignment(assignment))
    }

    fn report_issue(&self, report: IssueReport) -> RemoteFuture<'_, ()> {
        self.mutation(ActionPayload::IssueReport(report))
    }

    fn ping(&self) -> RemoteFuture<'_, ()> {
        Box::pin(async move {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.reachable.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(RemoteFailure::transport(TransportFault::Refused, "ping refused"))
            }
        })
    }

    fn fetch_snapshot(&self) -> RemoteFuture<'_, SnapshotEntities> {
        Box::pin(async move {
            self.snapshot_fetches.fetch_add(1, Ordering::SeqCst);
            let snapshot = self.snapshot.lock().unwrap().clone();
            snapshot.ok_or_else(|| RemoteFailure::rejected(503, "snapshot unavailable"))
        })
    }
}

/// Every kind: `attempts` tries 10ms apart (doubling to 40ms), queued with
/// `queue_max` attempts.
pub fn fast_policies(attempts: u32, queue_max: u32) -> KindPolicies {
    let backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(40), 2.0).unwrap();
    KindPolicies::uniform(RetryPolicy::new(attempts, backoff).unwrap(), queue_max)
}

/// A core over in-memory collaborators.
pub struct TestCore {
    pub core: Arc<ResilienceCore>,
    pub remote: Arc<MockRemote>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestCore {
    pub fn new(settings: CoreSettings, initial: Connectivity) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), settings, initial)
    }

    pub fn with_store(
        store: Arc<MemoryStore>,
        settings: CoreSettings,
        initial: Connectivity,
    ) -> Self {
        let remote = MockRemote::new();
        let clock = Arc::new(ManualClock::new(T0_MS));
        let core = ResilienceCore::new(CoreParts {
            store: store.clone(),
            remote: remote.clone(),
            clock: clock.clone(),
            settings,
            initial,
        })
        .unwrap();
        TestCore { core: Arc::new(core), remote, store, clock }
    }

    pub async fn submit(&self, payload: ActionPayload) -> Result<ActionOutcome, DomainError> {
        self.core.enqueue_or_execute(payload, None).await
    }

    /// Default settings with fast retries: 2 direct attempts, 3 queued.
    pub fn fast(initial: Connectivity) -> Self {
        let settings = CoreSettings { policies: fast_policies(2, 3), ..CoreSettings::default() };
        Self::new(settings, initial)
    }
}
