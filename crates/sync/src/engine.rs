// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Replays queued actions against the remote.
//!
//! A drain pass works on a copy of the queue taken when it starts, so
//! actions enqueued while the pass is suspended wait for the next pass and
//! no action is dispatched twice by one pass. When an action fails, later
//! actions on the same [`ResourceKey`] are deferred to keep their order.
//!
//! The engine also owns the [`CachedSnapshot`]: optimistic updates from
//! producers, `last_synced_at` bookkeeping and reconciliation with the
//! remote copy once the queue is empty.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use galley_core::{
    ActionPayload, AttemptOutcome, CachedSnapshot, ClockSource, DomainError, ErrorCode,
    ErrorContext, PendingAction, ResourceKey,
};

use crate::connectivity::{Connectivity, ConnectivityMonitor, SignalSource};
use crate::queue::{ActionQueue, QueueError};
use crate::remote::{self, RemoteApi};
use crate::retry::{KindPolicies, RetryExecutor, RetryPolicy};
use crate::store::{self, DurableStore, StoreError, SNAPSHOT_KEY};

/// Why a drain did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DrainRejected {
    #[error("cannot drain while offline")]
    Offline,
    #[error("a drain is already in progress")]
    InProgress,
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncResult {
    pub synced_count: usize,
    /// Ids moved to dead-letters during the pass.
    pub dead_letters: Vec<String>,
    /// Every failure seen, in order.
    pub errors: Vec<DomainError>,
    /// Ids skipped because an earlier action on the same resource failed.
    pub deferred: Vec<String>,
    /// The pass ended before reaching the end of the queue.
    pub interrupted: bool,
}

/// What happened to one action during a pass.
enum Delivery {
    Synced,
    Failed,
    /// No longer in the queue.
    Gone,
}

/// Clears the in-progress flag when a drain ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Collaborators for [`SyncEngine::new`].
pub struct EngineParts {
    pub queue: Arc<ActionQueue>,
    pub remote: Arc<dyn RemoteApi>,
    pub executor: Arc<RetryExecutor>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub store: Arc<dyn DurableStore>,
    pub clock: Arc<dyn ClockSource>,
    pub policies: KindPolicies,
    pub dispatch_timeout: Duration,
}

/// Drains the action queue and owns the cached snapshot.
pub struct SyncEngine {
    queue: Arc<ActionQueue>,
    remote: Arc<dyn RemoteApi>,
    executor: Arc<RetryExecutor>,
    connectivity: Arc<ConnectivityMonitor>,
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn ClockSource>,
    policies: KindPolicies,
    dispatch_timeout: Duration,
    snapshot: Mutex<CachedSnapshot>,
    in_progress: AtomicBool,
}

/// Failures that mean the remote is unreachable rather than unhappy.
pub(crate) fn signals_offline(code: ErrorCode) -> bool {
    matches!(code, ErrorCode::NetworkUnavailable | ErrorCode::ConnectionLost)
}

fn storage_error(err: impl std::fmt::Display, context: ErrorContext) -> DomainError {
    DomainError::new(ErrorCode::StorageFailure, err.to_string(), context)
}

impl SyncEngine {
    /// Builds the engine and loads the cached snapshot from the store.
    pub fn new(parts: EngineParts) -> Result<Self, StoreError> {
        let snapshot: CachedSnapshot =
            store::load(parts.store.as_ref(), SNAPSHOT_KEY)?.unwrap_or_default();
        Ok(SyncEngine {
            queue: parts.queue,
            remote: parts.remote,
            executor: parts.executor,
            connectivity: parts.connectivity,
            store: parts.store,
            clock: parts.clock,
            policies: parts.policies,
            dispatch_timeout: parts.dispatch_timeout,
            snapshot: Mutex::new(snapshot),
            in_progress: AtomicBool::new(false),
        })
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, CachedSnapshot> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn policies(&self) -> &KindPolicies {
        &self.policies
    }

    pub fn is_draining(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> CachedSnapshot {
        self.lock_snapshot().clone()
    }

    /// Applies a payload to a copy of the snapshot, persists the copy, then
    /// swaps it in. Returns whether the payload changed cached state.
    pub fn apply_optimistic(&self, payload: &ActionPayload) -> Result<bool, StoreError> {
        let mut snapshot = self.lock_snapshot();
        let mut next = snapshot.clone();
        if !next.apply(payload, self.clock.now()) {
            return Ok(false);
        }
        store::save(self.store.as_ref(), SNAPSHOT_KEY, &next)?;
        *snapshot = next;
        Ok(true)
    }

    fn update_snapshot(&self, update: impl FnOnce(&mut CachedSnapshot)) -> Result<(), StoreError> {
        let mut snapshot = self.lock_snapshot();
        let mut next = snapshot.clone();
        update(&mut next);
        store::save(self.store.as_ref(), SNAPSHOT_KEY, &next)?;
        *snapshot = next;
        Ok(())
    }

    /// Sends one payload through the retry executor.
    pub async fn dispatch(
        &self,
        operation_id: &str,
        payload: &ActionPayload,
        context: ErrorContext,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), DomainError> {
        let remote = self.remote.as_ref();
        let timeout = self.dispatch_timeout;
        self.executor
            .execute_cancellable(operation_id, context, policy, cancel, |_| async move {
                remote::dispatch(remote, payload, timeout).await.map_err(Into::into)
            })
            .await
    }

    pub async fn drain(&self) -> Result<SyncResult, DrainRejected> {
        self.drain_cancellable(&CancellationToken::new()).await
    }

    /// One drain pass. `cancel` interrupts backoff waits and ends the pass.
    pub async fn drain_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, DrainRejected> {
        if !self.connectivity.is_online() {
            return Err(DrainRejected::Offline);
        }
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DrainRejected::InProgress);
        }
        let _guard = DrainGuard(&self.in_progress);

        let actions = self.queue.list();
        tracing::info!(pending = actions.len(), "drain started");

        let mut result = SyncResult::default();
        let mut blocked: HashSet<ResourceKey> = HashSet::new();

        for action in actions {
            if !self.connectivity.is_online() || cancel.is_cancelled() {
                tracing::info!(synced = result.synced_count, "drain interrupted");
                result.interrupted = true;
                break;
            }

            let key = action.resource_key();
            if blocked.contains(&key) {
                tracing::debug!(
                    id = %action.id,
                    resource = %key,
                    "deferred behind earlier failure"
                );
                result.deferred.push(action.id.clone());
                continue;
            }

            match self.replay(&action, cancel, &mut result).await {
                Ok(Delivery::Failed) => {
                    blocked.insert(key);
                }
                Ok(Delivery::Synced | Delivery::Gone) => {}
                Err(stop) => {
                    result.errors.push(stop);
                    result.interrupted = true;
                    break;
                }
            }
        }

        self.finish_pass(&mut result).await;
        tracing::info!(
            synced = result.synced_count,
            dead_letters = result.dead_letters.len(),
            deferred = result.deferred.len(),
            errors = result.errors.len(),
            "drain finished"
        );
        Ok(result)
    }

    /// Delivers one action and records the outcome in the queue. An `Err`
    /// ends the pass.
    async fn replay(
        &self,
        action: &PendingAction,
        cancel: &CancellationToken,
        result: &mut SyncResult,
    ) -> Result<Delivery, DomainError> {
        let context = action.payload.error_context().with_action(&action.id);
        let policy = &self.policies.get(action.kind()).retry;

        let delivery = self.dispatch(&action.id, &action.payload, context.clone(), policy, cancel);
        let error = match delivery.await {
            Ok(()) => {
                self.queue.remove(&action.id).map_err(|e| storage_error(e, context))?;
                result.synced_count += 1;
                return Ok(Delivery::Synced);
            }
            Err(error) if error.code() == ErrorCode::OperationCancelled => return Err(error),
            Err(error) => error,
        };
        if signals_offline(error.code()) {
            self.connectivity.report(Connectivity::Offline, SignalSource::Transport);
        }

        let outcome = match self.queue.increment_attempt(&action.id, Some(error.clone())) {
            Ok(outcome) => outcome,
            // Removed while the pass was running.
            Err(QueueError::NotFound(_)) => return Ok(Delivery::Gone),
            Err(e) => {
                result.errors.push(error);
                return Err(storage_error(e, context));
            }
        };
        result.errors.push(error);

        match outcome {
            AttemptOutcome::Exhausted => {
                self.queue.dead_letter(&action.id).map_err(|e| storage_error(e, context))?;
                result.dead_letters.push(action.id.clone());
            }
            AttemptOutcome::Retry { remaining } => {
                tracing::debug!(id = %action.id, remaining, "action stays queued");
            }
        }
        Ok(Delivery::Failed)
    }

    async fn finish_pass(&self, result: &mut SyncResult) {
        let now = self.clock.now();
        if let Err(e) = self.update_snapshot(|s| s.mark_synced(now)) {
            result.errors.push(storage_error(e, ErrorContext::new("drain")));
        }

        if !self.queue.is_empty() || !self.connectivity.is_online() {
            return;
        }
        match remote::with_timeout(self.remote.fetch_snapshot(), self.dispatch_timeout).await {
            Ok(entities) => {
                let pending = self.queue.list();
                if let Err(e) = self.update_snapshot(|s| s.reconcile(entities, &pending, now)) {
                    result.errors.push(storage_error(e, ErrorContext::new("reconcile")));
                }
            }
            Err(e) => tracing::warn!(error = %e, "snapshot refresh failed, keeping cached copy"),
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
