// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The resilience core facade.
//!
//! [`ResilienceCore`] composes the queue, engine, executor, connectivity
//! monitor, fallback chain and error log from explicit collaborators. There
//! are no globals: tests build as many isolated cores as they like.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use galley_core::{
    ActionPayload, CachedSnapshot, ClockSource, DomainError, ErrorCategory, ErrorCode,
    ErrorContext, ErrorLog, ErrorLogEntry, FallbackChain, FallbackContext, FallbackResult,
    FallbackTuning, PendingAction,
};

use crate::connectivity::{Connectivity, ConnectivityMonitor, SignalSource, Subscription};
use crate::engine::{self, DrainRejected, EngineParts, SyncEngine, SyncResult};
use crate::error::Result;
use crate::queue::{ActionQueue, QueueError};
use crate::remote::RemoteApi;
use crate::retry::{KindPolicies, RetryEvent, RetryExecutor, RetryPolicy};
use crate::store::{self, DurableStore, ERROR_LOG_KEY};

/// Whether mutations try the remote first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// Dispatch directly while online; queue only when that is impossible.
    #[default]
    Direct,
    /// Queue every mutation and let the runner drain.
    Always,
}

/// Tunables for [`ResilienceCore`].
#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub policies: KindPolicies,
    pub dispatch_timeout: Duration,
    pub queue_mode: QueueMode,
    pub error_log_capacity: usize,
    /// How long non-critical errors stay visible.
    pub error_expiry: chrono::Duration,
    pub fallback: FallbackTuning,
}

impl Default for CoreSettings {
    fn default() -> Self {
        CoreSettings {
            policies: KindPolicies::default(),
            dispatch_timeout: Duration::from_secs(5),
            queue_mode: QueueMode::Direct,
            error_log_capacity: ErrorLog::DEFAULT_CAPACITY,
            error_expiry: chrono::Duration::minutes(5),
            fallback: FallbackTuning::default(),
        }
    }
}

/// Collaborators and settings for [`ResilienceCore::new`].
pub struct CoreParts {
    pub store: Arc<dyn DurableStore>,
    pub remote: Arc<dyn RemoteApi>,
    pub clock: Arc<dyn ClockSource>,
    pub settings: CoreSettings,
    /// Connectivity assumed until the first probe or transport signal.
    pub initial: Connectivity,
}

/// Result of [`ResilienceCore::enqueue_or_execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The remote confirmed the mutation.
    Executed,
    /// The mutation was queued. `applied` tells whether the cached snapshot
    /// changed optimistically.
    Queued { action: PendingAction, applied: bool },
}

pub struct ResilienceCore {
    queue: Arc<ActionQueue>,
    engine: SyncEngine,
    executor: Arc<RetryExecutor>,
    monitor: Arc<ConnectivityMonitor>,
    fallback: FallbackChain,
    errors: Mutex<ErrorLog>,
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn ClockSource>,
    settings: CoreSettings,
    queued: Notify,
}

impl ResilienceCore {
    /// Loads persisted state and wires the components together.
    pub fn new(parts: CoreParts) -> Result<Self> {
        let CoreParts { store, remote, clock, settings, initial } = parts;

        let queue = Arc::new(ActionQueue::open(Arc::clone(&store), Arc::clone(&clock))?);
        let executor = Arc::new(RetryExecutor::new(Arc::clone(&clock)));
        let monitor = Arc::new(ConnectivityMonitor::new(initial));
        let engine = SyncEngine::new(EngineParts {
            queue: Arc::clone(&queue),
            remote,
            executor: Arc::clone(&executor),
            connectivity: Arc::clone(&monitor),
            store: Arc::clone(&store),
            clock: Arc::clone(&clock),
            policies: settings.policies.clone(),
            dispatch_timeout: settings.dispatch_timeout,
        })?;

        let entries: Vec<ErrorLogEntry> =
            store::load(store.as_ref(), ERROR_LOG_KEY)?.unwrap_or_default();
        let errors = ErrorLog::from_entries(settings.error_log_capacity, entries);

        tracing::info!(
            pending = queue.len(),
            dead_letters = queue.dead_letters().len(),
            connectivity = %initial,
            "resilience core ready"
        );
        Ok(ResilienceCore {
            queue,
            engine,
            executor,
            monitor,
            fallback: FallbackChain::with_defaults(settings.fallback),
            errors: Mutex::new(errors),
            store,
            clock,
            settings,
            queued: Notify::new(),
        })
    }

    fn lock_errors(&self) -> MutexGuard<'_, ErrorLog> {
        self.errors.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    /// Runs a mutation now when possible, otherwise queues it.
    ///
    /// While online in [`QueueMode::Direct`] the payload is dispatched
    /// through the retry executor with `policy` (or the kind's policy). A
    /// failure in the Network category falls back to queueing; any other
    /// failure is logged and returned. Offline, or in [`QueueMode::Always`],
    /// the payload is queued and applied to the cached snapshot.
    ///
    /// A payload whose resource still has queued actions is always queued
    /// behind them, so the remote sees that resource's mutations in
    /// creation order.
    pub async fn enqueue_or_execute(
        &self,
        payload: ActionPayload,
        policy: Option<&RetryPolicy>,
    ) -> std::result::Result<ActionOutcome, DomainError> {
        let kind = self.settings.policies.get(payload.kind());
        let policy = policy.unwrap_or(&kind.retry);

        let resource = payload.resource_key();
        let direct = self.settings.queue_mode == QueueMode::Direct && self.monitor.is_online();
        let behind_queue = direct && self.queue.has_pending_for(&resource);
        if behind_queue {
            tracing::debug!(%resource, "earlier actions pending, queueing behind them");
        }

        if direct && !behind_queue {
            let operation_id = format!("{}:{}", payload.kind(), resource);
            let context = payload.error_context();
            let cancel = CancellationToken::new();
            match self.engine.dispatch(&operation_id, &payload, context, policy, &cancel).await {
                Ok(()) => {
                    self.engine.apply_optimistic(&payload).unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "confirmed mutation not cached");
                        false
                    });
                    return Ok(ActionOutcome::Executed);
                }
                Err(error) if error.category() == ErrorCategory::Network => {
                    if engine::signals_offline(error.code()) {
                        self.monitor.report(Connectivity::Offline, SignalSource::Transport);
                    }
                    tracing::info!(
                        code = %error.code(),
                        %operation_id,
                        "dispatch failed, queueing"
                    );
                    self.record_error(error);
                }
                Err(error) => {
                    self.record_error(error.clone());
                    return Err(error);
                }
            }
        }

        self.queue_action(payload, kind.queue_max_attempts)
    }

    fn queue_action(
        &self,
        payload: ActionPayload,
        max_attempts: u32,
    ) -> std::result::Result<ActionOutcome, DomainError> {
        let context = payload.error_context();
        let action = match self.queue.enqueue(payload, max_attempts) {
            Ok(action) => action,
            Err(e) => {
                let error = queue_error(e, context);
                self.record_error(error.clone());
                return Err(error);
            }
        };
        let applied = match self.engine.apply_optimistic(&action.payload) {
            Ok(applied) => applied,
            Err(e) => {
                // The action is durable; only the local preview is stale.
                let error = DomainError::new(ErrorCode::StorageFailure, e.to_string(), context);
                self.record_error(error);
                false
            }
        };
        self.queued.notify_one();
        Ok(ActionOutcome::Queued { action, applied })
    }

    /// Registers a connectivity listener.
    pub fn subscribe_connectivity<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Connectivity) + Send + Sync + 'static,
    {
        self.monitor.subscribe(listener)
    }

    pub fn connectivity(&self) -> Connectivity {
        self.monitor.current()
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    /// Feeds a transport-level signal into the monitor.
    pub fn report_connectivity(&self, observed: Connectivity) -> bool {
        self.monitor.report(observed, SignalSource::Transport)
    }

    pub fn pending_actions(&self) -> Vec<PendingAction> {
        self.queue.list()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn dead_letters(&self) -> Vec<PendingAction> {
        self.queue.dead_letters()
    }

    /// Puts a dead letter back in the queue with a fresh budget.
    pub fn requeue_dead_letter(&self, id: &str) -> std::result::Result<PendingAction, DomainError> {
        let action = self.queue.requeue_dead_letter(id).map_err(|e| {
            let error = queue_error(e, ErrorContext::new("requeue_dead_letter").with_action(id));
            self.record_error(error.clone());
            error
        })?;
        self.queued.notify_one();
        Ok(action)
    }

    /// Asks the fallback chain for an alternative resource.
    pub fn resolve_fallback(
        &self,
        context: FallbackContext,
    ) -> std::result::Result<FallbackResult, DomainError> {
        if let Err(e) = context.validate() {
            let mut ctx = ErrorContext::new("resolve_fallback").with_resource(&context.target.id);
            if let Some(order) = &context.origin.order_id {
                ctx = ctx.with_order(order);
            }
            return Err(DomainError::new(ErrorCode::ValidationFailed, e.to_string(), ctx));
        }
        let result = self.fallback.resolve(context);
        tracing::info!(
            strategy = %result.strategy,
            resolved = ?result.resolved_id,
            manual = result.requires_manual_intervention,
            "fallback resolved"
        );
        Ok(result)
    }

    pub fn fallback_chain(&self) -> &FallbackChain {
        &self.fallback
    }

    /// Runs one drain pass and logs its failures.
    pub async fn drain(&self) -> std::result::Result<SyncResult, DrainRejected> {
        self.drain_cancellable(&CancellationToken::new()).await
    }

    pub async fn drain_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<SyncResult, DrainRejected> {
        let result = self.engine.drain_cancellable(cancel).await?;
        for error in &result.errors {
            self.record_error(error.clone());
        }
        Ok(result)
    }

    pub fn is_draining(&self) -> bool {
        self.engine.is_draining()
    }

    pub fn snapshot(&self) -> CachedSnapshot {
        self.engine.snapshot()
    }

    pub fn retry_events(&self) -> broadcast::Receiver<RetryEvent> {
        self.executor.subscribe()
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Resolves when an action was queued since the last call.
    pub async fn queued(&self) {
        self.queued.notified().await;
    }

    /// Appends to the error log and persists it. Returns the entry id.
    pub fn record_error(&self, error: DomainError) -> u64 {
        if error.is_critical() {
            tracing::error!(
                code = %error.code(),
                message = error.technical_message(),
                "critical error"
            );
        }
        let mut log = self.lock_errors();
        let id = log.record(error, self.clock.now());
        self.persist_errors(&log);
        id
    }

    pub fn error_log(&self) -> Vec<ErrorLogEntry> {
        self.lock_errors().entries()
    }

    /// Entries the operator should still see: unexpired, or critical and
    /// not yet acknowledged.
    pub fn visible_errors(&self) -> Vec<ErrorLogEntry> {
        self.lock_errors().visible(self.clock.now(), self.settings.error_expiry)
    }

    pub fn acknowledge_error(&self, id: u64) -> bool {
        let mut log = self.lock_errors();
        let found = log.acknowledge(id);
        if found {
            self.persist_errors(&log);
        }
        found
    }

    pub fn clear_error_log(&self) {
        let mut log = self.lock_errors();
        log.clear();
        self.persist_errors(&log);
    }

    fn persist_errors(&self, log: &ErrorLog) {
        // Best effort.
        if let Err(e) = store::save(self.store.as_ref(), ERROR_LOG_KEY, &log.entries()) {
            tracing::warn!(error = %e, "failed to persist error log");
        }
    }
}

fn queue_error(err: QueueError, context: ErrorContext) -> DomainError {
    let code = match err {
        QueueError::NotFound(_) => ErrorCode::ResourceNotFound,
        QueueError::InvalidAction(_) => ErrorCode::InvalidPayload,
        QueueError::Store(_) => ErrorCode::StorageFailure,
    };
    DomainError::new(code, err.to_string(), context)
}

#[cfg(test)]
#[path = "resilience_tests.rs"]
mod tests;
