// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Generic retry executor.
//!
//! [`RetryExecutor::execute`] runs an operation up to `max_attempts` times.
//! Each failure is classified; only retryable errors accepted by the
//! policy's predicate are retried, after an exponential backoff wait. The
//! final error is always returned to the caller.
//!
//! Progress is published on a broadcast channel of [`RetryEvent`] values.
//! Per-operation [`RetryState`] lives in a shared map while a cycle runs.
//! Two cycles using the same operation id are allowed; the second one is
//! reported as [`RetryEvent::Overlap`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use galley_core::{
    classify, ActionKind, Backoff, ClockSource, DomainError, ErrorCode, ErrorContext, RawFailure,
};

const EVENT_CAPACITY: usize = 256;

/// Narrows which retryable errors are retried.
pub type RetryPredicate = Arc<dyn Fn(&DomainError) -> bool + Send + Sync>;

/// How many times, and how patiently, to retry one operation.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    predicate: Option<RetryPredicate>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> galley_core::Result<Self> {
        if max_attempts == 0 {
            let reason = "max_attempts must be at least 1".to_string();
            return Err(galley_core::Error::InvalidPolicy(reason));
        }
        Ok(RetryPolicy { max_attempts, backoff, predicate: None })
    }

    /// Single attempt, no retries.
    pub fn once() -> Self {
        RetryPolicy { max_attempts: 1, backoff: Backoff::immediate(), predicate: None }
    }

    /// Only retry errors for which `predicate` returns true. Errors that are
    /// not retryable are never retried regardless.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&DomainError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn should_retry(&self, error: &DomainError) -> bool {
        error.retryable() && self.predicate.as_ref().is_none_or(|p| p(error))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_attempts: 3, backoff: Backoff::default(), predicate: None }
    }
}

/// Retry policy plus queue budget for one action kind.
#[derive(Debug, Clone)]
pub struct KindPolicy {
    pub retry: RetryPolicy,
    /// `max_attempts` given to actions of this kind when they are queued.
    pub queue_max_attempts: u32,
}

/// Per-kind policies.
///
/// Status changes are the most time-sensitive and retry aggressively.
/// Issue reports are low priority and give up quickly.
#[derive(Debug, Clone)]
pub struct KindPolicies {
    pub status_change: KindPolicy,
    pub usage: KindPolicy,
    pub assignment: KindPolicy,
    pub issue_report: KindPolicy,
}

impl KindPolicies {
    pub fn get(&self, kind: ActionKind) -> &KindPolicy {
        match kind {
            ActionKind::StatusChange => &self.status_change,
            ActionKind::ResourceUsageAdjustment => &self.usage,
            ActionKind::ResourceAssignment => &self.assignment,
            ActionKind::IssueReport => &self.issue_report,
        }
    }

    pub fn get_mut(&mut self, kind: ActionKind) -> &mut KindPolicy {
        match kind {
            ActionKind::StatusChange => &mut self.status_change,
            ActionKind::ResourceUsageAdjustment => &mut self.usage,
            ActionKind::ResourceAssignment => &mut self.assignment,
            ActionKind::IssueReport => &mut self.issue_report,
        }
    }

    /// Every kind uses `policy`. Handy in tests.
    pub fn uniform(policy: RetryPolicy, queue_max_attempts: u32) -> Self {
        let kind = KindPolicy { retry: policy, queue_max_attempts };
        KindPolicies {
            status_change: kind.clone(),
            usage: kind.clone(),
            assignment: kind.clone(),
            issue_report: kind,
        }
    }
}

impl Default for KindPolicies {
    fn default() -> Self {
        let ms = Duration::from_millis;
        let policy = |max_attempts, base, max, factor| RetryPolicy {
            max_attempts,
            backoff: Backoff::new(ms(base), ms(max), factor).unwrap_or_default(),
            predicate: None,
        };
        KindPolicies {
            status_change: KindPolicy { retry: policy(5, 250, 4_000, 2.0), queue_max_attempts: 5 },
            usage: KindPolicy { retry: policy(4, 500, 8_000, 2.0), queue_max_attempts: 5 },
            assignment: KindPolicy { retry: policy(4, 500, 8_000, 2.0), queue_max_attempts: 5 },
            issue_report: KindPolicy { retry: policy(2, 1_000, 5_000, 2.0), queue_max_attempts: 3 },
        }
    }
}

/// Progress of retry cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryEvent {
    /// Attempt `attempt` failed and the next one starts after `delay`.
    Retrying { operation_id: String, attempt: u32, delay: Duration, error: DomainError },
    /// A cycle started while `cycles - 1` others were running for the same id.
    Overlap { operation_id: String, cycles: u32 },
    Succeeded { operation_id: String, attempts: u32 },
    GaveUp { operation_id: String, attempts: u32, error: DomainError },
}

/// What is known about an operation while it is being retried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    pub attempt: u32,
    pub last_error: Option<DomainError>,
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Cycles currently running under this id.
    pub cycles: u32,
}

type StateMap = Arc<Mutex<HashMap<String, RetryState>>>;

fn lock_states(states: &StateMap) -> MutexGuard<'_, HashMap<String, RetryState>> {
    states.lock().unwrap_or_else(|e| e.into_inner())
}

/// Releases a cycle's claim on its [`RetryState`] on every exit path,
/// including when the future is dropped mid-wait.
struct CycleGuard {
    states: StateMap,
    operation_id: String,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        let mut states = lock_states(&self.states);
        if let Some(state) = states.get_mut(&self.operation_id) {
            state.cycles = state.cycles.saturating_sub(1);
            if state.cycles == 0 {
                states.remove(&self.operation_id);
            }
        }
    }
}

/// Runs fallible async operations with classification and backoff.
pub struct RetryExecutor {
    states: StateMap,
    events: broadcast::Sender<RetryEvent>,
    clock: Arc<dyn ClockSource>,
}

impl RetryExecutor {
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        RetryExecutor { states: Arc::new(Mutex::new(HashMap::new())), events, clock }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RetryEvent> {
        self.events.subscribe()
    }

    pub fn state(&self, operation_id: &str) -> Option<RetryState> {
        lock_states(&self.states).get(operation_id).cloned()
    }

    /// Number of operation ids with a running cycle.
    pub fn in_flight(&self) -> usize {
        lock_states(&self.states).len()
    }

    fn publish(&self, event: RetryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn begin(&self, operation_id: &str) -> CycleGuard {
        let cycles = {
            let mut states = lock_states(&self.states);
            let state = states.entry(operation_id.to_string()).or_default();
            state.cycles += 1;
            state.cycles
        };
        if cycles > 1 {
            tracing::warn!(operation_id, cycles, "overlapping retry cycles");
            self.publish(RetryEvent::Overlap { operation_id: operation_id.to_string(), cycles });
        }
        CycleGuard { states: Arc::clone(&self.states), operation_id: operation_id.to_string() }
    }

    fn update_state(&self, operation_id: &str, update: impl FnOnce(&mut RetryState)) {
        if let Some(state) = lock_states(&self.states).get_mut(operation_id) {
            update(state);
        }
    }

    /// Runs `operation` under `policy`. The closure receives the 1-based
    /// attempt number.
    pub async fn execute<T, F, Fut>(
        &self,
        operation_id: &str,
        context: ErrorContext,
        policy: &RetryPolicy,
        operation: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RawFailure>>,
    {
        let cancel = CancellationToken::new();
        self.execute_cancellable(operation_id, context, policy, &cancel, operation).await
    }

    /// Like [`RetryExecutor::execute`], but a cancelled `cancel` token ends
    /// the cycle with `OperationCancelled` instead of waiting out a backoff.
    pub async fn execute_cancellable<T, F, Fut>(
        &self,
        operation_id: &str,
        context: ErrorContext,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RawFailure>>,
    {
        let _guard = self.begin(operation_id);
        let mut attempt = 1u32;

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(operation_id, attempt.saturating_sub(1), context));
            }
            self.update_state(operation_id, |s| {
                s.attempt = attempt;
                s.next_retry_at = None;
            });

            let failure = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation_id, attempt, "succeeded after retry");
                    }
                    self.publish(RetryEvent::Succeeded {
                        operation_id: operation_id.to_string(),
                        attempts: attempt,
                    });
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let error = classify(&failure, context.clone());
            if attempt >= policy.max_attempts || !policy.should_retry(&error) {
                tracing::debug!(operation_id, attempt, code = %error.code(), "giving up");
                self.publish(RetryEvent::GaveUp {
                    operation_id: operation_id.to_string(),
                    attempts: attempt,
                    error: error.clone(),
                });
                return Err(error);
            }

            let delay = policy.backoff.delay_for(attempt);
            let next_retry_at =
                self.clock.now() + chrono::Duration::from_std(delay).unwrap_or_default();
            self.update_state(operation_id, |s| {
                s.last_error = Some(error.clone());
                s.next_retry_at = Some(next_retry_at);
            });
            tracing::debug!(
                operation_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                code = %error.code(),
                "retrying"
            );
            self.publish(RetryEvent::Retrying {
                operation_id: operation_id.to_string(),
                attempt,
                delay,
                error,
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.cancelled(operation_id, attempt, context));
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    fn cancelled(&self, operation_id: &str, attempts: u32, context: ErrorContext) -> DomainError {
        let error = DomainError::new(
            ErrorCode::OperationCancelled,
            format!("cancelled after {attempts} attempt(s)"),
            context,
        );
        tracing::debug!(operation_id, attempts, "retry cycle cancelled");
        self.publish(RetryEvent::GaveUp {
            operation_id: operation_id.to_string(),
            attempts,
            error: error.clone(),
        });
        error
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
