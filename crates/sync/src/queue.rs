// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue of mutations waiting for the remote.
//!
//! Every mutation is written to the [`DurableStore`] before the in-memory
//! list is replaced, so a failed write leaves the queue exactly as it was.
//! Moving an action to dead-letters writes the dead-letter list first and
//! the live queue second; if the process dies between the two writes the
//! action is found in both lists on reload and is dropped from the live
//! queue.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use galley_core::id::generate_unique_action_id;
use galley_core::{
    ActionPayload, AttemptOutcome, ClockSource, DomainError, PendingAction, ResourceKey,
};

use crate::store::{self, DurableStore, StoreError, DEAD_LETTERS_KEY, QUEUE_KEY};

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("action not found: {0}")]
    NotFound(String),

    #[error("invalid action: {0}")]
    InvalidAction(#[from] galley_core::Error),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Persisted form of the live queue.
#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    #[serde(default)]
    seq: u64,
    #[serde(default)]
    actions: Vec<PendingAction>,
}

#[derive(Debug, Default)]
struct QueueInner {
    seq: u64,
    pending: Vec<PendingAction>,
    dead: Vec<PendingAction>,
}

/// FIFO queue of [`PendingAction`] values plus their dead-letter list.
pub struct ActionQueue {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn ClockSource>,
    inner: Mutex<QueueInner>,
}

impl ActionQueue {
    /// Loads the queue and dead-letter list from `store`.
    pub fn open(store: Arc<dyn DurableStore>, clock: Arc<dyn ClockSource>) -> QueueResult<Self> {
        let file: QueueFile = store::load(store.as_ref(), QUEUE_KEY)?.unwrap_or_default();
        let dead: Vec<PendingAction> =
            store::load(store.as_ref(), DEAD_LETTERS_KEY)?.unwrap_or_default();

        let dead_ids: HashSet<&str> = dead.iter().map(|a| a.id.as_str()).collect();
        let before = file.actions.len();
        let pending: Vec<PendingAction> =
            file.actions.into_iter().filter(|a| !dead_ids.contains(a.id.as_str())).collect();
        if pending.len() != before {
            tracing::warn!(
                dropped = before - pending.len(),
                "dropped queued actions already dead-lettered"
            );
        }

        tracing::debug!(pending = pending.len(), dead = dead.len(), "action queue loaded");
        let inner = QueueInner { seq: file.seq, pending, dead };
        Ok(ActionQueue { store, clock, inner: Mutex::new(inner) })
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist_pending(&self, seq: u64, actions: &[PendingAction]) -> QueueResult<()> {
        #[derive(Serialize)]
        struct QueueFileRef<'a> {
            seq: u64,
            actions: &'a [PendingAction],
        }
        store::save(self.store.as_ref(), QUEUE_KEY, &QueueFileRef { seq, actions })?;
        Ok(())
    }

    fn persist_dead(&self, actions: &[PendingAction]) -> QueueResult<()> {
        store::save(self.store.as_ref(), DEAD_LETTERS_KEY, actions)?;
        Ok(())
    }

    /// Appends a new action and returns it.
    pub fn enqueue(&self, payload: ActionPayload, max_attempts: u32) -> QueueResult<PendingAction> {
        let mut inner = self.lock();
        let created_at = self.clock.now();
        let seq = inner.seq + 1;

        let id = {
            let taken: HashSet<&str> =
                inner.pending.iter().chain(inner.dead.iter()).map(|a| a.id.as_str()).collect();
            generate_unique_action_id(&payload, &created_at, seq, |id| taken.contains(id))
        };
        let action = PendingAction::new(id, payload, created_at, max_attempts)?;

        let mut pending = inner.pending.clone();
        pending.push(action.clone());
        self.persist_pending(seq, &pending)?;

        inner.pending = pending;
        inner.seq = seq;
        tracing::debug!(id = %action.id, kind = %action.kind(), "action enqueued");
        Ok(action)
    }

    /// Live actions in FIFO order.
    pub fn list(&self) -> Vec<PendingAction> {
        self.lock().pending.clone()
    }

    /// Whether any live action targets `key`. Actions stay live while a
    /// drain is delivering them.
    pub fn has_pending_for(&self, key: &ResourceKey) -> bool {
        self.lock().pending.iter().any(|a| &a.resource_key() == key)
    }

    pub fn get(&self, id: &str) -> Option<PendingAction> {
        self.lock().pending.iter().find(|a| a.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Removes a confirmed action. Returns false if it was not queued.
    pub fn remove(&self, id: &str) -> QueueResult<bool> {
        let mut inner = self.lock();
        let Some(pos) = inner.pending.iter().position(|a| a.id == id) else {
            return Ok(false);
        };

        let mut pending = inner.pending.clone();
        pending.remove(pos);
        self.persist_pending(inner.seq, &pending)?;

        inner.pending = pending;
        Ok(true)
    }

    /// Counts one failed delivery attempt against an action.
    pub fn increment_attempt(
        &self,
        id: &str,
        error: Option<DomainError>,
    ) -> QueueResult<AttemptOutcome> {
        let mut inner = self.lock();
        let pos = inner
            .pending
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        let mut pending = inner.pending.clone();
        let outcome = pending[pos].record_attempt(error);
        self.persist_pending(inner.seq, &pending)?;

        inner.pending = pending;
        Ok(outcome)
    }

    /// Moves an action from the live queue to the dead-letter list.
    pub fn dead_letter(&self, id: &str) -> QueueResult<PendingAction> {
        let mut inner = self.lock();
        let pos = inner
            .pending
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        let mut pending = inner.pending.clone();
        let action = pending.remove(pos);
        let mut dead = inner.dead.clone();
        dead.push(action.clone());

        // The dead-letter write commits the move. A stale queue file is
        // repaired on the next load.
        self.persist_dead(&dead)?;
        inner.dead = dead;
        if let Err(e) = self.persist_pending(inner.seq, &pending) {
            tracing::warn!(
                id = %action.id,
                error = %e,
                "queue file still lists dead-lettered action"
            );
        }
        inner.pending = pending;

        tracing::warn!(
            id = %action.id,
            kind = %action.kind(),
            attempts = action.attempt_count,
            "action dead-lettered"
        );
        Ok(action)
    }

    pub fn dead_letters(&self) -> Vec<PendingAction> {
        self.lock().dead.clone()
    }

    /// Puts a dead-lettered action back at the tail of the live queue with a
    /// fresh retry budget.
    pub fn requeue_dead_letter(&self, id: &str) -> QueueResult<PendingAction> {
        let mut inner = self.lock();
        let pos = inner
            .dead
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        let mut dead = inner.dead.clone();
        let mut action = dead.remove(pos);
        action.reset_attempts();
        let mut pending = inner.pending.clone();
        pending.push(action.clone());

        self.persist_pending(inner.seq, &pending)?;
        if let Err(e) = self.persist_dead(&dead) {
            // Still dead-lettered on disk, so the load would drop the queued
            // copy anyway. Put the old queue file back.
            let _ = self.persist_pending(inner.seq, &inner.pending);
            return Err(e);
        }
        inner.pending = pending;
        inner.dead = dead;

        tracing::info!(id = %action.id, "dead letter requeued");
        Ok(action)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
