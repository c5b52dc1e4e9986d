// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded log of terminal errors for operator diagnostics.
//!
//! Critical errors stay visible until acknowledged. Everything else drops
//! out of [`ErrorLog::visible`] once it is older than the expiry window.
//! When the log is full the oldest entry that is not an unacknowledged
//! critical error is evicted first.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain_error::DomainError;

/// One recorded error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: u64,
    pub error: DomainError,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
}

impl ErrorLogEntry {
    fn pinned(&self) -> bool {
        self.error.is_critical() && !self.acknowledged
    }
}

/// Ring buffer of [`ErrorLogEntry`] values.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    capacity: usize,
    next_id: u64,
    entries: VecDeque<ErrorLogEntry>,
}

impl ErrorLog {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        ErrorLog { capacity: capacity.max(1), next_id: 1, entries: VecDeque::new() }
    }

    /// Rebuilds a log from persisted entries, keeping the newest ones.
    pub fn from_entries(capacity: usize, entries: Vec<ErrorLogEntry>) -> Self {
        let mut log = ErrorLog::new(capacity);
        log.next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        log.entries = entries.into();
        while log.entries.len() > log.capacity {
            log.evict_one();
        }
        log
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> Vec<ErrorLogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Records an error and returns its entry id.
    pub fn record(&mut self, error: DomainError, at: DateTime<Utc>) -> u64 {
        if self.entries.len() >= self.capacity {
            self.evict_one();
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(ErrorLogEntry { id, error, recorded_at: at, acknowledged: false });
        id
    }

    fn evict_one(&mut self) {
        let victim = self.entries.iter().position(|e| !e.pinned()).unwrap_or(0);
        self.entries.remove(victim);
    }

    /// Entries an operator should currently see.
    pub fn visible(&self, now: DateTime<Utc>, expiry: Duration) -> Vec<ErrorLogEntry> {
        self.entries
            .iter()
            .filter(|e| !e.acknowledged)
            .filter(|e| e.error.is_critical() || e.recorded_at + expiry > now)
            .cloned()
            .collect()
    }

    /// Marks an entry as seen. Returns false for unknown ids.
    pub fn acknowledge(&mut self, id: u64) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        ErrorLog::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
#[path = "error_log_tests.rs"]
mod tests;
