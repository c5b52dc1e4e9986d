// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! galley-core: domain model for the galley kitchen terminal
//!
//! This crate holds the pure parts of the terminal's resilience layer: error
//! classification, queued actions, backoff schedules, the cached snapshot,
//! the error log and the fallback strategy chain. Nothing here performs I/O
//! or spawns tasks; `galley-sync` builds the runtime on top of it.

pub mod action;
pub mod backoff;
pub mod classify;
pub mod clock;
pub mod domain_error;
pub mod error;
pub mod error_log;
pub mod fallback;
pub mod id;
pub mod snapshot;

pub use action::{
    ActionKind, ActionPayload, AttemptOutcome, IssueReport, IssueSubject, OrderStatus,
    PendingAction, ResourceAssignment, ResourceKey, StatusChange, UsageAdjustment,
};
pub use backoff::Backoff;
pub use classify::{classify, RawFailure, TransportFault};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use domain_error::{DomainError, ErrorCategory, ErrorCode, ErrorContext, Severity};
pub use error::{Error, Result};
pub use error_log::{ErrorLog, ErrorLogEntry};
pub use fallback::{
    FallbackChain, FallbackContext, FallbackResult, FallbackStrategy, FallbackTuning,
};
pub use snapshot::{CachedSnapshot, InventoryLevel, OrderView, SnapshotEntities};
