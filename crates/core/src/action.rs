// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending mutations recorded while the remote cannot confirm them.
//!
//! Each queued [`PendingAction`] carries a strongly typed [`ActionPayload`].
//! The payload names the [`ResourceKey`] it mutates so replay can keep
//! per-resource ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain_error::{DomainError, ErrorContext, Severity};
use crate::error::{Error, Result};

/// Kind tag of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    StatusChange,
    ResourceUsageAdjustment,
    ResourceAssignment,
    IssueReport,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::StatusChange,
        ActionKind::ResourceUsageAdjustment,
        ActionKind::ResourceAssignment,
        ActionKind::IssueReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::StatusChange => "status_change",
            ActionKind::ResourceUsageAdjustment => "resource_usage_adjustment",
            ActionKind::ResourceAssignment => "resource_assignment",
            ActionKind::IssueReport => "issue_report",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of an order ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Received,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Served => "served",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Move an order (or a single item on it) to a new status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
}

/// Record consumption (negative delta) or restock (positive delta) of an
/// inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageAdjustment {
    pub item_id: String,
    pub quantity_delta: f64,
    pub unit: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// Assign an order's items to a preparation station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAssignment {
    pub order_id: String,
    pub station_id: String,
    #[serde(default)]
    pub item_ids: Vec<String>,
    #[serde(default)]
    pub priority: u8,
}

/// What an issue report is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum IssueSubject {
    Order(String),
    Station(String),
    Item(String),
}

impl IssueSubject {
    pub fn id(&self) -> &str {
        match self {
            IssueSubject::Order(id) | IssueSubject::Station(id) | IssueSubject::Item(id) => id,
        }
    }
}

/// Quality or equipment problem raised by kitchen staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueReport {
    pub subject: IssueSubject,
    pub category: String,
    pub description: String,
    pub severity: Severity,
}

/// Strongly typed payload of a queued mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    StatusChange(StatusChange),
    ResourceUsageAdjustment(UsageAdjustment),
    ResourceAssignment(ResourceAssignment),
    IssueReport(IssueReport),
}

/// The remote entity a mutation touches.
///
/// Actions sharing a key must be replayed in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    Order(String),
    Inventory(String),
    Station(String),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Order(id) => write!(f, "order:{id}"),
            ResourceKey::Inventory(id) => write!(f, "inventory:{id}"),
            ResourceKey::Station(id) => write!(f, "station:{id}"),
        }
    }
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::StatusChange(_) => ActionKind::StatusChange,
            ActionPayload::ResourceUsageAdjustment(_) => ActionKind::ResourceUsageAdjustment,
            ActionPayload::ResourceAssignment(_) => ActionKind::ResourceAssignment,
            ActionPayload::IssueReport(_) => ActionKind::IssueReport,
        }
    }

    /// Returns the resource whose ordering this mutation participates in.
    ///
    /// Assignments are ordered with the order they move, not the station,
    /// because a later status change on the same order depends on them.
    pub fn resource_key(&self) -> ResourceKey {
        match self {
            ActionPayload::StatusChange(c) => ResourceKey::Order(c.order_id.clone()),
            ActionPayload::ResourceUsageAdjustment(u) => ResourceKey::Inventory(u.item_id.clone()),
            ActionPayload::ResourceAssignment(a) => ResourceKey::Order(a.order_id.clone()),
            ActionPayload::IssueReport(r) => match &r.subject {
                IssueSubject::Order(id) => ResourceKey::Order(id.clone()),
                IssueSubject::Station(id) => ResourceKey::Station(id.clone()),
                IssueSubject::Item(id) => ResourceKey::Inventory(id.clone()),
            },
        }
    }

    /// Builds the error context for dispatching this payload.
    pub fn error_context(&self) -> ErrorContext {
        let ctx = ErrorContext::new(self.kind().as_str());
        match self {
            ActionPayload::StatusChange(c) => ctx.with_order(&c.order_id),
            ActionPayload::ResourceUsageAdjustment(u) => {
                let ctx = ctx.with_resource(&u.item_id);
                match &u.order_id {
                    Some(order) => ctx.with_order(order),
                    None => ctx,
                }
            }
            ActionPayload::ResourceAssignment(a) => {
                ctx.with_order(&a.order_id).with_resource(&a.station_id)
            }
            ActionPayload::IssueReport(r) => match &r.subject {
                IssueSubject::Order(id) => ctx.with_order(id),
                IssueSubject::Station(id) | IssueSubject::Item(id) => ctx.with_resource(id),
            },
        }
    }
}

/// What happened when an attempt was recorded against an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// More attempts remain.
    Retry { remaining: u32 },
    /// The retry budget is spent; the action must be dead-lettered.
    Exhausted,
}

/// A mutation not yet confirmed by the remote system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    pub payload: ActionPayload,
    pub created_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<DomainError>,
}

impl PendingAction {
    /// Creates a fresh action.
    ///
    /// `max_attempts` must be at least 1.
    pub fn new(
        id: String,
        payload: ActionPayload,
        created_at: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::InvalidPolicy("max_attempts must be at least 1".to_string()));
        }
        Ok(PendingAction {
            id,
            payload,
            created_at,
            attempt_count: 0,
            max_attempts,
            last_error: None,
        })
    }

    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    pub fn resource_key(&self) -> ResourceKey {
        self.payload.resource_key()
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    /// Counts one failed attempt. Never pushes `attempt_count` past
    /// `max_attempts`.
    pub fn record_attempt(&mut self, error: Option<DomainError>) -> AttemptOutcome {
        if self.attempt_count < self.max_attempts {
            self.attempt_count += 1;
        }
        if error.is_some() {
            self.last_error = error;
        }
        if self.is_exhausted() {
            AttemptOutcome::Exhausted
        } else {
            AttemptOutcome::Retry { remaining: self.max_attempts - self.attempt_count }
        }
    }

    /// Resets the retry budget, used when an operator requeues a dead letter.
    pub fn reset_attempts(&mut self) {
        self.attempt_count = 0;
        self.last_error = None;
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
