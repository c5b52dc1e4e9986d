// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Locally cached copy of remote state.
//!
//! Producers read the snapshot for optimistic UI state while mutations are
//! still queued. Applying a payload to the snapshot is pure; persistence and
//! ownership live with the synchronization engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::action::{ActionPayload, OrderStatus, PendingAction};

/// Last known state of one order ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: String,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub item_statuses: BTreeMap<String, OrderStatus>,
    pub updated_at: DateTime<Utc>,
}

/// Last known stock level of one inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub item_id: String,
    pub quantity: f64,
    pub unit: String,
}

/// Entities as delivered by the remote system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntities {
    #[serde(default)]
    pub orders: Vec<OrderView>,
    #[serde(default)]
    pub inventory: Vec<InventoryLevel>,
}

/// Cached remote entities plus the time of the last completed sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    #[serde(default)]
    pub orders: BTreeMap<String, OrderView>,
    #[serde(default)]
    pub inventory: BTreeMap<String, InventoryLevel>,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl CachedSnapshot {
    pub fn order(&self, id: &str) -> Option<&OrderView> {
        self.orders.get(id)
    }

    pub fn inventory_level(&self, item_id: &str) -> Option<&InventoryLevel> {
        self.inventory.get(item_id)
    }

    /// Applies a mutation optimistically.
    ///
    /// Returns false when the payload has no visible effect on cached state
    /// (issue reports, or usage against an item with no known baseline).
    pub fn apply(&mut self, payload: &ActionPayload, at: DateTime<Utc>) -> bool {
        match payload {
            ActionPayload::StatusChange(change) => {
                let order = self.orders.entry(change.order_id.clone()).or_insert_with(|| OrderView {
                    id: change.order_id.clone(),
                    status: change.to,
                    station_id: None,
                    item_statuses: BTreeMap::new(),
                    updated_at: at,
                });
                match &change.item_id {
                    Some(item) => {
                        order.item_statuses.insert(item.clone(), change.to);
                    }
                    None => order.status = change.to,
                }
                order.updated_at = at;
                true
            }
            ActionPayload::ResourceUsageAdjustment(usage) => {
                match self.inventory.get_mut(&usage.item_id) {
                    Some(level) => {
                        level.quantity += usage.quantity_delta;
                        true
                    }
                    None => false,
                }
            }
            ActionPayload::ResourceAssignment(assignment) => {
                let order_id = &assignment.order_id;
                let order = self.orders.entry(order_id.clone()).or_insert_with(|| OrderView {
                    id: order_id.clone(),
                    status: OrderStatus::Received,
                    station_id: None,
                    item_statuses: BTreeMap::new(),
                    updated_at: at,
                });
                order.station_id = Some(assignment.station_id.clone());
                order.updated_at = at;
                true
            }
            ActionPayload::IssueReport(_) => false,
        }
    }

    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_synced_at = Some(at);
    }

    /// Replaces cached entities with the remote copy, then re-applies
    /// mutations the remote has not confirmed yet.
    pub fn reconcile(
        &mut self,
        remote: SnapshotEntities,
        pending: &[PendingAction],
        at: DateTime<Utc>,
    ) {
        self.orders = remote.orders.into_iter().map(|o| (o.id.clone(), o)).collect();
        self.inventory = remote.inventory.into_iter().map(|i| (i.item_id.clone(), i)).collect();
        for action in pending {
            self.apply(&action.payload, action.created_at);
        }
        self.mark_synced(at);
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
