// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::action::{OrderStatus, StatusChange};
use chrono::TimeZone;

fn payload() -> ActionPayload {
    ActionPayload::StatusChange(StatusChange {
        order_id: "O1".into(),
        item_id: None,
        from: None,
        to: OrderStatus::Ready,
    })
}

#[test]
fn id_has_prefix_and_eight_hex_chars() {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let id = generate_action_id(&payload(), &at, 1);
    assert!(id.starts_with("act-"));
    assert_eq!(id.len(), "act-".len() + 8);
    assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn id_is_deterministic() {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    assert_eq!(generate_action_id(&payload(), &at, 7), generate_action_id(&payload(), &at, 7));
}

#[test]
fn sequence_distinguishes_identical_payloads() {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    assert_ne!(generate_action_id(&payload(), &at, 1), generate_action_id(&payload(), &at, 2));
}

#[test]
fn unique_id_appends_suffix_on_collision() {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let base = generate_action_id(&payload(), &at, 1);
    let taken = [base.clone(), format!("{base}-2")];
    let id = generate_unique_action_id(&payload(), &at, 1, |candidate| {
        taken.iter().any(|t| t == candidate)
    });
    assert_eq!(id, format!("{base}-3"));
}
