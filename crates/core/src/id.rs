// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::action::ActionPayload;

/// Generate an action ID from payload, timestamp and queue sequence number.
/// Format: act-{hash} where hash is first 8 hex chars of SHA256 over the inputs.
pub fn generate_action_id(payload: &ActionPayload, created_at: &DateTime<Utc>, seq: u64) -> String {
    let body = serde_json::to_string(payload).unwrap_or_default();
    let input = format!("{}{}{}", body, created_at.to_rfc3339(), seq);
    let hash = Sha256::digest(input.as_bytes());
    format!("act-{}", hex::encode(&hash[..4]))
}

/// Generate a unique action ID, appending an incrementing suffix on collision.
pub fn generate_unique_action_id<F>(
    payload: &ActionPayload,
    created_at: &DateTime<Utc>,
    seq: u64,
    exists: F,
) -> String
where
    F: Fn(&str) -> bool,
{
    let base_id = generate_action_id(payload, created_at, seq);

    if !exists(&base_id) {
        return base_id;
    }

    let mut suffix = 2;
    loop {
        let id = format!("{}-{}", base_id, suffix);
        if !exists(&id) {
            return id;
        }
        suffix += 1;
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
