// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::{assignment, issue, status_change, usage, MockRemote};
use galley_core::{classify, ErrorCode, ErrorContext, OrderStatus};

#[tokio::test]
async fn dispatch_routes_each_kind_to_its_endpoint() {
    let remote = MockRemote::new();
    let payloads = vec![
        status_change("O1", OrderStatus::Ready),
        usage("basil", -5.0),
        assignment("O1", "grill"),
        issue("fryer"),
    ];

    for payload in &payloads {
        dispatch(remote.as_ref(), payload, Duration::from_secs(1)).await.unwrap();
    }

    assert_eq!(remote.calls(), payloads);
}

#[tokio::test]
async fn dispatch_returns_remote_failure() {
    let remote = MockRemote::new();
    remote.push_result(Err(RemoteFailure::rejected(409, "stale version")));

    let served = status_change("O1", OrderStatus::Served);
    let err = dispatch(remote.as_ref(), &served, Duration::from_secs(1)).await.unwrap_err();

    assert_eq!(err, RemoteFailure::rejected(409, "stale version"));
    assert_eq!(err.to_string(), "status 409: stale version");
}

#[tokio::test(start_paused = true)]
async fn slow_remote_times_out() {
    let remote = MockRemote::new();
    remote.set_delay(Duration::from_secs(30));

    let adjustment = usage("rice", -1.0);
    let err = dispatch(remote.as_ref(), &adjustment, Duration::from_secs(2)).await.unwrap_err();

    assert!(matches!(err, RemoteFailure::Transport { fault: TransportFault::Timeout, .. }));
    let classified = classify(&err.into(), ErrorContext::new("resource_usage_adjustment"));
    assert_eq!(classified.code(), ErrorCode::NetworkTimeout);
}

#[test]
fn failures_classify_by_shape() {
    let ctx = || ErrorContext::new("status_change");
    let cases = [
        (
            RemoteFailure::transport(TransportFault::Refused, "connect"),
            ErrorCode::NetworkUnavailable,
        ),
        (RemoteFailure::transport(TransportFault::Reset, ""), ErrorCode::ConnectionLost),
        (RemoteFailure::rejected(401, "who are you"), ErrorCode::Unauthorized),
        (RemoteFailure::rejected(502, "bad gateway"), ErrorCode::ServerError),
        (RemoteFailure::Other("station is at capacity".to_string()), ErrorCode::StationOverloaded),
    ];
    for (failure, expected) in cases {
        assert_eq!(classify(&failure.into(), ctx()).code(), expected);
    }
}

#[test]
fn transport_failure_display() {
    let failure = RemoteFailure::transport(TransportFault::Offline, "no route");
    assert_eq!(failure.to_string(), "transport offline: no route");
}
