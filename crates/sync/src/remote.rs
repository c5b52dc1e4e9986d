// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote system abstraction.
//!
//! [`RemoteApi`] is the request/response surface of the central server with
//! one endpoint per action kind. It is object safe so the core can hold an
//! `Arc<dyn RemoteApi>` and tests can substitute a scripted mock.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use galley_core::{
    ActionPayload, IssueReport, RawFailure, ResourceAssignment, SnapshotEntities, StatusChange,
    TransportFault, UsageAdjustment,
};

/// Failure reported by the remote collaborator, before classification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteFailure {
    /// No response arrived.
    #[error("transport {}: {detail}", .fault.as_str())]
    Transport { fault: TransportFault, detail: String },

    /// The remote answered and refused the request.
    #[error("status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Anything else, described in free text.
    #[error("{0}")]
    Other(String),
}

impl RemoteFailure {
    pub fn transport(fault: TransportFault, detail: impl Into<String>) -> Self {
        RemoteFailure::Transport { fault, detail: detail.into() }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        RemoteFailure::Rejected { status, message: message.into() }
    }
}

impl From<RemoteFailure> for RawFailure {
    fn from(failure: RemoteFailure) -> Self {
        match failure {
            RemoteFailure::Transport { fault, detail } => RawFailure::transport(fault, detail),
            RemoteFailure::Rejected { status, message } => RawFailure::status(status, message),
            RemoteFailure::Other(message) => RawFailure::message(message),
        }
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteFailure>;

/// Boxed future returned by [`RemoteApi`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = RemoteResult<T>> + Send + 'a>>;

/// Endpoints of the central server used by the core.
pub trait RemoteApi: Send + Sync {
    fn update_status(&self, change: StatusChange) -> RemoteFuture<'_, ()>;

    fn record_usage(&self, usage: UsageAdjustment) -> RemoteFuture<'_, ()>;

    fn assign_resource(&self, assignment: ResourceAssignment) -> RemoteFuture<'_, ()>;

    fn report_issue(&self, report: IssueReport) -> RemoteFuture<'_, ()>;

    /// Cheap liveness check used by the connectivity probe.
    fn ping(&self) -> RemoteFuture<'_, ()>;

    /// Current copy of the entities the terminal caches.
    fn fetch_snapshot(&self) -> RemoteFuture<'_, SnapshotEntities>;
}

/// Sends a payload to the endpoint for its kind, bounded by `timeout`.
pub async fn dispatch(
    remote: &dyn RemoteApi,
    payload: &ActionPayload,
    timeout: Duration,
) -> RemoteResult<()> {
    let call = match payload.clone() {
        ActionPayload::StatusChange(change) => remote.update_status(change),
        ActionPayload::ResourceUsageAdjustment(usage) => remote.record_usage(usage),
        ActionPayload::ResourceAssignment(assignment) => remote.assign_resource(assignment),
        ActionPayload::IssueReport(report) => remote.report_issue(report),
    };
    with_timeout(call, timeout).await
}

/// Bounds any remote future by `timeout`.
pub async fn with_timeout<T>(call: RemoteFuture<'_, T>, timeout: Duration) -> RemoteResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteFailure::transport(
            TransportFault::Timeout,
            format!("no response within {}ms", timeout.as_millis()),
        )),
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
