// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket implementation of [`RemoteApi`].
//!
//! Each call sends one JSON request frame and waits for the response frame
//! carrying the same id:
//!
//! ```text
//! -> {"id": 7, "method": "update_status", "params": {...}}
//! <- {"id": 7, "result": null}
//! <- {"id": 7, "error": "order is closed", "status": 409}
//! ```
//!
//! Frames with any other id are responses to calls that already timed out
//! and are discarded. The socket is opened lazily and dropped on the first
//! I/O error, so the next call reconnects.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use galley_core::{
    IssueReport, ResourceAssignment, SnapshotEntities, StatusChange, TransportFault,
    UsageAdjustment,
};

use crate::remote::{RemoteApi, RemoteFailure, RemoteFuture, RemoteResult};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Status assumed when an error frame carries none.
const DEFAULT_ERROR_STATUS: u16 = 500;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct RequestFrame {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub(crate) struct ResponseFrame {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ResponseFrame {
    fn into_result(self) -> RemoteResult<Value> {
        match self.error {
            Some(message) => {
                let status = self.status.unwrap_or(DEFAULT_ERROR_STATUS);
                Err(RemoteFailure::rejected(status, message))
            }
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// [`RemoteApi`] over a single WebSocket connection.
pub struct WsRemote {
    url: String,
    socket: Mutex<Option<Socket>>,
    next_id: AtomicU64,
}

impl WsRemote {
    pub fn new(url: impl Into<String>) -> Self {
        WsRemote { url: url.into(), socket: Mutex::new(None), next_id: AtomicU64::new(1) }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn is_connected(&self) -> bool {
        self.socket.lock().await.is_some()
    }

    async fn request(&self, method: &str, params: Value) -> RemoteResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = RequestFrame { id, method: method.to_string(), params };
        let text = serde_json::to_string(&frame).map_err(|e| RemoteFailure::Other(e.to_string()))?;

        // One request in flight at a time; the lock also guards reconnects.
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            let (socket, _) = tokio_tungstenite::connect_async(self.url.as_str())
                .await
                .map_err(|e| RemoteFailure::transport(TransportFault::Refused, e.to_string()))?;
            tracing::debug!(url = %self.url, "remote connected");
            *guard = Some(socket);
        }
        let Some(socket) = guard.as_mut() else {
            return Err(RemoteFailure::transport(TransportFault::Offline, "no connection"));
        };

        if let Err(e) = socket.send(Message::Text(text.into())).await {
            *guard = None;
            return Err(RemoteFailure::transport(TransportFault::Reset, e.to_string()));
        }

        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    let response: ResponseFrame = match serde_json::from_str(&text) {
                        Ok(response) => response,
                        Err(e) => {
                            tracing::warn!(error = %e, "ignoring malformed frame");
                            continue;
                        }
                    };
                    if response.id != id {
                        tracing::debug!(
                            expected = id,
                            got = response.id,
                            "discarding stale response"
                        );
                        continue;
                    }
                    return response.into_result();
                }
                Some(Ok(Message::Close(_))) | None => {
                    *guard = None;
                    let reason = "connection closed";
                    return Err(RemoteFailure::transport(TransportFault::Reset, reason));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    *guard = None;
                    return Err(RemoteFailure::transport(TransportFault::Reset, e.to_string()));
                }
            }
        }
    }

    fn call<P>(&self, method: &'static str, params: P) -> RemoteFuture<'_, ()>
    where
        P: Serialize + Send + 'static,
    {
        Box::pin(async move {
            let params =
                serde_json::to_value(params).map_err(|e| RemoteFailure::Other(e.to_string()))?;
            self.request(method, params).await.map(|_| ())
        })
    }
}

impl RemoteApi for WsRemote {
    fn update_status(&self, change: StatusChange) -> RemoteFuture<'_, ()> {
        self.call("update_status", change)
    }

    fn record_usage(&self, usage: UsageAdjustment) -> RemoteFuture<'_, ()> {
        self.call("record_usage", usage)
    }

    fn assign_resource(&self, assignment: ResourceAssignment) -> RemoteFuture<'_, ()> {
        self.call("assign_resource", assignment)
    }

    fn report_issue(&self, report: IssueReport) -> RemoteFuture<'_, ()> {
        self.call("report_issue", report)
    }

    fn ping(&self) -> RemoteFuture<'_, ()> {
        Box::pin(async move { self.request("ping", Value::Null).await.map(|_| ()) })
    }

    fn fetch_snapshot(&self) -> RemoteFuture<'_, SnapshotEntities> {
        Box::pin(async move {
            let value = self.request("fetch_snapshot", Value::Null).await?;
            serde_json::from_value(value)
                .map_err(|e| RemoteFailure::Other(format!("invalid snapshot: {e}")))
        })
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
