// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Online/offline tracking.
//!
//! The monitor combines two signal sources. Transport signals (a dropped
//! socket, a refused connection) are reported as they happen. A periodic
//! liveness probe runs independently and its answer overrides whatever the
//! transport last said, in either direction.
//!
//! Listeners see transitions only: reporting the current state again is a
//! no-op, so a failing probe while already offline notifies nobody.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::remote::RemoteApi;

/// Whether the central server is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connectivity::Online => "online",
            Connectivity::Offline => "offline",
        }
    }

    pub fn is_online(&self) -> bool {
        *self == Connectivity::Online
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a connectivity report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    Transport,
    Probe,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Transport => "transport",
            SignalSource::Probe => "probe",
        }
    }
}

/// Callback invoked on every transition.
pub type Listener = Arc<dyn Fn(Connectivity) + Send + Sync>;

/// Tracks connectivity and fans transitions out to listeners.
pub struct ConnectivityMonitor {
    state: watch::Sender<Connectivity>,
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_listener: AtomicU64,
    transitions: AtomicU64,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (state, _) = watch::channel(initial);
        ConnectivityMonitor {
            state,
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(1),
            transitions: AtomicU64::new(0),
        }
    }

    fn lock_listeners(&self) -> MutexGuard<'_, BTreeMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Receiver that wakes on every transition.
    pub fn watch(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }

    /// Total transitions since creation.
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    /// Records an observation. Returns true when it changed the state.
    pub fn report(&self, observed: Connectivity, source: SignalSource) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == observed {
                false
            } else {
                *current = observed;
                true
            }
        });
        if !changed {
            return false;
        }

        self.transitions.fetch_add(1, Ordering::Relaxed);
        tracing::info!(state = %observed, source = source.as_str(), "connectivity changed");

        // Call listeners outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<Listener> = self.lock_listeners().values().cloned().collect();
        for listener in listeners {
            listener(observed);
        }
        true
    }

    /// Registers `listener` for transitions.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(Connectivity) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().insert(id, Arc::new(listener));
        Subscription { monitor: Arc::downgrade(self), id }
    }

    fn unsubscribe(&self, id: u64) -> bool {
        self.lock_listeners().remove(&id).is_some()
    }

    /// Runs one probe, bounded by `timeout`, and reports the result.
    pub async fn probe_once(&self, probe: &dyn Probe, timeout: Duration) -> Connectivity {
        let reachable = tokio::time::timeout(timeout, probe.check()).await.unwrap_or(false);
        let observed = if reachable { Connectivity::Online } else { Connectivity::Offline };
        if !reachable {
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, "liveness probe failed");
        }
        self.report(observed, SignalSource::Probe);
        observed
    }
}

/// Handle returned by [`ConnectivityMonitor::subscribe`].
#[must_use = "dropping the handle keeps the listener registered; call unsubscribe() to remove it"]
#[derive(Debug)]
pub struct Subscription {
    monitor: Weak<ConnectivityMonitor>,
    id: u64,
}

impl Subscription {
    /// Removes the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        self.monitor.upgrade().is_some_and(|m| m.unsubscribe(self.id))
    }
}

/// Liveness check against the central server.
pub trait Probe: Send + Sync {
    fn check(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Probe that pings the remote API.
pub struct RemoteProbe {
    remote: Arc<dyn RemoteApi>,
}

impl RemoteProbe {
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        RemoteProbe { remote }
    }
}

impl Probe for RemoteProbe {
    fn check(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.remote.ping().await.is_ok() })
    }
}

/// Probes every `interval` until `cancel` fires. The first probe runs
/// immediately.
pub async fn run_probe_loop(
    monitor: Arc<ConnectivityMonitor>,
    probe: Arc<dyn Probe>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("probe loop stopped");
                return;
            }
            _ = ticker.tick() => {
                monitor.probe_once(probe.as_ref(), timeout).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
