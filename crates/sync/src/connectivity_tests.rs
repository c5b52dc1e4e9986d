// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::sync::atomic::{AtomicBool, AtomicU32};

/// Probe with a settable answer and an optional stall.
struct ScriptedProbe {
    reachable: AtomicBool,
    stall: Option<Duration>,
    calls: AtomicU32,
}

impl ScriptedProbe {
    fn new(reachable: bool) -> Self {
        ScriptedProbe {
            reachable: AtomicBool::new(reachable),
            stall: None,
            calls: AtomicU32::new(0),
        }
    }

    fn stalled(stall: Duration) -> Self {
        ScriptedProbe { stall: Some(stall), ..ScriptedProbe::new(true) }
    }
}

impl Probe for ScriptedProbe {
    fn check(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            self.reachable.load(Ordering::SeqCst)
        })
    }
}

type Seen = Arc<Mutex<Vec<Connectivity>>>;

fn counting_listener(monitor: &Arc<ConnectivityMonitor>) -> (Seen, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = monitor.subscribe(move |state| sink.lock().unwrap().push(state));
    (seen, sub)
}

#[test]
fn listeners_see_each_transition_once() {
    let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Online));
    let (seen, _sub) = counting_listener(&monitor);

    assert!(!monitor.report(Connectivity::Online, SignalSource::Transport));
    assert!(monitor.report(Connectivity::Offline, SignalSource::Transport));
    assert!(!monitor.report(Connectivity::Offline, SignalSource::Probe));
    assert!(monitor.report(Connectivity::Online, SignalSource::Probe));

    assert_eq!(*seen.lock().unwrap(), vec![Connectivity::Offline, Connectivity::Online]);
    assert_eq!(monitor.transitions(), 2);
}

#[test]
fn unsubscribe_stops_delivery() {
    let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
    let (seen, sub) = counting_listener(&monitor);
    assert_eq!(monitor.listener_count(), 1);

    assert!(sub.unsubscribe());
    monitor.report(Connectivity::Online, SignalSource::Transport);

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(monitor.listener_count(), 0);
}

#[test]
fn unsubscribe_after_monitor_dropped() {
    let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
    let (_seen, sub) = counting_listener(&monitor);
    drop(monitor);
    assert!(!sub.unsubscribe());
}

#[test]
fn listener_may_subscribe_during_notification() {
    let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
    let inner = Arc::downgrade(&monitor);
    let _sub = monitor.subscribe(move |_| {
        if let Some(m) = inner.upgrade() {
            let _nested = m.subscribe(|_| {});
        }
    });

    monitor.report(Connectivity::Online, SignalSource::Transport);
    assert_eq!(monitor.listener_count(), 2);
}

#[tokio::test]
async fn watch_receiver_observes_transitions() {
    let monitor = ConnectivityMonitor::new(Connectivity::Offline);
    let mut rx = monitor.watch();

    monitor.report(Connectivity::Online, SignalSource::Transport);

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), Connectivity::Online);
}

#[tokio::test]
async fn probe_failure_while_offline_is_a_no_op() {
    let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
    let (seen, _sub) = counting_listener(&monitor);
    let probe = ScriptedProbe::new(false);

    assert_eq!(monitor.probe_once(&probe, Duration::from_secs(1)).await, Connectivity::Offline);

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(monitor.transitions(), 0);
}

#[tokio::test]
async fn probe_overrides_stale_transport_signal() {
    let monitor = ConnectivityMonitor::new(Connectivity::Online);
    monitor.report(Connectivity::Offline, SignalSource::Transport);

    monitor.probe_once(&ScriptedProbe::new(true), Duration::from_secs(1)).await;
    assert!(monitor.is_online());

    monitor.probe_once(&ScriptedProbe::new(false), Duration::from_secs(1)).await;
    assert_eq!(monitor.current(), Connectivity::Offline);
}

#[tokio::test(start_paused = true)]
async fn stalled_probe_counts_as_offline() {
    let monitor = ConnectivityMonitor::new(Connectivity::Online);
    let probe = ScriptedProbe::stalled(Duration::from_secs(60));

    let observed = monitor.probe_once(&probe, Duration::from_secs(2)).await;

    assert_eq!(observed, Connectivity::Offline);
    assert!(!monitor.is_online());
}

#[tokio::test(start_paused = true)]
async fn probe_loop_runs_until_cancelled() {
    let monitor = Arc::new(ConnectivityMonitor::new(Connectivity::Offline));
    let probe = Arc::new(ScriptedProbe::new(true));
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_probe_loop(
        Arc::clone(&monitor),
        probe.clone(),
        Duration::from_secs(30),
        Duration::from_secs(5),
        cancel.clone(),
    ));

    // Immediate first tick plus two more.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(monitor.is_online());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

    probe.reachable.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!monitor.is_online());

    cancel.cancel();
    task.await.unwrap();
}

#[test]
fn connectivity_display() {
    assert_eq!(Connectivity::Online.to_string(), "online");
    assert_eq!(serde_json::to_string(&Connectivity::Offline).unwrap(), "\"offline\"");
}
