// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background loop that keeps the queue moving.
//!
//! A drain pass starts when connectivity comes back, when something is
//! queued, and on a fixed interval while actions are pending. The liveness
//! probe runs as a child task and stops with the runner.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::connectivity::{run_probe_loop, Probe};
use crate::engine::DrainRejected;
use crate::resilience::ResilienceCore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    pub sync_interval: Duration,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        RunnerSettings {
            sync_interval: Duration::from_secs(15),
            probe_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs until `cancel` fires.
pub async fn run(
    core: Arc<ResilienceCore>,
    probe: Arc<dyn Probe>,
    settings: RunnerSettings,
    cancel: CancellationToken,
) {
    let probe_cancel = cancel.child_token();
    let probe_task = tokio::spawn(run_probe_loop(
        Arc::clone(core.monitor()),
        probe,
        settings.probe_interval,
        settings.probe_timeout,
        probe_cancel.clone(),
    ));

    let mut connectivity = core.monitor().watch();
    let mut ticker = tokio::time::interval(settings.sync_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        sync_interval_secs = settings.sync_interval.as_secs(),
        probe_interval_secs = settings.probe_interval.as_secs(),
        "runner started"
    );

    loop {
        let trigger = tokio::select! {
            _ = cancel.cancelled() => break,
            changed = connectivity.changed() => {
                if changed.is_err() {
                    break;
                }
                if !connectivity.borrow_and_update().is_online() {
                    continue;
                }
                "reconnected"
            }
            _ = core.queued() => "queued",
            _ = ticker.tick() => {
                if core.pending_count() == 0 {
                    continue;
                }
                "interval"
            }
        };
        drain_once(&core, &cancel, trigger).await;
    }

    probe_cancel.cancel();
    if let Err(e) = probe_task.await {
        tracing::warn!(error = %e, "probe task failed");
    }
    tracing::info!("runner stopped");
}

async fn drain_once(core: &ResilienceCore, cancel: &CancellationToken, trigger: &str) {
    match core.drain_cancellable(cancel).await {
        Ok(result) => {
            if !result.dead_letters.is_empty() {
                tracing::warn!(trigger, count = result.dead_letters.len(), "actions dead-lettered");
            }
            tracing::debug!(
                trigger,
                synced = result.synced_count,
                remaining = core.pending_count(),
                "drain pass done"
            );
        }
        Err(DrainRejected::Offline) => tracing::debug!(trigger, "drain skipped while offline"),
        Err(DrainRejected::InProgress) => tracing::debug!(trigger, "drain already running"),
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
