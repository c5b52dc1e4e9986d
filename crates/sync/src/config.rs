// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal configuration.
//!
//! Configuration is read from `galley.toml`. Every key is optional; a missing
//! file yields the defaults. Example:
//!
//! ```toml
//! [remote]
//! url = "wss://kitchen.example.com/terminal"
//! dispatch_timeout_ms = 5000
//!
//! [sync]
//! interval_secs = 15
//! queue_mode = "always"
//!
//! [retry.issue_report]
//! max_attempts = 1
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use galley_core::{ActionKind, Backoff, FallbackTuning};

use crate::error::{Error, Result};
use crate::resilience::{CoreSettings, QueueMode};
use crate::retry::{KindPolicies, RetryPolicy};
use crate::runner::RunnerSettings;

pub const CONFIG_FILE_NAME: &str = "galley.toml";
const STATE_DIR_NAME: &str = "galley";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub remote: RemoteConfig,
    pub connectivity: ConnectivityConfig,
    pub sync: SyncConfig,
    pub error_log: ErrorLogConfig,
    pub retry: RetryConfig,
    pub fallback: FallbackTuning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// WebSocket endpoint of the kitchen server (`ws://` or `wss://`).
    pub url: String,
    /// Bound on a single remote call, separate from backoff waits.
    pub dispatch_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig { url: "ws://127.0.0.1:7420".to_string(), dispatch_timeout_ms: 5_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectivityConfig {
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        ConnectivityConfig { probe_interval_secs: 30, probe_timeout_ms: 5_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Periodic drain interval while actions are pending.
    pub interval_secs: u64,
    pub queue_mode: QueueMode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig { interval_secs: 15, queue_mode: QueueMode::Direct }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorLogConfig {
    pub capacity: usize,
    /// Non-critical entries disappear from the visible list after this long.
    pub expiry_secs: u64,
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        ErrorLogConfig { capacity: galley_core::ErrorLog::DEFAULT_CAPACITY, expiry_secs: 300 }
    }
}

/// Per-kind overrides of the built-in retry policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub status_change: Option<RetryOverride>,
    pub resource_usage_adjustment: Option<RetryOverride>,
    pub resource_assignment: Option<RetryOverride>,
    pub issue_report: Option<RetryOverride>,
}

impl RetryConfig {
    fn get(&self, kind: ActionKind) -> Option<&RetryOverride> {
        match kind {
            ActionKind::StatusChange => self.status_change.as_ref(),
            ActionKind::ResourceUsageAdjustment => self.resource_usage_adjustment.as_ref(),
            ActionKind::ResourceAssignment => self.resource_assignment.as_ref(),
            ActionKind::IssueReport => self.issue_report.as_ref(),
        }
    }
}

/// Fields left out keep the built-in value for that kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryOverride {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_factor: Option<f64>,
    pub queue_max_attempts: Option<u32>,
}

impl Config {
    /// Reads `path`, or returns the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = &self.remote.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "invalid remote url '{url}': must start with ws:// or wss://"
            )));
        }
        let positive = [
            ("remote.dispatch_timeout_ms", self.remote.dispatch_timeout_ms),
            ("connectivity.probe_interval_secs", self.connectivity.probe_interval_secs),
            ("connectivity.probe_timeout_ms", self.connectivity.probe_timeout_ms),
            ("sync.interval_secs", self.sync.interval_secs),
            ("error_log.capacity", self.error_log.capacity as u64),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(Error::Config(format!("{key} must be greater than zero")));
            }
        }
        Ok(())
    }

    /// Built-in policies with the `[retry.<kind>]` overrides applied.
    pub fn kind_policies(&self) -> Result<KindPolicies> {
        let mut policies = KindPolicies::default();
        for kind in ActionKind::ALL {
            let Some(over) = self.retry.get(kind) else { continue };
            let current = policies.get_mut(kind);
            let backoff = current.retry.backoff();
            let backoff = Backoff::new(
                over.base_delay_ms.map_or(backoff.base_delay(), Duration::from_millis),
                over.max_delay_ms.map_or(backoff.max_delay(), Duration::from_millis),
                over.backoff_factor.unwrap_or(backoff.factor()),
            )?;
            let max_attempts = over.max_attempts.unwrap_or(current.retry.max_attempts());
            current.retry = RetryPolicy::new(max_attempts, backoff)?;

            if let Some(queue_max) = over.queue_max_attempts {
                if queue_max == 0 {
                    return Err(Error::Config(format!(
                        "retry.{kind}.queue_max_attempts must be at least 1"
                    )));
                }
                current.queue_max_attempts = queue_max;
            }
        }
        Ok(policies)
    }

    pub fn core_settings(&self) -> Result<CoreSettings> {
        let expiry = Duration::from_secs(self.error_log.expiry_secs);
        Ok(CoreSettings {
            policies: self.kind_policies()?,
            dispatch_timeout: Duration::from_millis(self.remote.dispatch_timeout_ms),
            queue_mode: self.sync.queue_mode,
            error_log_capacity: self.error_log.capacity,
            error_expiry: chrono::Duration::from_std(expiry)
                .unwrap_or_else(|_| chrono::Duration::weeks(52)),
            fallback: self.fallback,
        })
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            sync_interval: Duration::from_secs(self.sync.interval_secs),
            probe_interval: Duration::from_secs(self.connectivity.probe_interval_secs),
            probe_timeout: Duration::from_millis(self.connectivity.probe_timeout_ms),
        }
    }
}

/// `$XDG_STATE_HOME/galley`, falling back to the local data dir, then to
/// `./.galley`.
pub fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|d| d.join(STATE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".galley"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
