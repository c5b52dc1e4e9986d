// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! galley-sync: the runtime half of the terminal's resilience layer.
//!
//! # Main Components
//!
//! - [`ResilienceCore`] - facade composing everything below
//! - [`ActionQueue`] - durable FIFO of mutations awaiting the remote
//! - [`SyncEngine`] - drains the queue and owns the cached snapshot
//! - [`RetryExecutor`] - classification plus exponential backoff
//! - [`ConnectivityMonitor`] - online/offline transitions
//! - [`WsRemote`] / [`JsonFileStore`] - production collaborators
//!
//! ```rust,ignore
//! let core = Arc::new(ResilienceCore::new(CoreParts {
//!     store: Arc::new(JsonFileStore::open(&state_dir)?),
//!     remote: Arc::new(WsRemote::new(&config.remote.url)),
//!     clock: Arc::new(SystemClock),
//!     settings: config.core_settings()?,
//!     initial: Connectivity::Offline,
//! })?);
//! core.enqueue_or_execute(payload, None).await?;
//! ```

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod queue;
pub mod remote;
pub mod resilience;
pub mod retry;
pub mod runner;
pub mod store;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use config::Config;
pub use connectivity::{
    Connectivity, ConnectivityMonitor, Probe, RemoteProbe, SignalSource, Subscription,
};
pub use engine::{DrainRejected, SyncEngine, SyncResult};
pub use error::{Error, Result};
pub use queue::{ActionQueue, QueueError};
pub use remote::{RemoteApi, RemoteFailure, RemoteFuture, RemoteResult};
pub use resilience::{ActionOutcome, CoreParts, CoreSettings, QueueMode, ResilienceCore};
pub use retry::{KindPolicies, KindPolicy, RetryEvent, RetryExecutor, RetryPolicy, RetryState};
pub use runner::RunnerSettings;
pub use store::{DurableStore, JsonFileStore, MemoryStore, StoreError};
pub use transport::WsRemote;
