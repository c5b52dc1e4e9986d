// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! galleyd - The galley sync daemon.
//!
//! Keeps the terminal's action queue draining against the kitchen server.
//! Queue, snapshot and error log live under `~/.local/state/galley/`.
//!
//! Usage:
//!   galleyd [--state-dir <path>] [--config <path>] [--once]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use galley_core::SystemClock;
use galley_sync::config::{default_state_dir, CONFIG_FILE_NAME};
use galley_sync::{
    runner, Config, Connectivity, CoreParts, JsonFileStore, RemoteProbe, ResilienceCore, WsRemote,
};

/// Log filename within the state directory.
const LOG_NAME: &str = "galleyd.log";
/// Lock filename for single instance guarantee.
const LOCK_NAME: &str = "galleyd.lock";
/// Environment variable overriding the state directory.
const STATE_DIR_ENV: &str = "GALLEY_STATE_DIR";

/// galleyd: offline-first sync daemon for the galley kitchen terminal
#[derive(Parser, Debug)]
#[command(name = "galleyd", version)]
struct Args {
    /// Directory holding the queue, snapshot, error log and daemon log
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Config file (defaults to <state-dir>/galley.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Probe once, run a single drain pass and exit
    #[arg(long)]
    once: bool,

    /// Log to stderr instead of the log file
    #[arg(long)]
    foreground: bool,
}

fn main() {
    let args = Args::parse();
    let env_dir = std::env::var_os(STATE_DIR_ENV).map(PathBuf::from);
    let state_dir = resolve_state_dir(args.state_dir.clone(), env_dir);

    if let Err(e) = fs::create_dir_all(&state_dir) {
        eprintln!("galleyd: cannot create {}: {e}", state_dir.display());
        std::process::exit(1);
    }
    setup_logging(&state_dir.join(LOG_NAME), args.foreground);
    tracing::info!(state_dir = %state_dir.display(), "galleyd starting");

    let lock_file = match acquire_lock(&state_dir.join(LOCK_NAME)) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("failed to acquire lock: {}", e);
            std::process::exit(1);
        }
    };

    let config_path = args.config.clone().unwrap_or_else(|| state_dir.join(CONFIG_FILE_NAME));
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(path = %config_path.display(), "{}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = runtime.block_on(serve(config, &state_dir, args.once));
    drop(lock_file);
    match outcome {
        Ok(()) => tracing::info!("galleyd stopped"),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn serve(config: Config, state_dir: &Path, once: bool) -> galley_sync::Result<()> {
    let remote = Arc::new(WsRemote::new(config.remote.url.clone()));
    let core = Arc::new(ResilienceCore::new(CoreParts {
        store: Arc::new(JsonFileStore::open(state_dir)?),
        remote: remote.clone(),
        clock: Arc::new(SystemClock),
        settings: config.core_settings()?,
        initial: Connectivity::Offline,
    })?);
    let probe = Arc::new(RemoteProbe::new(remote));
    let settings = config.runner_settings();
    tracing::info!(
        remote = %config.remote.url,
        queue_mode = ?config.sync.queue_mode,
        "core assembled"
    );

    if once {
        core.monitor().probe_once(probe.as_ref(), settings.probe_timeout).await;
        match core.drain().await {
            Ok(result) => tracing::info!(
                synced = result.synced_count,
                dead_letters = result.dead_letters.len(),
                remaining = core.pending_count(),
                "single pass done"
            ),
            Err(e) => tracing::warn!(pending = core.pending_count(), "{}", e),
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutting down");
        shutdown.cancel();
    });

    runner::run(Arc::clone(&core), probe, settings, cancel).await;
    tracing::info!(
        pending = core.pending_count(),
        dead_letters = core.dead_letters().len(),
        "queue at exit"
    );
    Ok(())
}

/// Resolves on SIGINT or SIGTERM. Never resolves if neither can be watched.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("cannot watch SIGTERM: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot watch ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

/// `--state-dir` wins, then `GALLEY_STATE_DIR`, then the XDG default.
fn resolve_state_dir(flag: Option<PathBuf>, env: Option<PathBuf>) -> PathBuf {
    flag.or(env.filter(|p| !p.as_os_str().is_empty())).unwrap_or_else(default_state_dir)
}

fn setup_logging(log_path: &Path, foreground: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Try to open log file, fall back to stderr
    let file = if foreground {
        None
    } else {
        fs::OpenOptions::new().create(true).append(true).open(log_path).ok()
    };
    match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

fn acquire_lock(lock_path: &Path) -> std::io::Result<fs::File> {
    use fs2::FileExt;

    let file = fs::OpenOptions::new().create(true).write(true).truncate(true).open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| std::io::Error::other("another galleyd instance is already running"))?;
    Ok(file)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
