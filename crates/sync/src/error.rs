// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for galley-sync.

use thiserror::Error;

use crate::queue::QueueError;
use crate::store::StoreError;

/// Infrastructure errors raised while assembling or running the core.
///
/// Operation-level failures are reported as [`galley_core::DomainError`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse config: {0}\n  hint: check galley.toml for typos in section or key names")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] galley_core::Error),
}

/// A specialized Result type for galley-sync operations.
pub type Result<T> = std::result::Result<T, Error>;
