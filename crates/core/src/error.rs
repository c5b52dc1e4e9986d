// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for galley-core operations.

use thiserror::Error;

/// All possible errors that can occur in galley-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid fallback context: {0}")]
    InvalidFallbackContext(String),
}

/// A specialized Result type for galley-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
