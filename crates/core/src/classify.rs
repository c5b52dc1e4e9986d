// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error classification.
//!
//! [`classify`] maps a raw failure plus the context it happened in to a
//! [`DomainError`]. Classification is first-match over [`RULES`]; anything no
//! rule recognises becomes [`ErrorCode::Unknown`], which is retryable. The
//! function is total and has no side effects.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain_error::{DomainError, ErrorCode, ErrorContext};

/// Transport-level fault reported by the request/response collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFault {
    Timeout,
    Aborted,
    Refused,
    Reset,
    Offline,
}

impl TransportFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportFault::Timeout => "timeout",
            TransportFault::Aborted => "aborted",
            TransportFault::Refused => "refused",
            TransportFault::Reset => "reset",
            TransportFault::Offline => "offline",
        }
    }
}

/// A failure as it was observed, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFailure {
    /// The transport gave up before a response arrived.
    Transport { fault: TransportFault, detail: String },
    /// The remote answered with an HTTP-like status.
    Status { status: u16, message: String },
    /// Free-form failure text.
    Message(String),
    /// Already classified upstream; passes through unchanged.
    Classified(Box<DomainError>),
}

impl RawFailure {
    pub fn transport(fault: TransportFault, detail: impl Into<String>) -> Self {
        RawFailure::Transport { fault, detail: detail.into() }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        RawFailure::Status { status, message: message.into() }
    }

    pub fn message(message: impl Into<String>) -> Self {
        RawFailure::Message(message.into())
    }

    fn status_code(&self) -> Option<u16> {
        match self {
            RawFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn fault(&self) -> Option<TransportFault> {
        match self {
            RawFailure::Transport { fault, .. } => Some(*fault),
            _ => None,
        }
    }

    fn text(&self) -> &str {
        match self {
            RawFailure::Transport { detail, .. } => detail,
            RawFailure::Status { message, .. } => message,
            RawFailure::Message(message) => message,
            RawFailure::Classified(err) => err.technical_message(),
        }
    }
}

impl fmt::Display for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawFailure::Transport { fault, detail } if detail.is_empty() => {
                write!(f, "transport {}", fault.as_str())
            }
            RawFailure::Transport { fault, detail } => {
                write!(f, "transport {}: {}", fault.as_str(), detail)
            }
            RawFailure::Status { status, message } => write!(f, "status {status}: {message}"),
            RawFailure::Message(message) => write!(f, "{message}"),
            RawFailure::Classified(err) => write!(f, "{}", err.technical_message()),
        }
    }
}

impl From<DomainError> for RawFailure {
    fn from(err: DomainError) -> Self {
        RawFailure::Classified(Box::new(err))
    }
}

/// What a rule inspects.
enum Matcher {
    Fault(&'static [TransportFault]),
    AnyFault,
    Status(u16),
    StatusRange(u16, u16),
    /// Case-insensitive substring match on the failure text.
    Text(&'static [&'static str]),
}

impl Matcher {
    fn matches(&self, raw: &RawFailure, lowered: &str) -> bool {
        match self {
            Matcher::Fault(faults) => raw.fault().is_some_and(|f| faults.contains(&f)),
            Matcher::AnyFault => raw.fault().is_some(),
            Matcher::Status(code) => raw.status_code() == Some(*code),
            Matcher::StatusRange(lo, hi) => {
                raw.status_code().is_some_and(|s| (*lo..*hi).contains(&s))
            }
            Matcher::Text(needles) => needles.iter().any(|n| lowered.contains(n)),
        }
    }
}

/// One entry of the ordered classification table.
pub struct Rule {
    pub name: &'static str,
    matcher: Matcher,
    pub code: ErrorCode,
}

const fn rule(name: &'static str, matcher: Matcher, code: ErrorCode) -> Rule {
    Rule { name, matcher, code }
}

/// Classification table, evaluated top to bottom.
pub static RULES: &[Rule] = &[
    rule(
        "transport-timeout",
        Matcher::Fault(&[TransportFault::Timeout]),
        ErrorCode::NetworkTimeout,
    ),
    rule(
        "transport-abort",
        Matcher::Fault(&[TransportFault::Aborted]),
        ErrorCode::RequestAborted,
    ),
    rule(
        "transport-offline",
        Matcher::Fault(&[TransportFault::Offline, TransportFault::Refused]),
        ErrorCode::NetworkUnavailable,
    ),
    rule(
        "transport-other",
        Matcher::AnyFault,
        ErrorCode::ConnectionLost,
    ),
    rule("status-401", Matcher::Status(401), ErrorCode::Unauthorized),
    rule("status-403", Matcher::Status(403), ErrorCode::Forbidden),
    rule(
        "status-404",
        Matcher::Status(404),
        ErrorCode::ResourceNotFound,
    ),
    rule(
        "status-408",
        Matcher::Status(408),
        ErrorCode::NetworkTimeout,
    ),
    rule("status-409", Matcher::Status(409), ErrorCode::Conflict),
    rule(
        "status-400",
        Matcher::Status(400),
        ErrorCode::ValidationFailed,
    ),
    rule(
        "status-422",
        Matcher::Status(422),
        ErrorCode::ValidationFailed,
    ),
    rule("status-429", Matcher::Status(429), ErrorCode::RateLimited),
    rule(
        "status-5xx",
        Matcher::StatusRange(500, 600),
        ErrorCode::ServerError,
    ),
    rule(
        "text-timeout",
        Matcher::Text(&["timeout", "timed out"]),
        ErrorCode::NetworkTimeout,
    ),
    rule(
        "text-abort",
        Matcher::Text(&["abort"]),
        ErrorCode::RequestAborted,
    ),
    rule(
        "text-network",
        Matcher::Text(&["network", "connection", "offline", "fetch failed"]),
        ErrorCode::NetworkUnavailable,
    ),
    rule(
        "text-insufficient",
        Matcher::Text(&["insufficient", "out of stock"]),
        ErrorCode::InsufficientQuantity,
    ),
    rule(
        "text-not-found",
        Matcher::Text(&["not found"]),
        ErrorCode::ResourceNotFound,
    ),
    rule(
        "text-overloaded",
        Matcher::Text(&["at capacity", "overloaded"]),
        ErrorCode::StationOverloaded,
    ),
    rule(
        "text-unavailable",
        Matcher::Text(&["unavailable", "out of service"]),
        ErrorCode::ResourceUnavailable,
    ),
    rule(
        "text-validation",
        Matcher::Text(&["invalid", "validation", "required"]),
        ErrorCode::ValidationFailed,
    ),
    rule(
        "text-expired",
        Matcher::Text(&["expired"]),
        ErrorCode::SessionExpired,
    ),
    rule(
        "text-unauthorized",
        Matcher::Text(&["unauthorized", "unauthenticated"]),
        ErrorCode::Unauthorized,
    ),
    rule(
        "text-forbidden",
        Matcher::Text(&["permission", "forbidden", "not allowed"]),
        ErrorCode::Forbidden,
    ),
];

/// Returns the first rule matching `raw`, if any.
pub fn matching_rule(raw: &RawFailure) -> Option<&'static Rule> {
    let lowered = raw.text().to_lowercase();
    RULES.iter().find(|rule| rule.matcher.matches(raw, &lowered))
}

/// Maps a raw failure to a structured domain error.
pub fn classify(raw: &RawFailure, context: ErrorContext) -> DomainError {
    if let RawFailure::Classified(err) = raw {
        let err = (**err).clone();
        return if err.context().operation.is_empty() { err.with_context(context) } else { err };
    }

    let code = matching_rule(raw).map_or(ErrorCode::Unknown, |rule| rule.code);
    DomainError::new(code, raw.to_string(), context)
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
