// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Structured domain errors.
//!
//! Every failure that reaches a caller of the resilience core is a
//! [`DomainError`]. Its category, severity and retryability are derived from
//! the [`ErrorCode`] alone, so a code can never be stored with contradictory
//! retry semantics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad family of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Timeouts, connection loss, overloaded upstream.
    Network,
    /// Malformed input; the caller must fix the request.
    Validation,
    /// Expired or denied credentials.
    Permission,
    /// Unclassified or internal failures.
    System,
    /// Domain-rule violations such as an unavailable station.
    Business,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Permission => "permission",
            ErrorCategory::System => "system",
            ErrorCategory::Business => "business",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How urgently an operator needs to see an error.
///
/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Enumerated failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NetworkTimeout,
    RequestAborted,
    NetworkUnavailable,
    ConnectionLost,
    RateLimited,
    ServerError,
    ValidationFailed,
    InvalidPayload,
    Unauthorized,
    Forbidden,
    SessionExpired,
    StorageFailure,
    OperationCancelled,
    Unknown,
    ResourceNotFound,
    ResourceUnavailable,
    InsufficientQuantity,
    StationOverloaded,
    Conflict,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkTimeout => "network_timeout",
            ErrorCode::RequestAborted => "request_aborted",
            ErrorCode::NetworkUnavailable => "network_unavailable",
            ErrorCode::ConnectionLost => "connection_lost",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::ServerError => "server_error",
            ErrorCode::ValidationFailed => "validation_failed",
            ErrorCode::InvalidPayload => "invalid_payload",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::SessionExpired => "session_expired",
            ErrorCode::StorageFailure => "storage_failure",
            ErrorCode::OperationCancelled => "operation_cancelled",
            ErrorCode::Unknown => "unknown",
            ErrorCode::ResourceNotFound => "resource_not_found",
            ErrorCode::ResourceUnavailable => "resource_unavailable",
            ErrorCode::InsufficientQuantity => "insufficient_quantity",
            ErrorCode::StationOverloaded => "station_overloaded",
            ErrorCode::Conflict => "conflict",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::NetworkTimeout
            | ErrorCode::RequestAborted
            | ErrorCode::NetworkUnavailable
            | ErrorCode::ConnectionLost
            | ErrorCode::RateLimited
            | ErrorCode::ServerError => ErrorCategory::Network,
            ErrorCode::ValidationFailed | ErrorCode::InvalidPayload => ErrorCategory::Validation,
            ErrorCode::Unauthorized | ErrorCode::Forbidden | ErrorCode::SessionExpired => {
                ErrorCategory::Permission
            }
            ErrorCode::StorageFailure | ErrorCode::OperationCancelled | ErrorCode::Unknown => {
                ErrorCategory::System
            }
            ErrorCode::ResourceNotFound
            | ErrorCode::ResourceUnavailable
            | ErrorCode::InsufficientQuantity
            | ErrorCode::StationOverloaded
            | ErrorCode::Conflict => ErrorCategory::Business,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::RequestAborted | ErrorCode::OperationCancelled => Severity::Low,
            ErrorCode::NetworkTimeout
            | ErrorCode::RateLimited
            | ErrorCode::ValidationFailed
            | ErrorCode::InvalidPayload
            | ErrorCode::Unknown
            | ErrorCode::ResourceNotFound
            | ErrorCode::StationOverloaded
            | ErrorCode::Conflict => Severity::Medium,
            ErrorCode::NetworkUnavailable
            | ErrorCode::ConnectionLost
            | ErrorCode::ServerError
            | ErrorCode::Unauthorized
            | ErrorCode::Forbidden
            | ErrorCode::SessionExpired
            | ErrorCode::ResourceUnavailable
            | ErrorCode::InsufficientQuantity => Severity::High,
            ErrorCode::StorageFailure => Severity::Critical,
        }
    }

    /// Whether the same operation may succeed if attempted again.
    ///
    /// Network failures and unclassified system failures are retryable;
    /// cancellation, validation, permission and business failures are not.
    pub fn is_retryable(&self) -> bool {
        match self.category() {
            ErrorCategory::Network => true,
            ErrorCategory::System => !matches!(self, ErrorCode::OperationCancelled),
            ErrorCategory::Validation | ErrorCategory::Permission | ErrorCategory::Business => {
                false
            }
        }
    }

    /// Default operator-facing message.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::NetworkTimeout => "The server took too long to respond.",
            ErrorCode::RequestAborted => "The request was interrupted before it completed.",
            ErrorCode::NetworkUnavailable => "The terminal cannot reach the kitchen server.",
            ErrorCode::ConnectionLost => "The connection to the kitchen server was lost.",
            ErrorCode::RateLimited => "The server is busy and asked the terminal to slow down.",
            ErrorCode::ServerError => "The kitchen server reported an internal problem.",
            ErrorCode::ValidationFailed => "The request was rejected as invalid.",
            ErrorCode::InvalidPayload => "The request data is malformed.",
            ErrorCode::Unauthorized => "The terminal is not signed in.",
            ErrorCode::Forbidden => "This terminal is not allowed to perform that action.",
            ErrorCode::SessionExpired => "The terminal session has expired.",
            ErrorCode::StorageFailure => "Pending changes could not be saved on this terminal.",
            ErrorCode::OperationCancelled => "The operation was cancelled.",
            ErrorCode::Unknown => "Something went wrong.",
            ErrorCode::ResourceNotFound => "The requested station, recipe or item does not exist.",
            ErrorCode::ResourceUnavailable => "The requested station or item is unavailable.",
            ErrorCode::InsufficientQuantity => "There is not enough stock to fulfil the request.",
            ErrorCode::StationOverloaded => "The station is at capacity.",
            ErrorCode::Conflict => "The change conflicts with a newer update.",
        }
    }

    /// Default remediation steps, most useful first. Never empty.
    pub fn default_suggestions(&self) -> &'static [&'static str] {
        match self {
            ErrorCode::NetworkTimeout | ErrorCode::RequestAborted => &[
                "Wait a moment; the terminal retries automatically",
                "Check the network connection if the problem persists",
            ],
            ErrorCode::NetworkUnavailable | ErrorCode::ConnectionLost => &[
                "Keep working; changes are queued and sent when the connection returns",
                "Check the network cable or Wi-Fi",
                "Contact the manager if the terminal stays offline",
            ],
            ErrorCode::RateLimited => &["Wait a few seconds before trying again"],
            ErrorCode::ServerError => &[
                "Wait a moment; the terminal retries automatically",
                "Contact support if the problem persists",
            ],
            ErrorCode::ValidationFailed | ErrorCode::InvalidPayload => &[
                "Review the entered values",
                "Correct the request and submit it again",
            ],
            ErrorCode::Unauthorized | ErrorCode::SessionExpired => {
                &["Sign in again", "Ask a manager to re-authorise the terminal"]
            }
            ErrorCode::Forbidden => &["Ask a manager to perform this action"],
            ErrorCode::StorageFailure => &[
                "Do not restart the terminal",
                "Notify the manager immediately",
                "Record pending changes on paper until storage recovers",
            ],
            ErrorCode::OperationCancelled => &["No action needed"],
            ErrorCode::Unknown => &[
                "Try the action again",
                "Contact support if the problem persists",
            ],
            ErrorCode::ResourceNotFound => &[
                "Refresh the station and menu data",
                "Choose a different station or item",
            ],
            ErrorCode::ResourceUnavailable | ErrorCode::StationOverloaded => &[
                "Use the suggested alternative station",
                "Ask the manager to reassign the order",
            ],
            ErrorCode::InsufficientQuantity => &[
                "Check stock levels for the item",
                "Offer a substitute or mark the item as unavailable",
            ],
            ErrorCode::Conflict => &["Refresh the order and apply the change again"],
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an error originated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Logical operation name, e.g. `status_change` or `drain`.
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        ErrorContext { operation: operation.into(), ..Default::default() }
    }

    pub fn with_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_action(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }
}

/// A classified failure ready to be shown to an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} [{code}]")]
pub struct DomainError {
    code: ErrorCode,
    message: String,
    technical_message: String,
    suggestions: Vec<String>,
    context: ErrorContext,
}

impl DomainError {
    /// Creates an error with the code's default message and suggestions.
    pub fn new(
        code: ErrorCode,
        technical_message: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        DomainError {
            code,
            message: code.default_message().to_string(),
            technical_message: technical_message.into(),
            suggestions: code.default_suggestions().iter().map(|s| s.to_string()).collect(),
            context,
        }
    }

    /// Replaces the operator-facing message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Puts an extra suggestion in front of the defaults.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.insert(0, suggestion.into());
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn technical_message(&self) -> &str {
        &self.technical_message
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn is_critical(&self) -> bool {
        self.severity() == Severity::Critical
    }
}

#[cfg(test)]
#[path = "domain_error_tests.rs"]
mod tests;
