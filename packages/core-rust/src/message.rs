//! User-facing message values produced by classifiers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a user-facing message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational message.
    Info,
    /// Warning the user should notice.
    Warn,
    /// Error preventing the requested action.
    #[default]
    Error,
}

/// Message key, severity and positional parameters describing one handled fault.
///
/// Immutable once built; the UI resolves `key` through its message catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionMessage {
    key: String,
    severity: Severity,
    params: Vec<Value>,
}

impl ExceptionMessage {
    /// Creates a message with [`Severity::Error`].
    #[must_use]
    pub fn new(key: impl Into<String>, params: Vec<Value>) -> Self {
        Self::with_severity(key, Severity::Error, params)
    }

    #[must_use]
    pub fn with_severity(key: impl Into<String>, severity: Severity, params: Vec<Value>) -> Self {
        Self {
            key: key.into(),
            severity,
            params,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Outcome of classifying a fault.
///
/// An unhandled result never carries messages: the only way to build one is
/// [`HandlerResult::unhandled`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResult {
    handled: bool,
    messages: Vec<ExceptionMessage>,
}

impl HandlerResult {
    /// A recognized fault with the messages to show for it.
    #[must_use]
    pub fn handled(messages: Vec<ExceptionMessage>) -> Self {
        Self {
            handled: true,
            messages,
        }
    }

    /// A fault the classifier did not recognize.
    #[must_use]
    pub fn unhandled() -> Self {
        Self {
            handled: false,
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    #[must_use]
    pub fn messages(&self) -> &[ExceptionMessage] {
        &self.messages
    }

    #[must_use]
    pub fn into_messages(self) -> Vec<ExceptionMessage> {
        self.messages
    }
}
