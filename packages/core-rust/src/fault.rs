//! Failure taxonomy shared by the invoker, the handler chain and the error sink.
//!
//! Every failure that crosses the interception layer is a [`Fault`]. The
//! variant decides the category once ([`FaultKind`]), so downstream code
//! matches on kinds instead of probing concrete error types.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message key used by [`Fault::system`] when no message is supplied.
pub const SYSTEM_FAULT_KEY: &str = "systemException";

/// Line separating chain links in [`Fault::diagnostic_report`].
pub const REPORT_SEPARATOR: &str =
    "####################################################################";

// ---------------------------------------------------------------------------
// WrapperKind / FaultKind
// ---------------------------------------------------------------------------

/// Boundary a transparent wrapper was created at.
///
/// Wrappers only carry another fault across some boundary and are never
/// meaningful on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapperKind {
    /// Raised by the dispatch machinery around a target method.
    Invocation,
    /// Raised by a forwarding proxy for a failure it could not declare.
    Proxy,
    /// Raised while evaluating a binding or expression.
    Expression,
    /// Raised when collecting the result of deferred or detached execution.
    Deferred,
    /// Generic fatal/unrecoverable wrapper.
    Fatal,
}

impl fmt::Display for WrapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invocation => "invocation",
            Self::Proxy => "proxy",
            Self::Expression => "expression",
            Self::Deferred => "deferred",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Category of a fault, decided by its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// Carries a cause; unwrapped by normalization.
    TransparentWrapper(WrapperKind),
    /// Anticipated domain condition with a message key.
    Business,
    /// Expired authentication; the only retryable category.
    SessionExpired,
    /// Anything the handler chain does not recognize by default.
    Unknown,
}

// ---------------------------------------------------------------------------
// BusinessFault
// ---------------------------------------------------------------------------

/// Expected domain error described by a message key and its parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("{key}")]
pub struct BusinessFault {
    /// Catalog key of the user-facing message.
    pub key: String,
    /// Positional parameters substituted into the message.
    pub params: Vec<Value>,
}

impl BusinessFault {
    #[must_use]
    pub fn new(key: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            key: key.into(),
            params,
        }
    }
}

// ---------------------------------------------------------------------------
// Fault
// ---------------------------------------------------------------------------

/// Error type flowing through the interception layer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Fault {
    #[error("{kind} wrapper: {message}")]
    Wrapped {
        kind: WrapperKind,
        message: String,
        #[source]
        cause: Option<Box<Fault>>,
    },
    #[error("business error: {0}")]
    Business(#[from] BusinessFault),
    #[error("session expired: {message}")]
    SessionExpired { message: String },
    #[error("argument serialization failed for `{method}`: {reason}")]
    Serialization { method: String, reason: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("system error: {message}")]
    System {
        message: String,
        #[source]
        cause: Option<Box<Fault>>,
    },
    #[error("panic while processing event: {0}")]
    Panicked(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Fault {
    /// Wraps `cause` in a transparent wrapper of the given kind.
    #[must_use]
    pub fn wrap(kind: WrapperKind, message: impl Into<String>, cause: Fault) -> Self {
        Self::Wrapped {
            kind,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    #[must_use]
    pub fn business(key: impl Into<String>, params: Vec<Value>) -> Self {
        Self::Business(BusinessFault::new(key, params))
    }

    #[must_use]
    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::SessionExpired {
            message: message.into(),
        }
    }

    /// Infrastructure failure unrelated to business rules.
    ///
    /// An empty message falls back to [`SYSTEM_FAULT_KEY`].
    #[must_use]
    pub fn system(message: impl Into<String>, cause: Option<Fault>) -> Self {
        let message = message.into();
        Self::System {
            message: if message.is_empty() {
                SYSTEM_FAULT_KEY.to_string()
            } else {
                message
            },
            cause: cause.map(Box::new),
        }
    }

    /// Category of this fault.
    #[must_use]
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Wrapped { kind, .. } => FaultKind::TransparentWrapper(*kind),
            Self::Business(_) => FaultKind::Business,
            Self::SessionExpired { .. } => FaultKind::SessionExpired,
            Self::Serialization { .. }
            | Self::InvalidArgument(_)
            | Self::System { .. }
            | Self::Panicked(_)
            | Self::Internal(_) => FaultKind::Unknown,
        }
    }

    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// Direct cause of this fault, when it is itself a [`Fault`].
    #[must_use]
    pub fn cause(&self) -> Option<&Fault> {
        match self {
            Self::Wrapped { cause, .. } | Self::System { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }

    /// One `message [kind]` line per link of the source chain.
    #[must_use]
    pub fn messages(&self) -> String {
        let mut out = format!("{self} [{:?}]\n", self.kind());
        let mut source = self.source();
        while let Some(err) = source {
            out.push_str(&format!("{err} [source]\n"));
            source = err.source();
        }
        out
    }

    /// Full diagnostic text of the source chain, one block per link.
    ///
    /// This is what the unknown-error dialog displays.
    #[must_use]
    pub fn diagnostic_report(&self) -> String {
        let mut out = String::new();
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            out.push_str("\r\n");
            out.push_str(REPORT_SEPARATOR);
            out.push_str("\r\n");
            out.push_str(&err.to_string());
            out.push_str("\r\n");
            out.push_str(&format!("{err:?}"));
            out.push_str("\r\n");
            current = err.source();
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn kinds_follow_variants() {
        let base = Fault::business("order.locked", vec![json!(7)]);
        assert_eq!(base.kind(), FaultKind::Business);
        assert_eq!(
            Fault::wrap(WrapperKind::Proxy, "proxy", base).kind(),
            FaultKind::TransparentWrapper(WrapperKind::Proxy)
        );
        assert_eq!(
            Fault::session_expired("token").kind(),
            FaultKind::SessionExpired
        );
        assert_eq!(
            Fault::Internal(anyhow::anyhow!("boom")).kind(),
            FaultKind::Unknown
        );
        assert_eq!(Fault::Panicked("oops".into()).kind(), FaultKind::Unknown);
    }

    #[test]
    fn system_fault_defaults_message_key() {
        let fault = Fault::system("", None);
        assert!(matches!(
            &fault,
            Fault::System { message, cause: None } if message == SYSTEM_FAULT_KEY
        ));
    }

    #[test]
    fn cause_exposes_wrapped_fault() {
        let fault = Fault::wrap(
            WrapperKind::Deferred,
            "join",
            Fault::session_expired("expired"),
        );
        assert!(fault.cause().is_some_and(Fault::is_session_expired));
        assert!(Fault::session_expired("x").cause().is_none());
    }

    #[test]
    fn diagnostic_report_lists_every_link() {
        let fault = Fault::wrap(
            WrapperKind::Invocation,
            "outer",
            Fault::system("disk full", Some(Fault::InvalidArgument("path".into()))),
        );
        let report = fault.diagnostic_report();
        assert_eq!(report.matches(REPORT_SEPARATOR).count(), 3);
        assert!(report.contains("invocation wrapper: outer"));
        assert!(report.contains("system error: disk full"));
        assert!(report.contains("invalid argument: path"));
    }

    #[test]
    fn messages_has_one_line_per_link() {
        let fault = Fault::wrap(WrapperKind::Fatal, "f", Fault::session_expired("s"));
        assert_eq!(fault.messages().lines().count(), 2);
    }
}
