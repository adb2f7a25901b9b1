//! Session-expiry retry state machine for interactive calls.

use std::num::NonZeroU32;

use callguard_core::Fault;

/// State of one interactive call across its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Attempting,
    Succeeded,
    /// Failed for good; the fault goes back to the caller.
    FailedTerminal,
    /// Session expired; waiting for the listener to decide.
    FailedRetryable,
}

/// Drives the session-expiry retry loop of a single interactive call.
///
/// ```text
/// Attempting --ok--------------------> Succeeded
/// Attempting --fault (not expiry)----> FailedTerminal
/// Attempting --session expired-------> FailedRetryable
/// FailedRetryable --listener true----> Attempting
/// FailedRetryable --listener false---> FailedTerminal
/// ```
///
/// Without `max_attempts` the loop has no bound of its own.
#[derive(Debug, Clone)]
pub struct RetryCoordinator {
    phase: RetryPhase,
    attempts: u32,
    max_attempts: Option<NonZeroU32>,
}

impl RetryCoordinator {
    #[must_use]
    pub fn new(max_attempts: Option<NonZeroU32>) -> Self {
        Self {
            phase: RetryPhase::Attempting,
            attempts: 0,
            max_attempts,
        }
    }

    /// Counts the attempt about to run.
    pub fn begin_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
        self.phase = RetryPhase::Attempting;
    }

    pub fn record_success(&mut self) {
        self.phase = RetryPhase::Succeeded;
    }

    /// Classifies a normalized failure.
    ///
    /// A session expiry is retryable unless the attempt cap is reached, in
    /// which case the listener is not consulted again.
    pub fn record_failure(&mut self, fault: &Fault) -> RetryPhase {
        self.phase = if !fault.is_session_expired() {
            RetryPhase::FailedTerminal
        } else if self.cap_reached() {
            tracing::warn!(
                attempts = self.attempts,
                "session expired and attempt limit reached, giving up"
            );
            RetryPhase::FailedTerminal
        } else {
            RetryPhase::FailedRetryable
        };
        self.phase
    }

    /// Applies the listener's answer to a retryable failure.
    pub fn resolve(&mut self, retry: bool) -> RetryPhase {
        if self.phase == RetryPhase::FailedRetryable {
            self.phase = if retry {
                RetryPhase::Attempting
            } else {
                RetryPhase::FailedTerminal
            };
        }
        self.phase
    }

    #[must_use]
    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn cap_reached(&self) -> bool {
        self.max_attempts
            .is_some_and(|max| self.attempts >= max.get())
    }
}
