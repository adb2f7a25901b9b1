//! Lifecycle contract between the intercepting invoker and the UI owner.

use callguard_core::Fault;

/// Receives lifecycle events of interactive calls.
///
/// Background calls never reach the listener. For one interactive call the
/// order is `start`, then per attempt either `success` or `failure`, with
/// `session_expired` following a failure whose normalized cause is
/// [`Fault::SessionExpired`].
pub trait OperationListener: Send + Sync {
    /// Called once, before the first attempt.
    fn start(&self, description: &str);

    /// Called when an attempt returned normally.
    fn success(&self, description: &str, success_message: &str);

    /// Called for every failed attempt, with the normalized fault.
    fn failure(&self, description: &str, fault: &Fault);

    /// Asked after a session-expired failure; `true` repeats the call with
    /// the same target and arguments.
    ///
    /// The invoker does not bound how many times this may answer `true`
    /// unless `InvokerConfig::max_attempts` is set. A listener that always
    /// answers `true` retries forever; typically a login dialog stops when
    /// the user cancels.
    fn session_expired(&self, message: &str) -> bool;
}
