//! `callguard` client: intercepting invoker, session-expiry retry, UI
//! dispatch loop and the top-level error sink.
//!
//! Typical wiring at startup:
//!
//! 1. create a [`DispatchLoop`] and keep its [`DispatchHandle`];
//! 2. build one [`BlockingIndicator`] around the application's indicator
//!    widget and a [`UiContext`] holding it, the handle as call site, the
//!    message catalog and the [`SerializationOverride`];
//! 3. build a [`TopLevelErrorSink`] on the same handle and start the loop
//!    with the sink as its error handler;
//! 4. wrap each service with [`InterceptingInvoker::wrap`].

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod indicator;
pub mod invoker;
pub mod listener;
pub mod logging;
pub mod retry;
pub mod serialization;
pub mod sink;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{MessageCatalog, StaticCatalog};
pub use config::{ConfigError, InvokerConfig, SerializationOverride};
pub use dispatch::{CallMode, CallSite, DispatchHandle, DispatchLoop, EventScheduler, UiTask};
pub use indicator::{BlockingEntryPoint, BlockingIndicator, CallResult, ModalIndicator};
pub use invoker::{InterceptingInvoker, Invocation, UiContext};
pub use listener::OperationListener;
pub use retry::{RetryCoordinator, RetryPhase};
pub use sink::{DialogPresenter, TopLevelErrorSink, UnknownDialogGuard};
