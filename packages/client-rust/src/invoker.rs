//! The intercepting façade placed in front of a service object.
//!
//! A service is exposed to the UI through `InterceptingInvoker<dyn Service>`
//! plus a forwarding `impl Service for InterceptingInvoker<dyn Service>`,
//! where every method calls [`InterceptingInvoker::invoke`] with a closure
//! that forwards to the real target:
//!
//! ```ignore
//! impl AccountService for InterceptingInvoker<dyn AccountService> {
//!     fn balance(&self, account: &str) -> Result<u64, Fault> {
//!         self.invoke("balance", account.to_string(), |svc, account| svc.balance(account))
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use callguard_core::Fault;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::field;

use crate::catalog::{MessageCatalog, FAILURE_KEY, PROCESSING_KEY, SUCCESS_KEY};
use crate::config::{InvokerConfig, SerializationOverride};
use crate::dispatch::{CallMode, CallSite};
use crate::indicator::{BlockingEntryPoint, CallResult};
use crate::listener::OperationListener;
use crate::retry::{RetryCoordinator, RetryPhase};
use crate::serialization::deep_copy;

// ---------------------------------------------------------------------------
// UiContext
// ---------------------------------------------------------------------------

/// UI collaborators shared by every invoker of an application.
///
/// Built once at startup and cloned into each façade.
#[derive(Clone)]
pub struct UiContext {
    pub entry_point: Arc<dyn BlockingEntryPoint>,
    pub call_site: Arc<dyn CallSite>,
    pub catalog: Arc<dyn MessageCatalog>,
    pub exemptions: Arc<SerializationOverride>,
}

impl std::fmt::Debug for UiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiContext")
            .field("exemptions", &self.exemptions)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// One call made through a façade. Lives until the call resolves.
#[derive(Debug)]
pub struct Invocation<'a, A> {
    pub call_id: u64,
    pub service: &'a str,
    pub method: &'static str,
    pub args: &'a A,
    pub mode: CallMode,
}

impl<A> Invocation<'_, A> {
    /// Catalog key describing this method, e.g. `Accounts.transfer`.
    #[must_use]
    pub fn description_key(&self) -> String {
        format!("{}.{}", self.service, self.method)
    }

    #[must_use]
    pub fn success_key(&self) -> String {
        format!("{}.{}.success", self.service, self.method)
    }
}

// ---------------------------------------------------------------------------
// InterceptingInvoker
// ---------------------------------------------------------------------------

/// Façade routing every call on a service through the interception
/// pipeline: mode selection, optional argument copy, blocking execution
/// with lifecycle notifications, normalization and session-expiry retry.
pub struct InterceptingInvoker<T: ?Sized> {
    target: Arc<T>,
    service_name: String,
    listener: Arc<dyn OperationListener>,
    ui: UiContext,
    config: InvokerConfig,
    call_id_counter: AtomicU64,
}

impl<T: ?Sized + Send + Sync> InterceptingInvoker<T> {
    /// Builds the façade around `target`.
    ///
    /// # Errors
    ///
    /// Returns `Fault::InvalidArgument` if `target` is `None`.
    pub fn wrap(
        service_name: impl Into<String>,
        target: Option<Arc<T>>,
        listener: Arc<dyn OperationListener>,
        force_argument_serialization: bool,
        ui: UiContext,
    ) -> Result<Self, Fault> {
        let service_name = service_name.into();
        let target = target.ok_or_else(|| {
            Fault::InvalidArgument(format!("no target supplied for service `{service_name}`"))
        })?;
        Ok(Self {
            target,
            service_name,
            listener,
            ui,
            config: InvokerConfig {
                force_argument_serialization,
                ..InvokerConfig::default()
            },
            call_id_counter: AtomicU64::new(1),
        })
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn with_config(mut self, config: InvokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Caps attempts of one interactive call, counting the first.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: std::num::NonZeroU32) -> Self {
        self.config.max_attempts = Some(max_attempts);
        self
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// The wrapped service, bypassing interception.
    #[must_use]
    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    /// Runs `call` against the target through the interception pipeline.
    ///
    /// `method` names the call for logging, catalog lookup and the
    /// serialization exemption pattern.
    ///
    /// # Errors
    ///
    /// Returns the normalized fault of the last attempt. Interactive calls
    /// have already reported it to the listener.
    pub fn invoke<A, R, F>(&self, method: &'static str, args: A, call: F) -> Result<R, Fault>
    where
        A: Serialize + DeserializeOwned,
        R: 'static,
        F: Fn(&T, &A) -> Result<R, Fault>,
    {
        let invocation = Invocation {
            call_id: self.call_id_counter.fetch_add(1, Ordering::Relaxed),
            service: &self.service_name,
            method,
            args: &args,
            mode: self.ui.call_site.mode(),
        };

        let span = tracing::info_span!(
            "invocation",
            service = %invocation.service,
            method = invocation.method,
            call_id = invocation.call_id,
            mode = ?invocation.mode,
            attempts = field::Empty,
            outcome = field::Empty,
            duration_ms = field::Empty,
        );
        let _enter = span.enter();
        tracing::info!("invoking");
        let start = Instant::now();

        let (result, attempts) = match invocation.mode {
            CallMode::Background => (self.run_background(&invocation, &call), 1),
            CallMode::Interactive => self.run_interactive(&invocation, &call),
        };

        #[allow(clippy::cast_possible_truncation)] // call duration will not exceed u64::MAX ms
        let duration_ms = start.elapsed().as_millis() as u64;
        span.record("attempts", attempts);
        span.record("duration_ms", duration_ms);
        span.record("outcome", if result.is_ok() { "success" } else { "failure" });
        tracing::info!("invocation complete");

        result
    }

    /// Passthrough: no indicator, no notifications, no retry.
    fn run_background<A, R, F>(&self, invocation: &Invocation<'_, A>, call: &F) -> Result<R, Fault>
    where
        A: Serialize + DeserializeOwned,
        F: Fn(&T, &A) -> Result<R, Fault>,
    {
        self.attempt(invocation, call)
            .map_err(Fault::into_normalized)
    }

    fn run_interactive<A, R, F>(
        &self,
        invocation: &Invocation<'_, A>,
        call: &F,
    ) -> (Result<R, Fault>, u32)
    where
        A: Serialize + DeserializeOwned,
        R: 'static,
        F: Fn(&T, &A) -> Result<R, Fault>,
    {
        let catalog = &self.ui.catalog;
        let description = catalog
            .resolve(&invocation.description_key(), &[])
            .unwrap_or_default();
        let description_param = [Value::String(description.clone())];
        let processing = catalog.text_or_key(PROCESSING_KEY, &description_param);

        self.listener.start(&processing);

        let mut retry = RetryCoordinator::new(self.config.max_attempts);
        loop {
            retry.begin_attempt();
            tracing::debug!(attempt = retry.attempts(), "attempt started");

            let outcome = self
                .ui
                .entry_point
                .blocking_invoke(
                    &processing,
                    None,
                    Box::new(|| -> CallResult {
                        let value = self.attempt(invocation, call)?;
                        Ok(Box::new(value))
                    }),
                )
                .and_then(|erased| {
                    erased.downcast::<R>().map(|value| *value).map_err(|_| {
                        Fault::Internal(anyhow::anyhow!(
                            "blocking entry point returned a value of the wrong type"
                        ))
                    })
                });

            match outcome {
                Ok(value) => {
                    retry.record_success();
                    let success = catalog.text_or_key(SUCCESS_KEY, &description_param);
                    let success_message = catalog
                        .resolve(&invocation.success_key(), &[])
                        .unwrap_or_default();
                    self.listener.success(&success, &success_message);
                    return (Ok(value), retry.attempts());
                }
                Err(fault) => {
                    let fault = fault.into_normalized();
                    let failure = catalog.text_or_key(FAILURE_KEY, &description_param);
                    self.listener.failure(&failure, &fault);

                    if retry.record_failure(&fault) == RetryPhase::FailedRetryable {
                        let message = match &fault {
                            Fault::SessionExpired { message } => message.as_str(),
                            _ => "",
                        };
                        let again = self.listener.session_expired(message);
                        tracing::debug!(retry = again, "session expired");
                        if retry.resolve(again) == RetryPhase::Attempting {
                            continue;
                        }
                    }
                    return (Err(fault), retry.attempts());
                }
            }
        }
    }

    /// One execution of the target, with the argument copy when enabled.
    fn attempt<A, R, F>(&self, invocation: &Invocation<'_, A>, call: &F) -> Result<R, Fault>
    where
        A: Serialize + DeserializeOwned,
        F: Fn(&T, &A) -> Result<R, Fault>,
    {
        if self.copies_arguments(invocation.method) {
            let copied = deep_copy(invocation.method, invocation.args)?;
            call(&self.target, &copied)
        } else {
            call(&self.target, invocation.args)
        }
    }

    fn copies_arguments(&self, method: &str) -> bool {
        self.config.force_argument_serialization && !self.ui.exemptions.is_exempt(method)
    }
}

impl<T: ?Sized> std::fmt::Debug for InterceptingInvoker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptingInvoker")
            .field("service_name", &self.service_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use callguard_core::WrapperKind;
    use parking_lot::Mutex;
    use serde::{Deserialize, Serializer};

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::indicator::BlockingIndicator;
    use crate::test_support::{RecordingIndicator, RecordingListener};

    // -- a small service and its façade --

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Transfer {
        from: String,
        to: String,
        amount: u64,
    }

    /// Argument holding a process-local resource.
    #[derive(Debug, Deserialize)]
    struct Attachment;

    impl Serialize for Attachment {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("attachment is not serializable"))
        }
    }

    trait Accounts: Send + Sync {
        fn transfer(&self, transfer: &Transfer) -> Result<u64, Fault>;
        fn attach(&self, attachment: &Attachment) -> Result<(), Fault>;
    }

    impl Accounts for InterceptingInvoker<dyn Accounts> {
        fn transfer(&self, transfer: &Transfer) -> Result<u64, Fault> {
            self.invoke("transfer", transfer.clone(), |svc, t| svc.transfer(t))
        }

        fn attach(&self, _attachment: &Attachment) -> Result<(), Fault> {
            self.invoke("attach", Attachment, |svc, a| svc.attach(a))
        }
    }

    /// Fails with a scripted sequence of faults, then succeeds.
    #[derive(Default)]
    struct ScriptedAccounts {
        failures: Mutex<Vec<Fault>>,
        calls: Mutex<u32>,
    }

    impl ScriptedAccounts {
        fn failing_with(faults: Vec<Fault>) -> Self {
            Self {
                failures: Mutex::new(faults),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    impl Accounts for ScriptedAccounts {
        fn transfer(&self, transfer: &Transfer) -> Result<u64, Fault> {
            let call = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls
            };
            let mut failures = self.failures.lock();
            if failures.is_empty() {
                Ok(transfer.amount * 10 + u64::from(call))
            } else {
                Err(failures.remove(0))
            }
        }

        fn attach(&self, _attachment: &Attachment) -> Result<(), Fault> {
            *self.calls.lock() += 1;
            Ok(())
        }
    }

    struct Fixture {
        widget: Arc<RecordingIndicator>,
        listener: Arc<RecordingListener>,
        exemptions: Arc<SerializationOverride>,
        ui: UiContext,
    }

    fn fixture(mode: CallMode) -> Fixture {
        let widget = Arc::new(RecordingIndicator::default());
        let listener = Arc::new(RecordingListener::default());
        let exemptions = Arc::new(SerializationOverride::new());
        let mut catalog = StaticCatalog::with_defaults();
        catalog.insert("Accounts.transfer", "transfer");
        catalog.insert("Accounts.transfer.success", "Money moved");
        let ui = UiContext {
            entry_point: Arc::new(BlockingIndicator::new(widget.clone())),
            call_site: Arc::new(mode),
            catalog: Arc::new(catalog),
            exemptions: exemptions.clone(),
        };
        Fixture {
            widget,
            listener,
            exemptions,
            ui,
        }
    }

    fn facade(
        fx: &Fixture,
        target: Arc<ScriptedAccounts>,
        force: bool,
    ) -> InterceptingInvoker<dyn Accounts> {
        let target: Arc<dyn Accounts> = target;
        InterceptingInvoker::wrap("Accounts", Some(target), fx.listener.clone(), force, fx.ui.clone())
            .unwrap()
    }

    fn sample() -> Transfer {
        Transfer {
            from: "A-1".into(),
            to: "B-2".into(),
            amount: 5,
        }
    }

    // -- construction --

    #[test]
    fn wrap_without_target_is_invalid_argument() {
        let fx = fixture(CallMode::Interactive);
        let result = InterceptingInvoker::<dyn Accounts>::wrap(
            "Accounts",
            None,
            fx.listener.clone(),
            false,
            fx.ui.clone(),
        );
        assert!(matches!(result, Err(Fault::InvalidArgument(_))));
    }

    // -- interactive path --

    #[test]
    fn interactive_success_notifies_and_returns_value() {
        let fx = fixture(CallMode::Interactive);
        let target = Arc::new(ScriptedAccounts::default());
        let accounts = facade(&fx, target.clone(), false);

        assert_eq!(accounts.transfer(&sample()).unwrap(), 51);

        assert_eq!(
            fx.listener.log(),
            vec![
                "start:Processing transfer",
                "success:Operation completed|Money moved"
            ]
        );
        assert_eq!(
            fx.widget.events(),
            vec!["message:Processing transfer", "progress:indeterminate", "show", "hide"]
        );
    }

    #[test]
    fn session_expired_twice_then_success_is_transparent() {
        let fx = fixture(CallMode::Interactive);
        fx.listener.answer_session_expired(&[true, true]);
        let target = Arc::new(ScriptedAccounts::failing_with(vec![
            Fault::session_expired("token expired"),
            Fault::wrap(
                WrapperKind::Proxy,
                "proxy",
                Fault::session_expired("token expired"),
            ),
        ]));
        let accounts = facade(&fx, target.clone(), false);

        // Third call succeeds: 5 * 10 + 3.
        assert_eq!(accounts.transfer(&sample()).unwrap(), 53);

        assert_eq!(fx.listener.starts(), 1);
        assert_eq!(fx.listener.failures(), 2);
        assert_eq!(fx.listener.successes(), 1);
        assert_eq!(fx.listener.session_expiry_messages(), vec!["token expired"; 2]);
        assert_eq!(target.calls(), 3);
    }

    #[test]
    fn declined_retry_propagates_session_expiry() {
        let fx = fixture(CallMode::Interactive);
        fx.listener.answer_session_expired(&[false]);
        let target = Arc::new(ScriptedAccounts::failing_with(vec![Fault::session_expired(
            "gone",
        )]));
        let accounts = facade(&fx, target.clone(), false);

        let err = accounts.transfer(&sample()).unwrap_err();

        assert!(err.is_session_expired());
        assert_eq!(fx.listener.failures(), 1);
        assert_eq!(fx.listener.successes(), 0);
        assert_eq!(target.calls(), 1);
    }

    #[test]
    fn business_failure_is_notified_normalized_and_not_retried() {
        let fx = fixture(CallMode::Interactive);
        let target = Arc::new(ScriptedAccounts::failing_with(vec![Fault::wrap(
            WrapperKind::Invocation,
            "reflective call failed",
            Fault::business("account.frozen", vec![]),
        )]));
        let accounts = facade(&fx, target.clone(), false);

        let err = accounts.transfer(&sample()).unwrap_err();

        assert!(matches!(err, Fault::Business(ref b) if b.key == "account.frozen"));
        assert_eq!(
            fx.listener.log(),
            vec![
                "start:Processing transfer",
                "failure:Operation failed: transfer|business error: account.frozen"
            ]
        );
        assert!(fx.listener.session_expiry_messages().is_empty());
        assert_eq!(fx.widget.events().last().map(String::as_str), Some("hide"));
    }

    #[test]
    fn attempt_cap_stops_endless_retry() {
        let fx = fixture(CallMode::Interactive);
        fx.listener.answer_session_expired(&[true; 10]);
        let target = Arc::new(ScriptedAccounts::failing_with(
            (0..10).map(|_| Fault::session_expired("again")).collect(),
        ));
        let accounts = facade(&fx, target.clone(), false)
            .with_max_attempts(NonZeroU32::new(3).unwrap());

        let err = accounts.transfer(&sample()).unwrap_err();

        assert!(err.is_session_expired());
        assert_eq!(target.calls(), 3);
        assert_eq!(fx.listener.failures(), 3);
        assert_eq!(fx.listener.session_expiry_messages().len(), 2);
    }

    #[test]
    fn unknown_method_description_is_empty() {
        let fx = fixture(CallMode::Interactive);
        let target = Arc::new(ScriptedAccounts::default());
        let accounts = facade(&fx, target, false);

        accounts.attach(&Attachment).unwrap();

        assert_eq!(
            fx.listener.log(),
            vec!["start:Processing ", "success:Operation completed|"]
        );
    }

    // -- forced serialization --

    #[test]
    fn forced_serialization_failure_is_reported() {
        let fx = fixture(CallMode::Interactive);
        let target = Arc::new(ScriptedAccounts::default());
        let accounts = facade(&fx, target.clone(), true);

        let err = accounts.attach(&Attachment).unwrap_err();

        assert!(matches!(err, Fault::Serialization { ref method, .. } if method == "attach"));
        assert_eq!(fx.listener.failures(), 1);
        assert!(fx.listener.log()[1].contains("not serializable"));
        assert_eq!(target.calls(), 0);
    }

    #[test]
    fn exempt_method_skips_serialization() {
        let fx = fixture(CallMode::Interactive);
        fx.exemptions.set_pattern(Some("att.*")).unwrap();
        let target = Arc::new(ScriptedAccounts::default());
        let accounts = facade(&fx, target.clone(), true);

        accounts.attach(&Attachment).unwrap();

        assert_eq!(target.calls(), 1);
        assert_eq!(fx.listener.successes(), 1);
    }

    #[test]
    fn serializable_arguments_pass_through_copy() {
        let fx = fixture(CallMode::Interactive);
        let target = Arc::new(ScriptedAccounts::default());
        let accounts = facade(&fx, target, true);
        assert_eq!(accounts.transfer(&sample()).unwrap(), 51);
    }

    // -- background path --

    #[test]
    fn background_calls_are_silent() {
        let fx = fixture(CallMode::Background);
        fx.listener.answer_session_expired(&[true]);
        let target = Arc::new(ScriptedAccounts::failing_with(vec![Fault::wrap(
            WrapperKind::Deferred,
            "future",
            Fault::session_expired("expired"),
        )]));
        let accounts = facade(&fx, target.clone(), false);

        let err = accounts.transfer(&sample()).unwrap_err();
        assert!(err.is_session_expired());

        assert_eq!(accounts.transfer(&sample()).unwrap(), 52);

        assert!(fx.listener.log().is_empty());
        assert!(fx.widget.events().is_empty());
        assert_eq!(target.calls(), 2);
    }

    #[test]
    fn background_serialization_failure_propagates() {
        let fx = fixture(CallMode::Background);
        let target = Arc::new(ScriptedAccounts::default());
        let accounts = facade(&fx, target, true);

        assert!(matches!(
            accounts.attach(&Attachment),
            Err(Fault::Serialization { .. })
        ));
        assert!(fx.listener.log().is_empty());
    }

    #[test]
    fn invocation_keys() {
        let args = ();
        let invocation = Invocation {
            call_id: 1,
            service: "Orders",
            method: "cancel",
            args: &args,
            mode: CallMode::Interactive,
        };
        assert_eq!(invocation.description_key(), "Orders.cancel");
        assert_eq!(invocation.success_key(), "Orders.cancel.success");
    }
}
