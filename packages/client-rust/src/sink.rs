//! Last-resort handler for faults escaping the UI dispatch loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use callguard_core::{normalize, ExceptionMessage, Fault, HandlerChain, HandlerResult};

use crate::catalog::MessageCatalog;
use crate::dispatch::EventScheduler;

// ---------------------------------------------------------------------------
// DialogPresenter
// ---------------------------------------------------------------------------

/// UI side of the error sink. Called on the dispatch loop.
pub trait DialogPresenter: Send + Sync {
    /// Shows a short dialog for one classified message.
    fn show_message(&self, text: &str, message: &ExceptionMessage);

    /// Shows the detailed dialog for an unclassified fault.
    ///
    /// The dialog counts as visible until `guard` is dropped, so a presenter
    /// keeps it for as long as the dialog stays open and returns without
    /// blocking. Dropping `guard` before the dialog closes disables
    /// deduplication.
    fn show_unknown_error(&self, diagnostic: &str, guard: UnknownDialogGuard);
}

// ---------------------------------------------------------------------------
// UnknownDialogGuard
// ---------------------------------------------------------------------------

/// Marks one unknown-error dialog as visible until dropped.
#[derive(Debug)]
pub struct UnknownDialogGuard {
    visible: Arc<AtomicUsize>,
}

impl UnknownDialogGuard {
    fn open(visible: Arc<AtomicUsize>) -> Self {
        visible.fetch_add(1, Ordering::AcqRel);
        Self { visible }
    }
}

impl Drop for UnknownDialogGuard {
    fn drop(&mut self) {
        self.visible.fetch_sub(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// TopLevelErrorSink
// ---------------------------------------------------------------------------

/// Catches every fault raised while processing a UI event.
///
/// Classified faults become short message dialogs. Anything else opens one
/// detailed dialog; while such a dialog is visible further unknown faults
/// are only logged. All dialogs are scheduled on the UI loop, never shown
/// inline.
pub struct TopLevelErrorSink {
    chain: Arc<HandlerChain>,
    scheduler: Arc<dyn EventScheduler>,
    presenter: Arc<dyn DialogPresenter>,
    catalog: Arc<dyn MessageCatalog>,
    visible_unknown: Arc<AtomicUsize>,
}

impl TopLevelErrorSink {
    #[must_use]
    pub fn new(
        chain: Arc<HandlerChain>,
        scheduler: Arc<dyn EventScheduler>,
        presenter: Arc<dyn DialogPresenter>,
        catalog: Arc<dyn MessageCatalog>,
    ) -> Self {
        Self {
            chain,
            scheduler,
            presenter,
            catalog,
            visible_unknown: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Normalizes and classifies `fault`, then schedules its dialog.
    ///
    /// Never fails; the returned result tells what was recognized.
    pub fn handle(&self, fault: Fault) -> HandlerResult {
        let fault = normalize(&fault);
        let result = self.chain.do_handle(fault);

        if result.is_handled() {
            tracing::debug!(
                count = result.messages().len(),
                "fault classified, scheduling message dialogs"
            );
            for message in result.messages() {
                let text = self.catalog.text_or_key(message.key(), message.params());
                let message = message.clone();
                let presenter = Arc::clone(&self.presenter);
                self.scheduler.invoke_later(Box::new(move || {
                    presenter.show_message(&text, &message);
                    Ok(())
                }));
            }
        } else {
            tracing::error!(error = %fault, "unhandled fault reached the UI loop");
            let diagnostic = fault.diagnostic_report();
            let presenter = Arc::clone(&self.presenter);
            let visible = Arc::clone(&self.visible_unknown);
            self.scheduler.invoke_later(Box::new(move || {
                if visible.load(Ordering::Acquire) > 0 {
                    tracing::debug!("unknown-error dialog already visible, suppressing");
                    return Ok(());
                }
                presenter.show_unknown_error(&diagnostic, UnknownDialogGuard::open(visible));
                Ok(())
            }));
        }
        result
    }

    /// Number of unknown-error dialogs currently open.
    #[must_use]
    pub fn visible_unknown_dialogs(&self) -> usize {
        self.visible_unknown.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for TopLevelErrorSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopLevelErrorSink")
            .field("chain", &self.chain)
            .field("visible_unknown", &self.visible_unknown_dialogs())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
