//! Modal "operation in progress" indicator and the blocking entry point
//! that runs a call while it is visible.
//!
//! One [`BlockingIndicator`] exists per application. It is built once at
//! startup around the UI's [`ModalIndicator`] and shared by `Arc` with every
//! invoker. Nested or overlapping interactive calls re-target the indicator
//! that is already visible instead of opening another.

use std::any::Any;
use std::sync::Arc;

use callguard_core::Fault;
use parking_lot::Mutex;

/// Result of a type-erased call run through a [`BlockingEntryPoint`].
pub type CallResult = Result<Box<dyn Any>, Fault>;

/// Type-erased call executed while the indicator is visible.
pub type BlockingCall<'a> = Box<dyn FnOnce() -> CallResult + 'a>;

// ---------------------------------------------------------------------------
// ModalIndicator trait
// ---------------------------------------------------------------------------

/// Widget-side operations of the modal indicator, implemented by the UI.
pub trait ModalIndicator: Send + Sync {
    fn set_message(&self, text: &str);

    /// `None` switches the progress bar to indeterminate.
    fn set_progress(&self, progress: Option<u8>);

    fn show(&self);

    fn hide(&self);
}

// ---------------------------------------------------------------------------
// BlockingEntryPoint trait
// ---------------------------------------------------------------------------

/// Runs one call synchronously while the shared indicator is visible.
pub trait BlockingEntryPoint: Send + Sync {
    /// Shows or re-targets the indicator with `message` and `progress`, runs
    /// `call`, and hides the indicator once the outermost call returns.
    ///
    /// # Errors
    ///
    /// Returns whatever fault `call` returned.
    fn blocking_invoke(&self, message: &str, progress: Option<u8>, call: BlockingCall<'_>)
        -> CallResult;
}

// ---------------------------------------------------------------------------
// BlockingIndicator
// ---------------------------------------------------------------------------

/// [`BlockingEntryPoint`] over a single [`ModalIndicator`].
///
/// Tracks how many calls are inside the indicator: it is shown when the
/// first one enters and hidden when the last one leaves.
pub struct BlockingIndicator {
    indicator: Arc<dyn ModalIndicator>,
    depth: Mutex<u32>,
}

impl BlockingIndicator {
    #[must_use]
    pub fn new(indicator: Arc<dyn ModalIndicator>) -> Self {
        Self {
            indicator,
            depth: Mutex::new(0),
        }
    }

    /// Replaces the text of the running operation.
    pub fn set_block_message(&self, message: &str) {
        self.indicator.set_message(message);
    }

    /// Replaces the progress of the running operation.
    pub fn set_block_progress(&self, progress: Option<u8>) {
        self.indicator.set_progress(progress);
    }

    /// Whether at least one call is running inside the indicator.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.depth.lock() > 0
    }

    fn enter(&self, message: &str, progress: Option<u8>) -> ActiveGuard<'_> {
        let mut depth = self.depth.lock();
        self.indicator.set_message(message);
        self.indicator.set_progress(progress);
        if *depth == 0 {
            self.indicator.show();
        }
        *depth += 1;
        ActiveGuard { owner: self }
    }
}

impl BlockingEntryPoint for BlockingIndicator {
    fn blocking_invoke(
        &self,
        message: &str,
        progress: Option<u8>,
        call: BlockingCall<'_>,
    ) -> CallResult {
        let _active = self.enter(message, progress);
        call()
    }
}

/// Leaves the indicator on drop, hiding it after the outermost call.
///
/// Dropping also runs when the call unwinds, so a panicking call never
/// leaves the indicator on screen.
struct ActiveGuard<'a> {
    owner: &'a BlockingIndicator,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let mut depth = self.owner.depth.lock();
        *depth = depth.saturating_sub(1);
        if *depth == 0 {
            self.owner.indicator.hide();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
