//! Cooperative UI dispatch loop.
//!
//! A single thread processes UI tasks one at a time in arrival order. Tasks
//! that fail or panic are handed to the loop's error handler, normally the
//! `TopLevelErrorSink`, so nothing raised while processing an event is lost.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

use callguard_core::Fault;
use crossbeam_channel::{Receiver, Sender};

/// Unit of work processed by the dispatch loop.
pub type UiTask = Box<dyn FnOnce() -> Result<(), Fault> + Send + 'static>;

// ---------------------------------------------------------------------------
// CallMode / CallSite
// ---------------------------------------------------------------------------

/// Whether a call was made from the UI dispatch thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// On the dispatch thread: blocking, with indicator and lifecycle events.
    Interactive,
    /// Anywhere else: direct passthrough.
    Background,
}

/// Classifies the current thread for the invoker.
pub trait CallSite: Send + Sync {
    fn mode(&self) -> CallMode;
}

/// A fixed mode, for hosts without a dispatch loop.
impl CallSite for CallMode {
    fn mode(&self) -> CallMode {
        *self
    }
}

// ---------------------------------------------------------------------------
// EventScheduler
// ---------------------------------------------------------------------------

/// Posts work onto the UI loop to run after the current event.
pub trait EventScheduler: Send + Sync {
    fn invoke_later(&self, task: UiTask);
}

// ---------------------------------------------------------------------------
// DispatchHandle
// ---------------------------------------------------------------------------

enum Envelope {
    Task(UiTask),
    Shutdown,
}

/// Cloneable handle used to post tasks to the loop and to recognize its thread.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: Sender<Envelope>,
    thread: Arc<OnceLock<ThreadId>>,
}

impl DispatchHandle {
    /// True when called from the loop's own thread.
    #[must_use]
    pub fn is_dispatch_thread(&self) -> bool {
        self.thread.get() == Some(&thread::current().id())
    }

    /// Runs `task` on the loop and waits for its result.
    ///
    /// Called from the dispatch thread itself, the task runs inline.
    ///
    /// # Errors
    ///
    /// Returns `Fault::System` if the loop has stopped, or stops before
    /// running the task.
    pub fn invoke_and_wait<R, F>(&self, task: F) -> Result<R, Fault>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_dispatch_thread() {
            return Ok(task());
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.post(Box::new(move || {
            // The waiter may have given up; nothing to report then.
            let _ = reply_tx.send(task());
            Ok(())
        }))?;
        reply_rx
            .recv()
            .map_err(|_| Fault::system("dispatch loop stopped before running task", None))
    }

    /// Asks the loop to stop after the tasks already queued.
    pub fn stop(&self) {
        // Ignore send errors -- the loop may already be gone
        let _ = self.tx.send(Envelope::Shutdown);
    }

    fn post(&self, task: UiTask) -> Result<(), Fault> {
        self.tx
            .send(Envelope::Task(task))
            .map_err(|_| Fault::system("dispatch loop stopped", None))
    }
}

impl EventScheduler for DispatchHandle {
    fn invoke_later(&self, task: UiTask) {
        if self.post(task).is_err() {
            tracing::warn!("dispatch loop stopped, dropping scheduled task");
        }
    }
}

impl CallSite for DispatchHandle {
    fn mode(&self) -> CallMode {
        if self.is_dispatch_thread() {
            CallMode::Interactive
        } else {
            CallMode::Background
        }
    }
}

impl std::fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("thread", &self.thread.get())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// DispatchLoop
// ---------------------------------------------------------------------------

/// The UI loop before it is started.
///
/// Create it, hand [`DispatchLoop::handle`] to whatever needs to post work
/// (including the error sink), then [`DispatchLoop::start`] it.
pub struct DispatchLoop {
    rx: Receiver<Envelope>,
    handle: DispatchHandle,
}

impl DispatchLoop {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            rx,
            handle: DispatchHandle {
                tx,
                thread: Arc::new(OnceLock::new()),
            },
        }
    }

    #[must_use]
    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Spawns the loop thread.
    ///
    /// Every task that returns `Err` or panics is passed to `on_error`. After
    /// [`DispatchHandle::stop`], tasks queued before the stop request, and any
    /// they schedule in turn, still run before the thread exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS thread cannot be spawned.
    pub fn start<H>(self, on_error: H) -> std::io::Result<JoinHandle<()>>
    where
        H: Fn(Fault) + Send + 'static,
    {
        let Self { rx, handle } = self;
        thread::Builder::new()
            .name("ui-dispatch".to_string())
            .spawn(move || {
                let _ = handle.thread.set(thread::current().id());
                tracing::debug!("dispatch loop started");

                while let Ok(Envelope::Task(task)) = rx.recv() {
                    run_event(task, &on_error);
                }

                // Drain what was queued before shutdown.
                while let Ok(envelope) = rx.try_recv() {
                    if let Envelope::Task(task) = envelope {
                        run_event(task, &on_error);
                    }
                }
                tracing::debug!("dispatch loop stopped");
            })
    }
}

impl Default for DispatchLoop {
    fn default() -> Self {
        Self::new()
    }
}

fn run_event<H: Fn(Fault)>(task: UiTask, on_error: &H) {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => {}
        Ok(Err(fault)) => on_error(fault),
        Err(payload) => on_error(Fault::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
