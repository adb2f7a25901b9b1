//! Recording doubles for the UI collaborators, shared by unit tests.

use std::collections::VecDeque;

use callguard_core::{ExceptionMessage, Fault};
use parking_lot::Mutex;

use crate::dispatch::{EventScheduler, UiTask};
use crate::indicator::ModalIndicator;
use crate::listener::OperationListener;
use crate::sink::{DialogPresenter, UnknownDialogGuard};

// ---------------------------------------------------------------------------
// RecordingIndicator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RecordingIndicator {
    events: Mutex<Vec<String>>,
}

impl RecordingIndicator {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl ModalIndicator for RecordingIndicator {
    fn set_message(&self, text: &str) {
        self.push(format!("message:{text}"));
    }

    fn set_progress(&self, progress: Option<u8>) {
        match progress {
            Some(p) => self.push(format!("progress:{p}")),
            None => self.push("progress:indeterminate".to_string()),
        }
    }

    fn show(&self) {
        self.push("show".to_string());
    }

    fn hide(&self) {
        self.push("hide".to_string());
    }
}

// ---------------------------------------------------------------------------
// RecordingListener
// ---------------------------------------------------------------------------

/// Logs every lifecycle event; answers `session_expired` from a script and
/// declines once the script runs out.
#[derive(Default)]
pub(crate) struct RecordingListener {
    log: Mutex<Vec<String>>,
    answers: Mutex<VecDeque<bool>>,
    expiry_messages: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub(crate) fn answer_session_expired(&self, answers: &[bool]) {
        self.answers.lock().extend(answers.iter().copied());
    }

    /// `start`, `success` and `failure` events in order.
    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub(crate) fn session_expiry_messages(&self) -> Vec<String> {
        self.expiry_messages.lock().clone()
    }

    pub(crate) fn starts(&self) -> usize {
        self.count("start:")
    }

    pub(crate) fn successes(&self) -> usize {
        self.count("success:")
    }

    pub(crate) fn failures(&self) -> usize {
        self.count("failure:")
    }

    fn count(&self, prefix: &str) -> usize {
        self.log.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

impl OperationListener for RecordingListener {
    fn start(&self, description: &str) {
        self.log.lock().push(format!("start:{description}"));
    }

    fn success(&self, description: &str, success_message: &str) {
        self.log
            .lock()
            .push(format!("success:{description}|{success_message}"));
    }

    fn failure(&self, description: &str, fault: &Fault) {
        self.log.lock().push(format!("failure:{description}|{fault}"));
    }

    fn session_expired(&self, message: &str) -> bool {
        self.expiry_messages.lock().push(message.to_string());
        self.answers.lock().pop_front().unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// QueueScheduler
// ---------------------------------------------------------------------------

/// Holds scheduled tasks until the test runs them.
#[derive(Default)]
pub(crate) struct QueueScheduler {
    tasks: Mutex<VecDeque<UiTask>>,
}

impl QueueScheduler {
    /// Runs queued tasks, including any they schedule, until none are left.
    pub(crate) fn run_pending(&self) {
        loop {
            let next = self.tasks.lock().pop_front();
            match next {
                Some(task) => task().unwrap(),
                None => break,
            }
        }
    }
}

impl EventScheduler for QueueScheduler {
    fn invoke_later(&self, task: UiTask) {
        self.tasks.lock().push_back(task);
    }
}

// ---------------------------------------------------------------------------
// RecordingPresenter
// ---------------------------------------------------------------------------

/// Keeps unknown-error dialogs "open" until [`RecordingPresenter::close_all`].
#[derive(Default)]
pub(crate) struct RecordingPresenter {
    messages: Mutex<Vec<String>>,
    unknown: Mutex<Vec<String>>,
    open: Mutex<Vec<UnknownDialogGuard>>,
}

impl RecordingPresenter {
    /// Shown message dialogs as `key:text`.
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub(crate) fn unknown_dialogs(&self) -> Vec<String> {
        self.unknown.lock().clone()
    }

    pub(crate) fn close_all(&self) {
        self.open.lock().clear();
    }
}

impl DialogPresenter for RecordingPresenter {
    fn show_message(&self, text: &str, message: &ExceptionMessage) {
        self.messages
            .lock()
            .push(format!("{}:{text}", message.key()));
    }

    fn show_unknown_error(&self, diagnostic: &str, guard: UnknownDialogGuard) {
        self.unknown.lock().push(diagnostic.to_string());
        self.open.lock().push(guard);
    }
}
