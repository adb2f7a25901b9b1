//! Fault classification: converts a normalized `Fault` into a `HandlerResult`.

use std::sync::Arc;

use crate::fault::Fault;
use crate::message::{ExceptionMessage, HandlerResult};

// ---------------------------------------------------------------------------
// Classifier trait
// ---------------------------------------------------------------------------

/// Recognizes a category of faults and describes them to the user.
///
/// Implementations must not fail: a fault they do not recognize yields
/// [`HandlerResult::unhandled`]. New categories are added as new classifiers
/// in a [`HandlerChain`], never by changing an existing one.
pub trait Classifier: Send + Sync {
    /// Short name used in trace output.
    fn name(&self) -> &'static str;

    /// Classify `fault`, which the caller has already normalized.
    fn classify(&self, fault: &Fault) -> HandlerResult;
}

// ---------------------------------------------------------------------------
// BusinessClassifier
// ---------------------------------------------------------------------------

/// Handles [`Fault::Business`] by turning it into one error-severity message
/// carrying the fault's key and parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusinessClassifier;

impl Classifier for BusinessClassifier {
    fn name(&self) -> &'static str {
        "business"
    }

    fn classify(&self, fault: &Fault) -> HandlerResult {
        let Fault::Business(business) = fault else {
            return HandlerResult::unhandled();
        };
        tracing::debug!(key = %business.key, "caught business fault");
        HandlerResult::handled(vec![ExceptionMessage::new(
            business.key.clone(),
            business.params.clone(),
        )])
    }
}

// ---------------------------------------------------------------------------
// HandlerChain
// ---------------------------------------------------------------------------

/// Ordered list of classifiers evaluated first-match-wins.
///
/// The chain is itself a [`Classifier`], so chains can nest.
#[derive(Clone, Default)]
pub struct HandlerChain {
    classifiers: Vec<Arc<dyn Classifier>>,
}

impl HandlerChain {
    /// Creates a chain evaluating `classifiers` in the given order.
    #[must_use]
    pub fn new(classifiers: Vec<Arc<dyn Classifier>>) -> Self {
        tracing::debug!(count = classifiers.len(), "handler chain initialized");
        Self { classifiers }
    }

    /// Chain holding the built-in [`BusinessClassifier`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(vec![Arc::new(BusinessClassifier)])
    }

    /// Adds a classifier evaluated after the existing ones.
    pub fn push(&mut self, classifier: Arc<dyn Classifier>) {
        self.classifiers.push(classifier);
    }

    /// Adds a classifier evaluated before the existing ones.
    pub fn prepend(&mut self, classifier: Arc<dyn Classifier>) {
        self.classifiers.insert(0, classifier);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Runs classifiers in order and returns the first handled result, or
    /// [`HandlerResult::unhandled`] when none matches.
    #[must_use]
    pub fn do_handle(&self, fault: &Fault) -> HandlerResult {
        for classifier in &self.classifiers {
            tracing::trace!(classifier = classifier.name(), "calling classifier");
            let result = classifier.classify(fault);
            if result.is_handled() {
                tracing::debug!(classifier = classifier.name(), "fault handled");
                return result;
            }
        }
        tracing::debug!("fault not handled");
        HandlerResult::unhandled()
    }
}

impl Classifier for HandlerChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn classify(&self, fault: &Fault) -> HandlerResult {
        self.do_handle(fault)
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.classifiers.iter().map(|c| c.name()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
