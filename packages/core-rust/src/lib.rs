//! `callguard` core: fault taxonomy, normalization, and the classifier chain.

pub mod classify;
pub mod fault;
pub mod message;
pub mod normalize;

pub use classify::{BusinessClassifier, Classifier, HandlerChain};
pub use fault::{BusinessFault, Fault, FaultKind, WrapperKind};
pub use message::{ExceptionMessage, HandlerResult, Severity};
pub use normalize::normalize;
