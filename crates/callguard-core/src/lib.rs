//! Core infrastructure for callguard.
//!
//! This crate provides the vocabulary shared by every callguard component:
//! - Call descriptors and the raw outcome of a single attempt
//! - The error classifier that turns a raw outcome into a retry decision
//! - Event system for observability
//! - Configuration errors

pub mod call;
pub mod classifier;
pub mod error;
pub mod events;
pub mod outcome;

pub use call::{CallDescriptor, Method, ParseMethodError};
pub use classifier::{DefaultClassifier, ErrorClassifier, FnClassifier};
pub use error::ConfigError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use outcome::{Classification, FailureReason, RawOutcome, TransportErrorKind};
