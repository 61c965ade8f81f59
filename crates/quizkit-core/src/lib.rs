//! quizkit-core — Core data model, session state machine, and error handling.
//!
//! This crate defines the types the whole quizkit client builds on, the
//! stateless token checks, the error taxonomy and classifier, and the
//! `SessionEngine` that drives a practice or exam attempt.

pub mod classify;
pub mod clock;
pub mod error;
pub mod mock;
pub mod model;
pub mod session;
pub mod statistics;
pub mod token;
pub mod traits;

pub use classify::{ErrorClassifier, ErrorInfo, ErrorLevel, ErrorLog, ErrorType, RawFailure};
pub use error::{QuizError, Result};
pub use session::SessionEngine;
