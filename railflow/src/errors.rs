//! Error types for the railflow engine.
//!
//! Every failure produced by the engine is a [`FlowError`]: a structured,
//! cloneable record with a kind, a human-readable message, an optional
//! chained cause, and a context map carrying whatever a caller needs to
//! render an actionable message (step name, attempt number, timeout
//! duration) without parsing strings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Classification of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed configuration (duplicate step names, zero timeout,
    /// `max_attempts` below one).
    Validation,
    /// A step operation panicked instead of returning an outcome.
    StepExecution,
    /// A step exceeded its wall-clock bound.
    Timeout,
    /// Cancellation was observed at a step boundary.
    Cancelled,
    /// Internal executor bookkeeping fault. Should be rare.
    Pipeline,
    /// The fan-out launch machinery or a thunk panicked.
    ParallelExecution,
    /// Every retry attempt failed; the last error is chained as the cause.
    RetryExhausted,
}

impl ErrorKind {
    /// Returns the stable string code for this kind.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::StepExecution => "STEP_EXECUTION",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Pipeline => "PIPELINE",
            Self::ParallelExecution => "PARALLEL_EXECUTION",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A structured engine failure.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct FlowError {
    /// Failure classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Chained cause, if this error wraps another.
    #[source]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<FlowError>>,
    /// Structured context key-value pairs.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl FlowError {
    /// Creates a new error with the given kind and message.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            context: HashMap::new(),
        }
    }

    /// Chains another error as the cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Self) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Creates a validation error for malformed configuration.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Creates an internal pipeline bookkeeping error.
    #[must_use]
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Pipeline, message)
    }

    /// Creates a step execution error for an operation that panicked.
    ///
    /// The panic payload is chained as the cause.
    #[must_use]
    pub fn step_execution(step: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(
            ErrorKind::StepExecution,
            format!("Step '{step}' panicked: {detail}"),
        )
        .with_cause(Self::new(ErrorKind::StepExecution, detail))
        .with_context("step", serde_json::json!(step))
    }

    /// Creates a timeout error for a step that exceeded its bound.
    #[must_use]
    pub fn timeout(step: &str, limit: Duration) -> Self {
        let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        Self::new(
            ErrorKind::Timeout,
            format!("Step '{step}' timed out after {millis}ms"),
        )
        .with_context("step", serde_json::json!(step))
        .with_context("timeout_ms", serde_json::json!(millis))
    }

    /// Creates a cancellation error naming the step that was about to run.
    #[must_use]
    pub fn cancelled(step: &str, index: usize, reason: Option<String>) -> Self {
        let message = match &reason {
            Some(reason) => format!("Pipeline cancelled before step '{step}': {reason}"),
            None => format!("Pipeline cancelled before step '{step}'"),
        };
        let mut error = Self::new(ErrorKind::Cancelled, message)
            .with_context("step", serde_json::json!(step))
            .with_context("step_index", serde_json::json!(index));
        if let Some(reason) = reason {
            error = error.with_context("reason", serde_json::json!(reason));
        }
        error
    }

    /// Creates a parallel execution error for a thunk that panicked.
    #[must_use]
    pub fn parallel_execution(key: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(
            ErrorKind::ParallelExecution,
            format!("Parallel thunk '{key}' panicked: {detail}"),
        )
        .with_cause(Self::new(ErrorKind::ParallelExecution, detail))
        .with_context("key", serde_json::json!(key))
    }

    /// Creates a retry exhaustion error wrapping the last attempt's failure.
    #[must_use]
    pub fn retry_exhausted(attempts: u32, last: Self) -> Self {
        Self::new(
            ErrorKind::RetryExhausted,
            format!("All {attempts} attempts failed: {}", last.message),
        )
        .with_context("attempts", serde_json::json!(attempts))
        .with_cause(last)
    }

    /// Walks the cause chain to the innermost error.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        let mut current = self;
        while let Some(cause) = &current.cause {
            current = cause;
        }
        current
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
