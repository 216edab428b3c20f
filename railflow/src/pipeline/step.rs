//! Step definitions and the tri-shaped initial value.

use crate::errors::FlowError;
use crate::outcome::Outcome;
use futures::future::{BoxFuture, Shared};
use std::sync::Arc;
use std::time::Duration;

/// Boxed async operation: consumes the current value, produces an outcome.
pub(crate) type StepOperation<T> =
    Arc<dyn Fn(T) -> BoxFuture<'static, Outcome<T>> + Send + Sync>;

/// Boxed async condition gating a step.
pub(crate) type StepCondition<T> =
    Arc<dyn Fn(T) -> BoxFuture<'static, bool> + Send + Sync>;

/// Boxed pipeline-scope error handler, called with the failure and the
/// name of the step that produced it.
pub(crate) type ErrorHandler<T> =
    Arc<dyn Fn(FlowError, String) -> BoxFuture<'static, Outcome<T>> + Send + Sync>;

/// Progress callback: `(step name, completed, total)`.
pub(crate) type ProgressCallback = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;

/// One named unit of work in a pipeline.
pub struct StepDefinition<T> {
    pub(crate) name: String,
    pub(crate) operation: StepOperation<T>,
    pub(crate) condition: Option<StepCondition<T>>,
    pub(crate) timeout: Option<Duration>,
}

impl<T> StepDefinition<T> {
    pub(crate) fn new(name: String, operation: StepOperation<T>) -> Self {
        Self {
            name,
            operation,
            condition: None,
            timeout: None,
        }
    }

    /// Returns the step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configured timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl<T> Clone for StepDefinition<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            operation: self.operation.clone(),
            condition: self.condition.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T> std::fmt::Debug for StepDefinition<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("conditional", &self.condition.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// The initial value of a pipeline: a bare value, an already-resolved
/// outcome, or a pending outcome.
///
/// The pending shape is wrapped in [`Shared`] so the configuration stays
/// cloneable and a second execution observes the same resolved value
/// instead of re-awaiting spent state.
pub(crate) enum Seed<T> {
    Value(T),
    Resolved(Outcome<T>),
    Pending(Shared<BoxFuture<'static, Outcome<T>>>),
}

impl<T: Clone> Clone for Seed<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Resolved(outcome) => Self::Resolved(outcome.clone()),
            Self::Pending(shared) => Self::Pending(shared.clone()),
        }
    }
}

impl<T> std::fmt::Debug for Seed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Seed::Value"),
            Self::Resolved(outcome) => match outcome {
                Ok(_) => f.write_str("Seed::Resolved(success)"),
                Err(_) => f.write_str("Seed::Resolved(failure)"),
            },
            Self::Pending(_) => f.write_str("Seed::Pending"),
        }
    }
}
