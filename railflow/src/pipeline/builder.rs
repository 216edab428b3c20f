//! Immutable fluent pipeline builder.
//!
//! A [`Pipeline`] is a pure accumulation of step definitions and
//! cross-cutting policy. Nothing runs until [`Pipeline::execute`] is
//! called. Every builder method takes `self` by value and returns a new
//! configuration; cloning the builder branches a common prefix into
//! independent variants that never cross-mutate.

use super::step::{ErrorHandler, ProgressCallback, Seed, StepCondition, StepDefinition, StepOperation};
use crate::cancellation::CancellationToken;
use crate::errors::FlowError;
use crate::outcome::Outcome;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// An ordered sequence of steps plus pipeline-scope policy, executed as
/// one unit.
pub struct Pipeline<T> {
    pub(crate) seed: Seed<T>,
    pub(crate) steps: Vec<StepDefinition<T>>,
    pub(crate) error_handler: Option<ErrorHandler<T>>,
    pub(crate) progress: Option<ProgressCallback>,
    pub(crate) cancellation: Option<Arc<CancellationToken>>,
    unnamed_steps: usize,
}

impl<T> Pipeline<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a zero-step pipeline from a bare value.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::with_seed(Seed::Value(value))
    }

    /// Creates a zero-step pipeline from an already-resolved outcome.
    ///
    /// A failure seed short-circuits `execute()` without running any step.
    #[must_use]
    pub fn from_outcome(outcome: Outcome<T>) -> Self {
        Self::with_seed(Seed::Resolved(outcome))
    }

    /// Creates a zero-step pipeline from a pending outcome.
    ///
    /// The future is resolved once; re-executions observe the same value.
    #[must_use]
    pub fn from_future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self::with_seed(Seed::Pending(future.boxed().shared()))
    }

    fn with_seed(seed: Seed<T>) -> Self {
        Self {
            seed,
            steps: Vec::new(),
            error_handler: None,
            progress: None,
            cancellation: None,
            unnamed_steps: 0,
        }
    }

    /// Appends a step with a default positional name.
    #[must_use]
    pub fn step<F, Fut>(self, operation: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let (builder, name) = self.next_default_name();
        builder.named_step(name, operation)
    }

    /// Appends a named step.
    #[must_use]
    pub fn named_step<F, Fut>(mut self, name: impl Into<String>, operation: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        self.steps
            .push(StepDefinition::new(name.into(), wrap_operation(operation)));
        self
    }

    /// Appends a conditionally-gated step with a default positional name.
    ///
    /// A false condition skips the operation and passes the current value
    /// through unchanged. A skip is not a failure and does not invoke the
    /// error handler.
    #[must_use]
    pub fn step_if<C, F, Fut>(self, condition: C, operation: F) -> Self
    where
        C: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let (builder, name) = self.next_default_name();
        builder.named_step_if(name, condition, operation)
    }

    /// Appends a named conditionally-gated step.
    #[must_use]
    pub fn named_step_if<C, F, Fut>(
        mut self,
        name: impl Into<String>,
        condition: C,
        operation: F,
    ) -> Self
    where
        C: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let mut step = StepDefinition::new(name.into(), wrap_operation(operation));
        step.condition = Some(wrap_sync_condition(condition));
        self.steps.push(step);
        self
    }

    /// Appends a step gated by an awaited condition, with a default name.
    #[must_use]
    pub fn step_if_async<C, CFut, F, Fut>(self, condition: C, operation: F) -> Self
    where
        C: Fn(T) -> CFut + Send + Sync + 'static,
        CFut: Future<Output = bool> + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let (builder, name) = self.next_default_name();
        builder.named_step_if_async(name, condition, operation)
    }

    /// Appends a named step gated by an awaited condition.
    #[must_use]
    pub fn named_step_if_async<C, CFut, F, Fut>(
        mut self,
        name: impl Into<String>,
        condition: C,
        operation: F,
    ) -> Self
    where
        C: Fn(T) -> CFut + Send + Sync + 'static,
        CFut: Future<Output = bool> + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let mut step = StepDefinition::new(name.into(), wrap_operation(operation));
        step.condition = Some(wrap_async_condition(condition));
        self.steps.push(step);
        self
    }

    /// Appends a step with an enforced wall-clock bound and a default name.
    ///
    /// A timed-out operation is abandoned, not interrupted: it may keep
    /// running in the background, so operations must be safe to abandon.
    #[must_use]
    pub fn step_with_timeout<F, Fut>(self, timeout: Duration, operation: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let (builder, name) = self.next_default_name();
        builder.named_step_with_timeout(name, timeout, operation)
    }

    /// Appends a named step with an enforced wall-clock bound.
    #[must_use]
    pub fn named_step_with_timeout<F, Fut>(
        mut self,
        name: impl Into<String>,
        timeout: Duration,
        operation: F,
    ) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        let mut step = StepDefinition::new(name.into(), wrap_operation(operation));
        step.timeout = Some(timeout);
        self.steps.push(step);
        self
    }

    /// Appends an always-succeeding pure transform with a default name.
    #[must_use]
    pub fn map<F>(self, transform: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        let (builder, name) = self.next_default_name();
        builder.named_map(name, transform)
    }

    /// Appends a named always-succeeding pure transform.
    #[must_use]
    pub fn named_map<F>(self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.named_step(name, move |value| std::future::ready(Ok(transform(value))))
    }

    /// Sets the pipeline-scope error handler. Last write wins.
    ///
    /// The handler is called with the failure and the name of the step
    /// that produced it. A success outcome resumes the pipeline at the
    /// next step with the handler's value; a failure terminates the run.
    #[must_use]
    pub fn on_error<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(FlowError, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        self.error_handler = Some(Arc::new(move |error, step| handler(error, step).boxed()));
        self
    }

    /// Sets the progress callback. Last write wins.
    ///
    /// Invoked with `(step name, completed, total)` before each step,
    /// including skipped ones, and once with `("Complete", total, total)`
    /// after a successful run.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Attaches a cancellation token. Last write wins.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns the number of steps accumulated so far.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the resolved step names in declaration order.
    ///
    /// Useful for diagnostics and for asserting on default name
    /// assignment without executing the pipeline.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(StepDefinition::name).collect()
    }

    fn next_default_name(mut self) -> (Self, String) {
        self.unnamed_steps += 1;
        let name = format!("Step {}", self.unnamed_steps);
        (self, name)
    }
}

impl<T: Clone> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed.clone(),
            steps: self.steps.clone(),
            error_handler: self.error_handler.clone(),
            progress: self.progress.clone(),
            cancellation: self.cancellation.clone(),
            unnamed_steps: self.unnamed_steps,
        }
    }
}

impl<T> std::fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("seed", &self.seed)
            .field("steps", &self.steps)
            .field("has_error_handler", &self.error_handler.is_some())
            .field("has_progress", &self.progress.is_some())
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

fn wrap_operation<T, F, Fut>(operation: F) -> StepOperation<T>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome<T>> + Send + 'static,
{
    Arc::new(move |value| operation(value).boxed())
}

fn wrap_sync_condition<T, C>(condition: C) -> StepCondition<T>
where
    C: Fn(&T) -> bool + Send + Sync + 'static,
{
    Arc::new(move |value| {
        let pass = condition(&value);
        std::future::ready(pass).boxed()
    })
}

fn wrap_async_condition<T, C, CFut>(condition: C) -> StepCondition<T>
where
    C: Fn(T) -> CFut + Send + Sync + 'static,
    CFut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move |value| condition(value).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::success;

    #[test]
    fn test_builder_starts_empty() {
        let pipeline = Pipeline::new(1_i32);
        assert_eq!(pipeline.step_count(), 0);
    }

    #[test]
    fn test_default_names_count_unnamed_steps_only() {
        let pipeline = Pipeline::new(1_i32)
            .step(|v| async move { success(v) })
            .named_step("fetch", |v| async move { success(v) })
            .step(|v| async move { success(v) });

        assert_eq!(pipeline.step_names(), vec!["Step 1", "fetch", "Step 2"]);
    }

    #[test]
    fn test_branching_does_not_cross_mutate() {
        let prefix = Pipeline::new(1_i32).step(|v| async move { success(v) });

        let left = prefix.clone().named_step("left", |v| async move { success(v) });
        let right = prefix.clone().step(|v| async move { success(v) });

        assert_eq!(prefix.step_count(), 1);
        assert_eq!(left.step_names(), vec!["Step 1", "left"]);
        assert_eq!(right.step_names(), vec!["Step 1", "Step 2"]);
    }

    #[test]
    fn test_branches_number_unnamed_steps_independently() {
        let prefix = Pipeline::new(1_i32).step(|v| async move { success(v) });

        let a = prefix.clone().step(|v| async move { success(v) });
        let b = prefix.step(|v| async move { success(v) });

        assert_eq!(a.step_names(), vec!["Step 1", "Step 2"]);
        assert_eq!(b.step_names(), vec!["Step 1", "Step 2"]);
    }

    #[test]
    fn test_timeout_is_recorded_on_step() {
        let pipeline = Pipeline::new(1_i32).named_step_with_timeout(
            "slow",
            Duration::from_millis(50),
            |v| async move { success(v) },
        );

        assert_eq!(pipeline.steps[0].timeout(), Some(Duration::from_millis(50)));
    }
}
