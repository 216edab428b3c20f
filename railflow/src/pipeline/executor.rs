//! Sequential pipeline execution.
//!
//! The executor drives a built configuration through a cooperative state
//! machine: resolve the seed, then run each step in declared order. Per
//! step it checks cancellation, reports progress, evaluates the gate
//! condition, runs the operation (racing it against a timer when a
//! timeout is configured), and applies the pipeline-scope error handler
//! on failure. The first unrecovered failure terminates the run; the
//! executor itself never panics to its caller.

use super::builder::Pipeline;
use super::step::{Seed, StepDefinition};
use crate::errors::{panic_message, FlowError};
use crate::outcome::Outcome;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use uuid::Uuid;

impl<T> Pipeline<T>
where
    T: Clone + Send + 'static,
{
    /// Executes the pipeline to a single terminal outcome.
    ///
    /// Safe to call more than once on the same configuration: the
    /// configuration is immutable and all run state is local. A pending
    /// seed resolves on the first call and replays its value afterwards.
    pub async fn execute(&self) -> Outcome<T> {
        let run_id = Uuid::new_v4();
        match AssertUnwindSafe(self.run(run_id)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(FlowError::pipeline(format!(
                "Executor panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }

    async fn run(&self, run_id: Uuid) -> Outcome<T> {
        self.validate()?;

        let total = self.steps.len();
        let mut value = match &self.seed {
            Seed::Value(value) => value.clone(),
            Seed::Resolved(outcome) => outcome.clone()?,
            Seed::Pending(shared) => shared.clone().await?,
        };

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(token) = &self.cancellation {
                if token.is_cancelled() {
                    tracing::debug!(%run_id, step = %step.name, index, "pipeline.cancelled");
                    return Err(FlowError::cancelled(&step.name, index, token.reason()));
                }
            }

            if let Some(progress) = &self.progress {
                progress(&step.name, index, total);
            }

            if let Some(condition) = &step.condition {
                if !condition(value.clone()).await {
                    tracing::debug!(%run_id, step = %step.name, index, "step.skipped");
                    continue;
                }
            }

            let started = Instant::now();
            tracing::debug!(%run_id, step = %step.name, index, "step.started");

            match run_step(step, value.clone()).await {
                Ok(next) => {
                    tracing::debug!(
                        %run_id,
                        step = %step.name,
                        index,
                        duration_ms = duration_ms(started),
                        "step.completed"
                    );
                    value = next;
                }
                Err(error) => {
                    tracing::debug!(
                        %run_id,
                        step = %step.name,
                        index,
                        error = %error,
                        duration_ms = duration_ms(started),
                        "step.failed"
                    );
                    match &self.error_handler {
                        Some(handler) => match handler(error, step.name.clone()).await {
                            Ok(recovered) => {
                                tracing::debug!(%run_id, step = %step.name, index, "step.recovered");
                                value = recovered;
                            }
                            Err(unrecovered) => return Err(unrecovered),
                        },
                        None => return Err(error),
                    }
                }
            }
        }

        if let Some(progress) = &self.progress {
            progress("Complete", total, total);
        }
        tracing::debug!(%run_id, steps = total, "pipeline.completed");
        Ok(value)
    }

    /// Rejects malformed configuration before any step runs.
    fn validate(&self) -> Result<(), FlowError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(FlowError::validation(format!(
                    "Duplicate step name '{}'",
                    step.name
                ))
                .with_context("step", serde_json::json!(step.name)));
            }
            if let Some(timeout) = step.timeout {
                if timeout.is_zero() {
                    return Err(FlowError::validation(format!(
                        "Step '{}' has a zero timeout",
                        step.name
                    ))
                    .with_context("step", serde_json::json!(step.name)));
                }
            }
        }
        Ok(())
    }
}

/// Runs one step operation, racing it against its timeout when one is
/// configured and converting panics into step execution failures.
///
/// On timeout the operation is abandoned, never interrupted.
async fn run_step<T>(step: &StepDefinition<T>, value: T) -> Outcome<T>
where
    T: Send + 'static,
{
    let guarded = AssertUnwindSafe((step.operation)(value)).catch_unwind();

    let settled = match step.timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(settled) => settled,
            Err(_) => return Err(FlowError::timeout(&step.name, limit)),
        },
        None => guarded.await,
    };

    match settled {
        Ok(outcome) => outcome,
        Err(payload) => Err(FlowError::step_execution(
            &step.name,
            panic_message(payload.as_ref()),
        )),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::outcome::{failure, success};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_zero_step_pipeline_returns_seed() {
        let result = Pipeline::new(5_i32).execute().await;
        assert_eq!(result, Ok(5));
    }

    #[tokio::test]
    async fn test_steps_thread_the_value() {
        let result = Pipeline::new(5_i64)
            .step(|v| async move { success(v * 2) })
            .step(|v| async move { success(v + 1) })
            .execute()
            .await;

        assert_eq!(result, Ok(11));
    }

    #[tokio::test]
    async fn test_failed_resolved_seed_short_circuits() {
        let step_calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let progress_calls = Arc::new(AtomicUsize::new(0));
        let step_probe = step_calls.clone();
        let handler_probe = handler_calls.clone();
        let progress_probe = progress_calls.clone();

        let result = Pipeline::from_outcome(failure::<i32>(FlowError::pipeline("bad seed")))
            .step(move |v| {
                step_probe.fetch_add(1, Ordering::SeqCst);
                async move { success(v) }
            })
            .on_error(move |error, _| {
                handler_probe.fetch_add(1, Ordering::SeqCst);
                async move { failure(error) }
            })
            .on_progress(move |_, _, _| {
                progress_probe.fetch_add(1, Ordering::SeqCst);
            })
            .execute()
            .await;

        assert_eq!(result.unwrap_err().message, "bad seed");
        assert_eq!(step_calls.load(Ordering::SeqCst), 0);
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
        assert_eq!(progress_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_pending_seed_short_circuits() {
        let step_calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let progress_calls = Arc::new(AtomicUsize::new(0));
        let step_probe = step_calls.clone();
        let handler_probe = handler_calls.clone();
        let progress_probe = progress_calls.clone();

        let result = Pipeline::from_future(async { failure::<i32>(FlowError::pipeline("seed fetch failed")) })
            .step(move |v| {
                step_probe.fetch_add(1, Ordering::SeqCst);
                async move { success(v) }
            })
            .on_error(move |error, _| {
                handler_probe.fetch_add(1, Ordering::SeqCst);
                async move { failure(error) }
            })
            .on_progress(move |_, _, _| {
                progress_probe.fetch_add(1, Ordering::SeqCst);
            })
            .execute()
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Pipeline);
        assert_eq!(error.message, "seed fetch failed");
        assert_eq!(step_calls.load(Ordering::SeqCst), 0);
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
        assert_eq!(progress_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pending_seed_resolves_before_steps() {
        let result = Pipeline::from_future(async { success(20_i32) })
            .map(|v| v + 1)
            .execute()
            .await;

        assert_eq!(result, Ok(21));
    }

    #[tokio::test]
    async fn test_failure_stops_later_steps() {
        let later = Arc::new(AtomicUsize::new(0));
        let later_in_step = later.clone();

        let result = Pipeline::new(1_i32)
            .named_step("boom", |_| async { failure(FlowError::pipeline("boom")) })
            .step(move |v| {
                later_in_step.fetch_add(1, Ordering::SeqCst);
                async move { success(v) }
            })
            .execute()
            .await;

        assert!(result.is_err());
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_operation_becomes_step_execution_failure() {
        let result = Pipeline::new(1_i32)
            .named_step("explode", |_| async { panic!("kaboom") })
            .execute()
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::StepExecution);
        assert!(error.message.contains("explode"));
        assert_eq!(error.root_cause().message, "kaboom");
    }

    #[tokio::test]
    async fn test_timeout_produces_timeout_failure_and_skips_rest() {
        let later = Arc::new(AtomicUsize::new(0));
        let later_in_step = later.clone();

        let started = Instant::now();
        let result = Pipeline::new(1_i32)
            .named_step_with_timeout("slow", Duration::from_millis(50), |v| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                success(v)
            })
            .step(move |v| {
                later_in_step.fetch_add(1, Ordering::SeqCst);
                async move { success(v) }
            })
            .execute()
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Timeout);
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(error.context.get("timeout_ms"), Some(&serde_json::json!(50)));
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fast_operation_beats_its_timeout() {
        let result = Pipeline::new(2_i32)
            .named_step_with_timeout("quick", Duration::from_secs(5), |v| async move {
                success(v * 3)
            })
            .execute()
            .await;

        let value = assert_ok!(result);
        assert_eq!(value, 6);
    }

    #[tokio::test]
    async fn test_duplicate_step_names_rejected() {
        let result = Pipeline::new(1_i32)
            .named_step("dup", |v| async move { success(v) })
            .named_step("dup", |v| async move { success(v) })
            .execute()
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Validation);
        assert!(error.message.contains("dup"));
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected_before_running() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_step = calls.clone();

        let result = Pipeline::new(1_i32)
            .named_step_with_timeout("instant", Duration::ZERO, move |v| {
                calls_in_step.fetch_add(1, Ordering::SeqCst);
                async move { success(v) }
            })
            .execute()
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_re_execution_is_replay_safe() {
        let pipeline = Pipeline::from_future(async { success(10_i32) }).map(|v| v * 2);

        assert_eq!(pipeline.execute().await, Ok(20));
        assert_eq!(pipeline.execute().await, Ok(20));
    }
}
