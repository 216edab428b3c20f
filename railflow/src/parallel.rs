//! Fan-out/fan-in runner for independent concurrent thunks.
//!
//! A fan-out group is an addressable collection of zero-argument thunks,
//! each returning an [`Outcome`]. [`parallel`] fails on the first failure
//! observed in completion order; [`parallel_settled`] never short-circuits
//! and returns the full success/failure partition. Both wait for every
//! thunk to settle before returning, so side effects of discarded winners
//! may already have completed. There is no rollback.
//!
//! Concurrency is cooperative interleaving on the current task; thunks
//! are not spawned onto worker threads.

use crate::errors::{panic_message, FlowError};
use crate::outcome::Outcome;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// A zero-argument unit of work producing an [`Outcome`].
pub type Thunk<T> = Box<dyn FnOnce() -> BoxFuture<'static, Outcome<T>> + Send>;

/// Erases a closure into a [`Thunk`] for use in a fan-out group.
pub fn thunk<T, F, Fut>(f: F) -> Thunk<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Outcome<T>> + Send + 'static,
{
    Box::new(move || f().boxed())
}

/// Partition of a positional fan-out group, index-ordered.
#[derive(Debug)]
pub struct SettledList<T> {
    /// Successful results with their input positions.
    pub successes: Vec<(usize, T)>,
    /// Failures with their input positions.
    pub failures: Vec<(usize, FlowError)>,
}

impl<T> SettledList<T> {
    /// Returns true if any thunk failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Partition of a named fan-out group, keyed like the input.
#[derive(Debug)]
pub struct SettledMap<T> {
    /// Successful results by key.
    pub successes: HashMap<String, T>,
    /// Failures by key.
    pub failures: HashMap<String, FlowError>,
}

impl<T> SettledMap<T> {
    /// Returns true if any thunk failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Runs a positional fan-out group, failing on any failure.
///
/// All thunks are launched concurrently and allowed to settle; the first
/// failure observed in completion order is returned. On success the
/// results preserve input order.
pub async fn parallel<T: Send>(thunks: Vec<Thunk<T>>) -> Outcome<Vec<T>> {
    let total = thunks.len();
    let keyed = thunks.into_iter().enumerate().collect();
    let settled = settle_all(keyed).await;

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut first_failure = None;
    for (index, outcome) in settled {
        match outcome {
            Ok(value) => slots[index] = Some(value),
            Err(error) => {
                if first_failure.is_none() {
                    first_failure = Some(error);
                }
            }
        }
    }

    match first_failure {
        Some(error) => Err(error),
        None => Ok(slots.into_iter().flatten().collect()),
    }
}

/// Runs a named fan-out group, failing on any failure.
pub async fn parallel_named<T: Send>(
    thunks: HashMap<String, Thunk<T>>,
) -> Outcome<HashMap<String, T>> {
    let keyed = thunks.into_iter().collect();
    let settled = settle_all(keyed).await;

    let mut results = HashMap::new();
    let mut first_failure = None;
    for (key, outcome) in settled {
        match outcome {
            Ok(value) => {
                results.insert(key, value);
            }
            Err(error) => {
                if first_failure.is_none() {
                    first_failure = Some(error);
                }
            }
        }
    }

    match first_failure {
        Some(error) => Err(error),
        None => Ok(results),
    }
}

/// Runs a positional fan-out group to completion, never short-circuiting.
pub async fn parallel_settled<T: Send>(thunks: Vec<Thunk<T>>) -> SettledList<T> {
    let keyed = thunks.into_iter().enumerate().collect();
    let mut settled = settle_all(keyed).await;
    settled.sort_by_key(|(index, _)| *index);

    let mut partition = SettledList {
        successes: Vec::new(),
        failures: Vec::new(),
    };
    for (index, outcome) in settled {
        match outcome {
            Ok(value) => partition.successes.push((index, value)),
            Err(error) => partition.failures.push((index, error)),
        }
    }
    partition
}

/// Runs a named fan-out group to completion, never short-circuiting.
pub async fn parallel_settled_named<T: Send>(thunks: HashMap<String, Thunk<T>>) -> SettledMap<T> {
    let keyed = thunks.into_iter().collect();
    let settled = settle_all(keyed).await;

    let mut partition = SettledMap {
        successes: HashMap::new(),
        failures: HashMap::new(),
    };
    for (key, outcome) in settled {
        match outcome {
            Ok(value) => {
                partition.successes.insert(key, value);
            }
            Err(error) => {
                partition.failures.insert(key, error);
            }
        }
    }
    partition
}

/// Launches every thunk concurrently and waits for all to settle,
/// yielding results in completion order.
///
/// A thunk that panics, synchronously or while awaited, settles as a
/// `ParallelExecution` failure instead of unwinding.
async fn settle_all<K, T>(thunks: Vec<(K, Thunk<T>)>) -> Vec<(K, Outcome<T>)>
where
    K: std::fmt::Display + Send,
    T: Send,
{
    let mut running = FuturesUnordered::new();
    for (key, thunk) in thunks {
        running.push(async move {
            let outcome = AssertUnwindSafe(async move { thunk().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(FlowError::parallel_execution(
                        &key.to_string(),
                        panic_message(payload.as_ref()),
                    ))
                });
            (key, outcome)
        });
    }

    let mut settled = Vec::with_capacity(running.len());
    while let Some(entry) = running.next().await {
        settled.push(entry);
    }
    settled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::outcome::{failure, success};
    use std::time::Duration;

    #[tokio::test]
    async fn test_parallel_preserves_input_order() {
        let result = parallel(vec![
            thunk(|| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                success(1)
            }),
            thunk(|| async { success(2) }),
            thunk(|| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                success(3)
            }),
        ])
        .await;

        assert_eq!(result, Ok(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_parallel_fails_on_any_failure() {
        let result = parallel(vec![
            thunk(|| async { success(1) }),
            thunk(|| async { failure(FlowError::pipeline("boom")) }),
        ])
        .await;

        assert_eq!(result.unwrap_err().message, "boom");
    }

    #[tokio::test]
    async fn test_parallel_empty_group() {
        let result = parallel(Vec::<Thunk<i32>>::new()).await;
        assert_eq!(result, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_parallel_panicking_thunk_is_caught() {
        let panicking: Thunk<i32> = Box::new(|| panic!("launch failed"));
        let result = parallel(vec![thunk(|| async { success(1) }), panicking]).await;

        let error = result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::ParallelExecution);
        assert_eq!(error.context.get("key"), Some(&serde_json::json!("1")));
        assert_eq!(error.root_cause().message, "launch failed");
    }

    #[tokio::test]
    async fn test_parallel_panic_after_await_is_caught() {
        let result = parallel(vec![
            thunk(|| async { success(1) }),
            thunk(|| async {
                tokio::task::yield_now().await;
                panic!("failed mid-flight")
            }),
        ])
        .await;

        let error = result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::ParallelExecution);
        assert_eq!(error.context.get("key"), Some(&serde_json::json!("1")));
        assert_eq!(error.root_cause().message, "failed mid-flight");
    }

    #[tokio::test]
    async fn test_parallel_named_collects_by_key() {
        let mut thunks = HashMap::new();
        thunks.insert("a".to_string(), thunk(|| async { success(1) }));
        thunks.insert("b".to_string(), thunk(|| async { success(2) }));

        let result = parallel_named(thunks).await.unwrap();

        assert_eq!(result.get("a"), Some(&1));
        assert_eq!(result.get("b"), Some(&2));
    }

    #[tokio::test]
    async fn test_parallel_settled_partitions_by_index() {
        let partition = parallel_settled(vec![
            thunk(|| async { success(10) }),
            thunk(|| async { failure(FlowError::pipeline("bad")) }),
            thunk(|| async { success(30) }),
        ])
        .await;

        assert_eq!(partition.successes, vec![(0, 10), (2, 30)]);
        assert_eq!(partition.failures.len(), 1);
        assert_eq!(partition.failures[0].0, 1);
        assert!(partition.has_failures());
    }

    #[tokio::test]
    async fn test_parallel_settled_named_partitions_by_key() {
        let mut thunks = HashMap::new();
        thunks.insert("a".to_string(), thunk(|| async { success(1) }));
        thunks.insert(
            "b".to_string(),
            thunk(|| async { failure(FlowError::pipeline("bad")) }),
        );

        let partition = parallel_settled_named(thunks).await;

        assert_eq!(partition.successes.get("a"), Some(&1));
        assert!(partition.failures.contains_key("b"));
        assert!(partition.has_failures());
    }

    #[tokio::test]
    async fn test_parallel_settled_never_short_circuits() {
        let partition = parallel_settled(vec![
            thunk(|| async { failure::<i32>(FlowError::pipeline("first")) }),
            thunk(|| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                success(2)
            }),
        ])
        .await;

        assert_eq!(partition.successes, vec![(1, 2)]);
        assert_eq!(partition.failures.len(), 1);
    }
}
