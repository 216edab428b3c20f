//! # Railflow
//!
//! A reusable engine for composing multi-step asynchronous operations
//! under a uniform Result-based error model.
//!
//! Railflow provides:
//!
//! - **Outcome carrier**: every operation resolves to a success value or a
//!   structured [`errors::FlowError`], never an unwind
//! - **Immutable pipelines**: pure accumulation of steps and policy, with
//!   branch-safe cloning and nothing running until `execute()`
//! - **Cooperative cancellation and timeouts**: checked at step
//!   boundaries, racing timers against operations, abandoning losers
//! - **Fan-out/fan-in**: concurrent thunk groups with fail-on-any or
//!   best-effort settled aggregation
//! - **Retry with backoff**: fresh pipeline per attempt, exponential
//!   delays with an optional jitter strategy
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use railflow::prelude::*;
//!
//! let result = Pipeline::new(5)
//!     .named_step("double", |v| async move { success(v * 2) })
//!     .named_step("increment", |v| async move { success(v + 1) })
//!     .execute()
//!     .await;
//!
//! assert_eq!(result, Ok(11));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod errors;
pub mod outcome;
pub mod parallel;
pub mod pipeline;
pub mod retry;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::errors::{ErrorKind, FlowError};
    pub use crate::outcome::{failure, success, Outcome};
    pub use crate::parallel::{
        parallel, parallel_named, parallel_settled, parallel_settled_named, thunk,
        SettledList, SettledMap, Thunk,
    };
    pub use crate::pipeline::{Pipeline, StepDefinition};
    pub use crate::retry::{retry_pipeline, JitterStrategy, RetryConfig};
}
