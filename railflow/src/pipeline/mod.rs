//! Pipeline building and execution.
//!
//! This module provides:
//! - The immutable fluent [`Pipeline`] builder
//! - Step definitions with conditions and timeouts
//! - The sequential executor

mod builder;
mod executor;
mod step;


pub use builder::Pipeline;
pub use step::StepDefinition;
