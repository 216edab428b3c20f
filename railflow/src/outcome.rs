//! The Result carrier threaded through every pipeline.
//!
//! [`Outcome`] is a plain `std::result::Result` specialized to
//! [`FlowError`]. Using the standard type keeps the wrong-branch contract
//! airtight: `unwrap` on a failure (or `unwrap_err` on a success) panics
//! deterministically, and exhaustive matching is enforced by the compiler.

use crate::errors::FlowError;

/// A success carrying a value, or a failure carrying a [`FlowError`].
pub type Outcome<T> = Result<T, FlowError>;

/// Constructs a success outcome.
#[must_use]
pub fn success<T>(value: T) -> Outcome<T> {
    Ok(value)
}

/// Constructs a failure outcome.
#[must_use]
pub fn failure<T>(error: FlowError) -> Outcome<T> {
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_success_and_failure_construct_branches() {
        let ok: Outcome<i32> = success(7);
        let err: Outcome<i32> = failure(FlowError::pipeline("broken"));

        assert_eq!(ok, Ok(7));
        assert!(err.is_err());
        assert_eq!(err.unwrap_err().kind, ErrorKind::Pipeline);
    }

    #[test]
    #[should_panic(expected = "called `Result::unwrap()` on an `Err` value")]
    fn test_unwrapping_the_wrong_branch_panics() {
        let err: Outcome<i32> = failure(FlowError::pipeline("broken"));
        let _ = err.unwrap();
    }
}
