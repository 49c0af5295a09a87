//! The success/failure algebra every computation reports through.
//!
//! Outcomes are plain [`std::result::Result`] values. The free functions here
//! give the constructors and the predicate a name that reads well at call
//! sites building leaf computations:
//!
//! ```
//! use undertow::{fail, is_failure, ok};
//!
//! let good: Result<i32, String> = ok(1);
//! let bad: Result<i32, String> = fail("boom".to_string());
//!
//! assert!(!is_failure(&good));
//! assert!(is_failure(&bad));
//! ```

/// Wrap a value as a successful outcome.
#[inline]
pub fn ok<T, E>(value: T) -> Result<T, E> {
    Ok(value)
}

/// Wrap an error as a failed outcome.
#[inline]
pub fn fail<T, E>(error: E) -> Result<T, E> {
    Err(error)
}

/// Returns true if the outcome is a failure.
#[inline]
pub fn is_failure<T, E>(result: &Result<T, E>) -> bool {
    result.is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_is_not_failure() {
        let result: Result<_, String> = ok(42);
        assert_eq!(result, Ok(42));
        assert!(!is_failure(&result));
    }

    #[test]
    fn test_fail_is_failure() {
        let result: Result<i32, _> = fail("error");
        assert_eq!(result, Err("error"));
        assert!(is_failure(&result));
    }
}
