//! Adapters between "any error" failures and typed, recoverable results.
//!
//! `std::result::Result` already is the two-variant container: `unwrap`
//! turns an `Err` back into a panic while `unwrap_or` and `unwrap_or_else`
//! recover inline. What this module adds is the split between failures a
//! caller expects (captured as a typed `Err`) and everything else (forwarded
//! untouched on an outer channel so `?` surfaces it).
//!
//! ```rust
//! use rowkeep_core::result::{returns_result, BoxError};
//!
//! #[derive(Debug, PartialEq, thiserror::Error)]
//! #[error("cannot divide by zero")]
//! struct DivideByZero;
//!
//! fn divide(x: f64, y: f64) -> Result<f64, BoxError> {
//!     if y == 0.0 {
//!         return Err(DivideByZero.into());
//!     }
//!     Ok(x / y)
//! }
//!
//! let ok = returns_result::<_, DivideByZero>(|| divide(4.0, 2.0)).unwrap();
//! assert_eq!(ok, Ok(2.0));
//!
//! let err = returns_result::<_, DivideByZero>(|| divide(4.0, 0.0)).unwrap();
//! assert_eq!(err, Err(DivideByZero));
//! ```

use std::error::Error;

/// The "any error" kind.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Runs `op`, capturing failures of kind `E` as the inner `Err`.
///
/// Failures of any other kind are returned on the outer `Err` unchanged.
///
/// # Errors
///
/// Returns the original error when `op` fails with a kind other than `E`.
pub fn returns_result<T, E>(
    op: impl FnOnce() -> Result<T, BoxError>,
) -> Result<Result<T, E>, BoxError>
where
    E: Error + Send + Sync + 'static,
{
    op().capture::<E>()
}

/// Runs `op`, capturing every failure as the inner `Err`.
pub fn returns_any_result<T>(op: impl FnOnce() -> Result<T, BoxError>) -> Result<T, BoxError> {
    op()
}

/// Extension methods for results carrying a [`BoxError`].
pub trait ResultExt<T> {
    /// Splits the failure into a captured `E` or a forwarded error.
    ///
    /// # Errors
    ///
    /// Returns the original error when it is not of kind `E`.
    fn capture<E>(self) -> Result<Result<T, E>, BoxError>
    where
        E: Error + Send + Sync + 'static;
}

impl<T> ResultExt<T> for Result<T, BoxError> {
    fn capture<E>(self) -> Result<Result<T, E>, BoxError>
    where
        E: Error + Send + Sync + 'static,
    {
        match self {
            Ok(value) => Ok(Ok(value)),
            Err(error) => match error.downcast::<E>() {
                Ok(expected) => Ok(Err(*expected)),
                Err(other) => Err(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RowError;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("{0}")]
    struct ValueError(String);

    fn divide_checked(x: f64, y: f64) -> Result<f64, BoxError> {
        if y == 0.0 {
            return Err(ValueError(String::from("Cannot divide by zero")).into());
        }
        Ok(x / y)
    }

    fn parse_then_divide(x: &str, y: f64) -> Result<f64, BoxError> {
        let x: f64 = x.parse()?;
        divide_checked(x, y)
    }

    #[test]
    fn test_captures_expected_kind() {
        assert_eq!(
            returns_result::<_, ValueError>(|| divide_checked(4.0, 2.0)).unwrap(),
            Ok(2.0)
        );
        assert_eq!(
            returns_result::<_, ValueError>(|| divide_checked(4.0, 0.0)).unwrap(),
            Err(ValueError(String::from("Cannot divide by zero")))
        );
    }

    #[test]
    fn test_forwards_other_kinds() {
        let forwarded = returns_result::<_, ValueError>(|| parse_then_divide("four", 2.0));
        let error = forwarded.unwrap_err();
        assert!(error.downcast_ref::<std::num::ParseFloatError>().is_some());
    }

    #[test]
    fn test_any_kind_captures_everything() {
        let result = returns_any_result(|| parse_then_divide("four", 2.0));
        assert!(result.is_err());
        assert_eq!(returns_any_result(|| parse_then_divide("4", 2.0)).unwrap(), 2.0);
    }

    #[test]
    fn test_err_equality_by_arguments() {
        let a: Result<i64, RowError> = Err(RowError::MissingField(String::from("id")));
        let b: Result<i64, RowError> = Err(RowError::MissingField(String::from("id")));
        let c: Result<i64, RowError> = Err(RowError::MissingField(String::from("name")));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_combinators() {
        let err: Result<i64, RowError> = Err(RowError::MissingField(String::from("id")));
        assert_eq!(err.clone().unwrap_or(7), 7);
        assert_eq!(
            err.unwrap_or_else(|e| i64::try_from(e.column().len()).unwrap_or(0)),
            2
        );
        let ok: Result<i64, RowError> = Ok(3);
        assert_eq!(ok.clone().unwrap_or(7), 3);
        assert_eq!(ok.unwrap(), 3);
    }

    #[test]
    #[should_panic(expected = "MissingField")]
    fn test_unwrap_err_panics() {
        let err: Result<i64, RowError> = Err(RowError::MissingField(String::from("id")));
        err.unwrap();
    }
}
