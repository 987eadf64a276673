//! statistical_tests::validation — shared input guards for test statistics.
//!
//! Purpose
//! -------
//! Centralize basic input validation for residual diagnostics so that
//! length, finiteness and lag-bound checks happen once, before any
//! autocorrelation is computed.
//!
//! Invariants & assumptions
//! ------------------------
//! - Input series must have length at least 2.
//! - All values must be finite.
//! - The lag bound must satisfy `1 ≤ lags < n`.

use crate::statistical_tests::errors::{LBError, LBResult};

/// Validate basic input constraints for portmanteau tests.
///
/// Errors
/// ------
/// - `LBError::InsufficientData` when `data.len() < 2`.
/// - `LBError::InvalidData(value)` for the first non-finite entry.
/// - `LBError::InvalidLags(lags)` when `lags == 0` or `lags >= n`.
pub fn validate_input(data: &[f64], lags: usize) -> LBResult<()> {
    if data.len() < 2 {
        return Err(LBError::InsufficientData);
    }
    if let Some(&bad) = data.iter().find(|v| !v.is_finite()) {
        return Err(LBError::InvalidData(bad));
    }
    if lags == 0 || lags >= data.len() {
        return Err(LBError::InvalidLags(lags));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover every error branch of `validate_input` and the
    // success path.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Each violated precondition maps to its own variant.
    //
    // Given
    // -----
    // - A one-point series, a series with NaN, lag bounds 0 and n.
    //
    // Expect
    // ------
    // - The matching `LBError` variant, then `Ok(())` for valid input.
    fn validate_input_covers_all_branches() {
        assert_eq!(validate_input(&[1.0], 1), Err(LBError::InsufficientData));
        assert!(matches!(validate_input(&[1.0, f64::NAN, 2.0], 1), Err(LBError::InvalidData(v)) if v.is_nan()));
        assert_eq!(validate_input(&[1.0, 2.0, 3.0], 0), Err(LBError::InvalidLags(0)));
        assert_eq!(validate_input(&[1.0, 2.0, 3.0], 3), Err(LBError::InvalidLags(3)));
        assert_eq!(validate_input(&[1.0, 2.0, 3.0], 2), Ok(()));
    }
}
