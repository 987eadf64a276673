//! statistical_tests::errors — error type for residual diagnostics.
//!
//! Purpose
//! -------
//! Provide the error enum and result alias for the residual portmanteau
//! test, keeping diagnostic failures separate from estimation errors.
//!
//! Key behaviors
//! -------------
//! - Define [`LBResult`] and [`LBError`] as the canonical result and error
//!   types for the Ljung–Box test and its validation helper.
//! - Attach human-readable `Display` messages to each variant so that
//!   diagnostics are meaningful without additional context.
//!
//! Invariants & assumptions
//! ------------------------
//! - Test routines validate their inputs (length, finiteness, lag bound)
//!   and return [`LBResult<T>`] instead of panicking.
//!
//! Conventions
//! -----------
//! - Messages are phrased in terms of domain constraints (e.g.,
//!   "1 ≤ lags < n") rather than low-level details.
//!
//! Testing notes
//! -------------
//! - Unit tests verify that each variant's `Display` message embeds its
//!   payload.

pub type LBResult<T> = Result<T, LBError>;

/// LBError — error conditions for the Ljung–Box test.
///
/// Variants
/// --------
/// - `InsufficientData`
///   Fewer than two observations.
/// - `InvalidData(value)`
///   A non-finite residual.
/// - `InvalidLags(lags)`
///   The lag bound violates `1 ≤ lags < n`.
/// - `ZeroVariance`
///   The series is constant, so autocorrelations are undefined.
#[derive(Debug, Clone, PartialEq)]
pub enum LBError {
    //------ Input validation errors ------
    InsufficientData,
    InvalidData(f64),
    InvalidLags(usize),
    ZeroVariance,
}

impl std::error::Error for LBError {}

impl std::fmt::Display for LBError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LBError::InsufficientData => {
                write!(f, "Need at least 2 observations to compute lag-1 autocorrelation.")
            }
            LBError::InvalidData(value) => {
                write!(f, "Invalid data value: {value}. Must be a finite number.")
            }
            LBError::InvalidLags(lags) => {
                write!(f, "Invalid lag bound: {lags}. Must satisfy 1 ≤ lags < n (data length).")
            }
            LBError::ZeroVariance => write!(f, "Series has zero variance; autocorrelations undefined."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Embedding of payload values (data value, lag bound) into messages.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Payload-carrying variants include their values in `Display`.
    //
    // Given
    // -----
    // - `InvalidLags(12)` and `InvalidData(inf)`.
    //
    // Expect
    // ------
    // - Messages contain "12" and "inf".
    fn lb_error_messages_include_payload() {
        // Arrange
        let lags = LBError::InvalidLags(12);
        let data = LBError::InvalidData(f64::INFINITY);

        // Act
        let (lags_msg, data_msg) = (lags.to_string(), data.to_string());

        // Assert
        assert!(lags_msg.contains("12"), "Got: {lags_msg}");
        assert!(data_msg.contains("inf"), "Got: {data_msg}");
        assert!(!LBError::ZeroVariance.to_string().trim().is_empty());
    }
}
