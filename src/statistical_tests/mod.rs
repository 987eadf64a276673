//! statistical_tests — residual diagnostics for fitted models.
//!
//! Purpose
//! -------
//! Collect statistical-test routines used to check fitted state-space
//! models, together with their input validation and error handling.
//!
//! Key behaviors
//! -------------
//! - Expose the Ljung–Box portmanteau test via [`LBOutcome`] and its
//!   constructor [`LBOutcome::ljung_box`](ljung_box::LBOutcome::ljung_box).
//! - Centralize input guards in [`validate_input`].
//! - Provide [`LBError`] and [`LBResult`] for diagnostic failures.
//!
//! Downstream usage
//! ----------------
//! - `EstimationResult::ljung_box` runs the test on standardized
//!   one-step-ahead prediction errors.

pub mod errors;
pub mod ljung_box;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::errors::{LBError, LBResult};
pub use self::ljung_box::LBOutcome;
pub use self::validation::validate_input;

pub mod prelude {
    pub use super::errors::{LBError, LBResult};
    pub use super::ljung_box::LBOutcome;
}
