//! numerical_stability — tolerances, scalar projections, and lag-polynomial
//! stability.
//!
//! Purpose
//! -------
//! Collect the numerically sensitive helpers that parameter domains rely on
//! when they map an optimizer proposal back into the admissible region:
//! open-interval clamps, reflections, relative differentiation steps, and
//! the root-reflection projection for AR-type coefficient vectors.
//!
//! Key behaviors
//! -------------
//! - Provide stable scalar helpers (`clamp_open`, `reflect_nonnegative`,
//!   `numeric_step`) in [`transformations`].
//! - Provide the stability test and projection for lag polynomials
//!   (`is_stable`, `stabilize`) in [`polynomial`].
//! - Centralize default tolerances (`DEFAULT_BOUNDARY_EPS`,
//!   `DEFAULT_NUMERIC_STEP`, `EIGEN_EPS`). The defaults are only starting
//!   values; domains and monitors receive their tolerances explicitly.
//!
//! Invariants & assumptions
//! ------------------------
//! - All helpers are pure functions over finite `f64` inputs; they never
//!   log, allocate global state, or panic under documented usage.
//! - The polynomial projection is idempotent: projecting its own output
//!   reports "already stable".
//!
//! Downstream usage
//! ----------------
//! - `structural::core::domain` dispatches its `validate` projection to
//!   these helpers.
//! - `inference::hessian` reuses `EIGEN_EPS` for pseudoinverse truncation.

pub mod polynomial;
pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::polynomial::{is_stable, stabilize};
pub use self::transformations::{
    DEFAULT_BOUNDARY_EPS, DEFAULT_NUMERIC_STEP, EIGEN_EPS, clamp_open, numeric_step,
    reflect_nonnegative,
};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use composite_sts::optimization::numerical_stability::prelude::*;
//
// to import the main numerical-stability surface in a single line.

pub mod prelude {
    pub use super::polynomial::{is_stable, stabilize};
    pub use super::transformations::{DEFAULT_BOUNDARY_EPS, DEFAULT_NUMERIC_STEP, EIGEN_EPS};
}
