//! Numerical stability utilities.
//!
//! Provides the shared tolerances and the small scalar projections used by
//! parameter domains when an optimizer proposes a point outside the
//! admissible region.
//!
//! # Provided items
//! - [`DEFAULT_BOUNDARY_EPS`]: distance kept from open bounds (default 1e-6).
//!   Used to enforce strict inequalities such as `|φ| < 1`.
//! - [`DEFAULT_NUMERIC_STEP`]: relative step for numerical differentiation.
//! - [`EIGEN_EPS`]: eigenvalues at or below this are treated as zero.
//! - [`clamp_open`]: clamp into `[lo + ε, hi − ε]`.
//! - [`reflect_nonnegative`]: map a real onto `[0, ∞)` by reflection.
//! - [`numeric_step`]: step size that scales with the magnitude of `x`.

pub const DEFAULT_BOUNDARY_EPS: f64 = 1e-6;

pub const DEFAULT_NUMERIC_STEP: f64 = 1e-6;

pub const EIGEN_EPS: f64 = 1e-10;

/// Clamp `x` into the open interval `(lo, hi)` shrunk by `eps` on each
/// side. Infinite bounds leave that side untouched.
pub fn clamp_open(x: f64, lo: f64, hi: f64, eps: f64) -> f64 {
    let lower = if lo.is_finite() { lo + eps } else { lo };
    let upper = if hi.is_finite() { hi - eps } else { hi };
    if x < lower {
        lower
    } else if x > upper {
        upper
    } else {
        x
    }
}

pub fn reflect_nonnegative(x: f64) -> f64 {
    x.abs()
}

pub fn numeric_step(x: f64, eps: f64) -> f64 {
    x.abs().max(1.0) * eps
}
