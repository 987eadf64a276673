//! Parameter domains — bounds, numeric steps and projection.
//!
//! Purpose
//! -------
//! Describe the admissible region of one parameter block in optimizer
//! space and provide the projection that maps an arbitrary proposal back
//! into it. Domains never fail at runtime: an out-of-domain vector is
//! replaced by an admissible one and the caller is told whether anything
//! changed through [`ParamValidation`].
//!
//! Key behaviors
//! -------------
//! - [`DomainKind::Unbounded`]: identity projection.
//! - [`DomainKind::NonNegative`]: negative coordinates are reflected.
//! - [`DomainKind::Bounded`]: coordinates are clamped into
//!   `[lower + ε, upper − ε]`.
//! - [`DomainKind::Stability`]: the vector is read as lag-polynomial
//!   coefficients and projected onto the stationary region by root
//!   reflection.
//!
//! Invariants & assumptions
//! ------------------------
//! - `lower.len() == upper.len() == dim()` for every constructed domain.
//! - `epsilon` (relative numeric step) and `boundary_eps` are finite and
//!   strictly positive; they are passed in explicitly so several
//!   estimations can run with different tolerances.
//! - Projection is idempotent: a second `validate` returns `Valid`.
use crate::{
    optimization::numerical_stability::{
        DEFAULT_BOUNDARY_EPS, DEFAULT_NUMERIC_STEP, clamp_open, is_stable, numeric_step,
        reflect_nonnegative, stabilize,
    },
    structural::errors::{ParamError, ParamResult},
};
use ndarray::{Array1, ArrayView1, ArrayViewMut1};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    Unbounded,
    NonNegative,
    Bounded,
    Stability,
}

/// Outcome of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamValidation {
    Valid,
    Changed,
}

impl ParamValidation {
    pub fn is_changed(self) -> bool {
        matches!(self, ParamValidation::Changed)
    }

    /// Combine two outcomes; `Changed` wins.
    pub fn merge(self, other: ParamValidation) -> ParamValidation {
        if self.is_changed() || other.is_changed() {
            ParamValidation::Changed
        } else {
            ParamValidation::Valid
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDomain {
    kind: DomainKind,
    lower: Array1<f64>,
    upper: Array1<f64>,
    epsilon: f64,
    boundary_eps: f64,
}

impl ParamDomain {
    /// General constructor.
    ///
    /// Errors
    /// ------
    /// - `ParamError::DimensionMismatch` if `lower` and `upper` differ in
    ///   length, or either is empty.
    /// - `ParamError::InvalidBounds` if some `lower[i] >= upper[i]`.
    /// - `ParamError::InvalidEpsilon` for a non-positive or non-finite
    ///   `epsilon`/`boundary_eps`.
    pub fn new(
        kind: DomainKind, lower: Array1<f64>, upper: Array1<f64>, epsilon: f64, boundary_eps: f64,
    ) -> ParamResult<Self> {
        if lower.is_empty() {
            return Err(ParamError::EmptyBlock { name: "domain".to_string() });
        }
        if lower.len() != upper.len() {
            return Err(ParamError::DimensionMismatch {
                name: "domain".to_string(),
                expected: lower.len(),
                found: upper.len(),
            });
        }
        for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo >= hi {
                return Err(ParamError::InvalidBounds { index, lower: lo, upper: hi });
            }
        }
        verify_epsilon(epsilon)?;
        verify_epsilon(boundary_eps)?;
        Ok(ParamDomain { kind, lower, upper, epsilon, boundary_eps })
    }

    pub fn unbounded(dim: usize) -> ParamResult<Self> {
        Self::new(
            DomainKind::Unbounded,
            Array1::from_elem(dim, f64::NEG_INFINITY),
            Array1::from_elem(dim, f64::INFINITY),
            DEFAULT_NUMERIC_STEP,
            DEFAULT_BOUNDARY_EPS,
        )
    }

    pub fn non_negative(dim: usize) -> ParamResult<Self> {
        Self::new(
            DomainKind::NonNegative,
            Array1::zeros(dim),
            Array1::from_elem(dim, f64::INFINITY),
            DEFAULT_NUMERIC_STEP,
            DEFAULT_BOUNDARY_EPS,
        )
    }

    /// Scalar interval `(lower, upper)`.
    pub fn bounded(lower: f64, upper: f64, boundary_eps: f64) -> ParamResult<Self> {
        Self::new(
            DomainKind::Bounded,
            Array1::from_elem(1, lower),
            Array1::from_elem(1, upper),
            DEFAULT_NUMERIC_STEP,
            boundary_eps,
        )
    }

    /// Scalar scale domain `(-1, 1)`.
    pub fn scale(boundary_eps: f64) -> ParamResult<Self> {
        Self::bounded(-1.0, 1.0, boundary_eps)
    }

    /// Lag-polynomial coefficients of degree `dim`.
    pub fn stability(dim: usize, boundary_eps: f64) -> ParamResult<Self> {
        Self::new(
            DomainKind::Stability,
            Array1::from_elem(dim, f64::NEG_INFINITY),
            Array1::from_elem(dim, f64::INFINITY),
            DEFAULT_NUMERIC_STEP,
            boundary_eps,
        )
    }

    /// Replace the relative differentiation step.
    pub fn with_epsilon(mut self, epsilon: f64) -> ParamResult<Self> {
        verify_epsilon(epsilon)?;
        self.epsilon = epsilon;
        Ok(self)
    }

    pub fn kind(&self) -> DomainKind {
        self.kind
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self, i: usize) -> f64 {
        self.lower[i]
    }

    pub fn upper(&self, i: usize) -> f64 {
        self.upper[i]
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn boundary_eps(&self) -> f64 {
        self.boundary_eps
    }

    /// Per-coordinate differentiation step `max(|xᵢ|, 1) · epsilon`.
    pub fn step(&self, x: ArrayView1<f64>) -> Array1<f64> {
        x.mapv(|xi| numeric_step(xi, self.epsilon))
    }

    /// Whether `x` is admissible, without modifying it.
    pub fn check_boundaries(&self, x: ArrayView1<f64>) -> bool {
        if x.len() != self.dim() || x.iter().any(|v| !v.is_finite()) {
            return false;
        }
        match self.kind {
            DomainKind::Unbounded => true,
            DomainKind::NonNegative => x.iter().all(|&v| v >= 0.0),
            DomainKind::Bounded => x
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(&v, (&lo, &hi))| v > lo && v < hi),
            DomainKind::Stability => is_stable(x),
        }
    }

    /// Project `x` onto the domain in place.
    pub fn validate(&self, mut x: ArrayViewMut1<f64>) -> ParamValidation {
        match self.kind {
            DomainKind::Unbounded => ParamValidation::Valid,
            DomainKind::NonNegative => {
                let mut outcome = ParamValidation::Valid;
                x.iter_mut().filter(|v| **v < 0.0).for_each(|v| {
                    *v = reflect_nonnegative(*v);
                    outcome = ParamValidation::Changed;
                });
                outcome
            }
            DomainKind::Bounded => {
                let mut outcome = ParamValidation::Valid;
                for (i, v) in x.iter_mut().enumerate() {
                    let (lo, hi) = (self.lower[i], self.upper[i]);
                    if *v <= lo || *v >= hi {
                        *v = clamp_open(*v, lo, hi, self.boundary_eps);
                        outcome = ParamValidation::Changed;
                    }
                }
                outcome
            }
            DomainKind::Stability => match stabilize(x.view(), self.boundary_eps) {
                Some(projected) => {
                    x.assign(&projected);
                    ParamValidation::Changed
                }
                None => ParamValidation::Valid,
            },
        }
    }
}

// ---- Helper methods ----

fn verify_epsilon(value: f64) -> ParamResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ParamError::InvalidEpsilon { value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Constructor validation of bounds and epsilons.
    // - Projection for every domain kind, including idempotence.
    // - Relative numeric steps.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Mismatched or inverted bounds are rejected at construction.
    //
    // Given
    // -----
    // - Bounds of lengths 2 and 1, then a scalar interval with lower > upper.
    //
    // Expect
    // ------
    // - `DimensionMismatch` and `InvalidBounds` respectively.
    fn new_rejects_inconsistent_bounds() {
        let err = ParamDomain::new(
            DomainKind::Bounded,
            array![0.0, 0.0],
            array![1.0],
            DEFAULT_NUMERIC_STEP,
            DEFAULT_BOUNDARY_EPS,
        )
        .expect_err("length mismatch");
        assert!(matches!(err, ParamError::DimensionMismatch { expected: 2, found: 1, .. }));

        let err = ParamDomain::bounded(1.0, 0.0, DEFAULT_BOUNDARY_EPS).expect_err("inverted");
        assert!(matches!(err, ParamError::InvalidBounds { index: 0, .. }));
    }

    #[test]
    // Purpose
    // -------
    // The scale domain clamps to (-1 + ε, 1 − ε) and reports the change.
    //
    // Given
    // -----
    // - ε = 1e-3 and inputs 1.7 and 0.2.
    //
    // Expect
    // ------
    // - 1.7 → 0.999 with `Changed`; 0.2 untouched with `Valid`.
    fn scale_domain_clamps_inside_open_interval() {
        // Arrange
        let domain = ParamDomain::scale(1e-3).expect("valid domain");
        let mut above = array![1.7];
        let mut inside = array![0.2];

        // Act
        let changed = domain.validate(above.view_mut());
        let unchanged = domain.validate(inside.view_mut());

        // Assert
        assert_eq!(changed, ParamValidation::Changed);
        assert_relative_eq!(above[0], 0.999, epsilon = 1e-15);
        assert_eq!(unchanged, ParamValidation::Valid);
        assert_eq!(inside[0], 0.2);
    }

    #[test]
    // Purpose
    // -------
    // Stability projection is idempotent and yields an admissible point.
    //
    // Given
    // -----
    // - An explosive AR(2) coefficient vector.
    //
    // Expect
    // ------
    // - First validation `Changed`, second `Valid` with identical output,
    //   and `check_boundaries` true afterwards.
    fn stability_projection_is_idempotent() {
        // Arrange
        let domain = ParamDomain::stability(2, DEFAULT_BOUNDARY_EPS).expect("valid domain");
        let mut coeffs = array![-2.5, 1.0];
        assert!(!domain.check_boundaries(coeffs.view()));

        // Act
        let first = domain.validate(coeffs.view_mut());
        let once = coeffs.clone();
        let second = domain.validate(coeffs.view_mut());

        // Assert
        assert_eq!(first, ParamValidation::Changed);
        assert_eq!(second, ParamValidation::Valid);
        assert_eq!(coeffs, once);
        assert!(domain.check_boundaries(coeffs.view()));
    }

    #[test]
    // Purpose
    // -------
    // Degenerate AR coefficients are projected rather than handed to the
    // eigenvalue solver.
    //
    // Given
    // -----
    // - A stability domain of dimension 3 and the vectors (NaN, 0.1, 0.1)
    //   and (1e200, −1e300, 1e300).
    //
    // Expect
    // ------
    // - `check_boundaries` false, `validate` returns `Changed`, and the
    //   projected vector is finite and admissible.
    fn stability_projection_handles_degenerate_coefficients() {
        let domain = ParamDomain::stability(3, DEFAULT_BOUNDARY_EPS).expect("valid domain");
        for mut coeffs in [array![f64::NAN, 0.1, 0.1], array![1e200, -1e300, 1e300]] {
            assert!(!domain.check_boundaries(coeffs.view()));

            let outcome = domain.validate(coeffs.view_mut());

            assert_eq!(outcome, ParamValidation::Changed);
            assert!(coeffs.iter().all(|c| c.is_finite()));
            assert!(domain.check_boundaries(coeffs.view()));
        }
    }

    #[test]
    // Purpose
    // -------
    // Non-negative domains reflect and steps scale with magnitude.
    //
    // Given
    // -----
    // - x = (-0.4, 3.0) on a 2-dimensional non-negative domain.
    //
    // Expect
    // ------
    // - x → (0.4, 3.0); steps (1e-6, 3e-6).
    fn non_negative_reflects_and_steps_scale() {
        let domain = ParamDomain::non_negative(2).expect("valid domain");
        let mut x = array![-0.4, 3.0];

        assert!(domain.validate(x.view_mut()).is_changed());
        assert_eq!(x, array![0.4, 3.0]);

        let step = domain.step(x.view());
        assert_relative_eq!(step[0], 1e-6, epsilon = 1e-18);
        assert_relative_eq!(step[1], 3e-6, epsilon = 1e-18);
    }
}
