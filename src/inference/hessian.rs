//! inference::hessian — observed-information variances and standard errors.
//!
//! Purpose
//! -------
//! Turn a fitted log-likelihood into parameter uncertainty: build the
//! observed information `J(θ̂) = −∇²ℓ(θ̂)` by finite differences and invert
//! it through a truncated eigendecomposition.
//!
//! Key behaviors
//! -------------
//! - [`observed_information`] differentiates a fallible log-likelihood
//!   twice (finite-difference gradient, then [`compute_hessian`]).
//! - [`calc_standard_errors`] returns `sqrt(diag(J⁺))` for a gradient map of
//!   the *negative* log-likelihood.
//! - [`loglik_standard_errors`] chains the two for callers that only have
//!   `ℓ(θ)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - [`compute_hessian`] returns a finite, square, symmetrized `n×n`
//!   matrix with `n = θ̂.len()`; this module does not re-symmetrize.
//! - Eigenvalues with magnitude at most [`EIGEN_EPS`] are treated as
//!   numerically nonpositive and ignored, which inflates standard errors
//!   along weakly identified directions instead of failing.
//!
//! Conventions
//! -----------
//! - Parameters live in optimizer space (free parameters only); variance
//!   blocks are therefore on the standard-deviation scale.
//! - Errors are reported via [`OptResult<T>`].
//!
//! Downstream usage
//! ----------------
//! - `EstimationResult::standard_errors` calls [`loglik_standard_errors`]
//!   with the fitted `SsfFunction`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the `ndarray` → `DMatrix` copy, a diagonal quadratic
//!   with analytic standard errors, and a Gaussian log-likelihood.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        Theta,
        finite_diff::{compute_hessian, fd_gradient},
    },
    numerical_stability::transformations::EIGEN_EPS,
};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};
use std::cell::RefCell;

/// calc_standard_errors — classical standard errors from observed information.
///
/// Parameters
/// ----------
/// - `f`: `&F`
///   Gradient map of the **negative** log-likelihood, `θ ↦ −∇ℓ(θ)`, so that
///   its Jacobian is the observed information.
/// - `theta_hat`: `&Array1<f64>`
///   Point at which the information is evaluated.
///
/// Errors
/// ------
/// - Any error [`compute_hessian`] returns (non-finite entries, dimension
///   mismatches).
///
/// Examples
/// --------
/// ```rust
/// # use ndarray::array;
/// # use composite_sts::inference::hessian::calc_standard_errors;
/// // Simple quadratic: g(θ) = A θ, where A is PD.
/// let a = array![[4.0, 0.0],
///                [0.0, 1.0]];
/// let f = |theta: &ndarray::Array1<f64>| -> ndarray::Array1<f64> { a.dot(theta) };
/// let se = calc_standard_errors(&f, &array![1.0, -1.0]).expect("finite Hessian");
/// assert!((se[0] - 0.5).abs() < 1e-6);
/// assert!((se[1] - 1.0).abs() < 1e-6);
/// ```
pub fn calc_standard_errors<F: Fn(&Array1<f64>) -> Array1<f64>>(
    f: &F, theta_hat: &Array1<f64>,
) -> OptResult<Array1<f64>> {
    let n = theta_hat.len();
    let obs_info = compute_hessian(f, theta_hat)?;
    let mut obs_info_nalg = DMatrix::<f64>::zeros(obs_info.nrows(), obs_info.ncols());
    fill_dmatrix(&obs_info, &mut obs_info_nalg);
    Ok(solve_for_se(obs_info_nalg, n))
}

/// Observed information `−∇²ℓ(θ̂)` of a fallible log-likelihood.
///
/// Errors
/// ------
/// - The first error raised by `loglik` while differentiating.
/// - Any error [`compute_hessian`] returns.
pub fn observed_information<L: Fn(&Theta) -> OptResult<f64>>(
    loglik: &L, theta_hat: &Theta,
) -> OptResult<Array2<f64>> {
    let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
    let neg_grad = neg_gradient(loglik, &closure_err);
    let hess = compute_hessian(&neg_grad, theta_hat);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    hess
}

/// Standard errors of `θ̂` from a fallible log-likelihood.
pub fn loglik_standard_errors<L: Fn(&Theta) -> OptResult<f64>>(
    loglik: &L, theta_hat: &Theta,
) -> OptResult<Array1<f64>> {
    let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
    let neg_grad = neg_gradient(loglik, &closure_err);
    let se = calc_standard_errors(&neg_grad, theta_hat);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    se
}

// ---- Helper methods ----

/// `θ ↦ −∇ℓ(θ)` by finite differences; the first failure is parked in
/// `slot` and reported as a NaN gradient.
fn neg_gradient<'a, L: Fn(&Theta) -> OptResult<f64>>(
    loglik: &'a L, slot: &'a RefCell<Option<OptError>>,
) -> impl Fn(&Theta) -> Array1<f64> + 'a {
    move |theta: &Theta| match fd_gradient(theta, &|x: &Theta| loglik(x).map(|v| -v)) {
        Ok(g) => g,
        Err(e) => {
            let mut first = slot.borrow_mut();
            if first.is_none() {
                *first = Some(e);
            }
            Array1::from_elem(theta.len(), f64::NAN)
        }
    }
}

/// Copy a square `ndarray` matrix into a `DMatrix` of the same size.
fn fill_dmatrix(obs_info: &Array2<f64>, obs_info_nalg: &mut DMatrix<f64>) {
    let n = obs_info.ncols();
    for j in 0..n {
        for i in j..n {
            obs_info_nalg[(i, j)] = obs_info[[i, j]];
            obs_info_nalg[(j, i)] = obs_info[[j, i]];
        }
    }
}

/// `SE(θ̂_i) = sqrt(Σ_{k: λ_k > EIGEN_EPS} Q[i,k]² / λ_k)` with
/// `J = Q Λ Qᵀ`.
fn solve_for_se(obs_info_nalg: DMatrix<f64>, n: usize) -> Array1<f64> {
    let eigen_decomp = obs_info_nalg.symmetric_eigen();
    let q = eigen_decomp.eigenvectors;
    let eigenvals = eigen_decomp.eigenvalues;
    Array1::from_shape_fn(n, |i| {
        eigenvals
            .iter()
            .enumerate()
            .filter(|(_, lambda)| **lambda > EIGEN_EPS)
            .map(|(k, &lambda)| q[(i, k)] * q[(i, k)] / lambda)
            .sum::<f64>()
            .sqrt()
    })
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
    // - Correct copying of Hessians from `ndarray` into `DMatrix`.
    // - Classical SEs for a quadratic with a known information matrix.
    // - SEs of a Gaussian mean from its log-likelihood.
    //
    // They intentionally DO NOT cover:
    // - Pathological cases where `compute_hessian` itself fails.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that `fill_dmatrix` copies entries without altering them.
    //
    // Given
    // -----
    // - A 2×2 symmetric `Array2<f64>` with distinct entries.
    //
    // Expect
    // ------
    // - The `DMatrix` has identical entries at all positions.
    fn fill_dmatrix_copies_ndarray_into_dmatrix_without_modification() {
        // Arrange
        let obs_info: Array2<f64> = array![[2.0, 0.5], [0.5, 1.0]];
        let mut obs_info_nalg = DMatrix::<f64>::zeros(2, 2);

        // Act
        fill_dmatrix(&obs_info, &mut obs_info_nalg);

        // Assert
        assert_eq!(obs_info_nalg[(0, 0)], 2.0);
        assert_eq!(obs_info_nalg[(0, 1)], 0.5);
        assert_eq!(obs_info_nalg[(1, 0)], 0.5);
        assert_eq!(obs_info_nalg[(1, 1)], 1.0);
    }

    #[test]
    // Purpose
    // -------
    // Classical SEs equal the diagonal of the analytic inverse for a
    // diagonal quadratic.
    //
    // Given
    // -----
    // - g(θ) = A θ with A = diag(4, 1).
    //
    // Expect
    // ------
    // - SEs ≈ [0.5, 1.0].
    fn calc_standard_errors_diagonal_quadratic_matches_analytic_se() {
        // Arrange
        let a = array![[4.0, 0.0], [0.0, 1.0]];
        let f = |theta: &Array1<f64>| -> Array1<f64> { a.dot(theta) };
        let theta_hat = array![1.0, -1.0];

        // Act
        let se = calc_standard_errors(&f, &theta_hat).expect("finite Hessian");

        // Assert
        assert_eq!(se.len(), 2);
        assert_relative_eq!(se[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(se[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // Standard errors from a log-likelihood recover σ/√n for a Gaussian
    // mean.
    //
    // Given
    // -----
    // - ℓ(μ) = −Σ (yᵢ − μ)² / 2 over four points (σ = 1).
    //
    // Expect
    // ------
    // - SE(μ̂) ≈ 0.5 and J ≈ 4.
    fn loglik_standard_errors_recover_gaussian_mean_se() {
        // Arrange
        let y = [0.5, 1.5, 0.8, 1.2];
        let loglik = |theta: &Theta| -> OptResult<f64> {
            Ok(-0.5 * y.iter().map(|v| (v - theta[0]).powi(2)).sum::<f64>())
        };
        let theta_hat = array![1.0];

        // Act
        let info = observed_information(&loglik, &theta_hat).expect("information");
        let se = loglik_standard_errors(&loglik, &theta_hat).expect("se");

        // Assert
        assert_relative_eq!(info[[0, 0]], 4.0, epsilon = 1e-3);
        assert_relative_eq!(se[0], 0.5, epsilon = 1e-3);
    }
}
