//! loglik_optimizer::levenberg — Levenberg–Marquardt for residual-form
//! likelihoods.
//!
//! Purpose
//! -------
//! Maximize log-likelihoods whose value is a decreasing function of a sum of
//! squared residuals `‖r(θ)‖²` (concentrated Gaussian likelihoods are the
//! motivating case). The solver only needs [`LogLikelihood::residuals`]; the
//! Jacobian is obtained by forward differences.
//!
//! Key behaviors
//! -------------
//! - Damped Gauss–Newton steps `(JᵀJ + λ D) δ = −Jᵀr` with Marquardt
//!   scaling `D = diag(JᵀJ)`, solved by Cholesky (nalgebra).
//! - λ shrinks by 10 after an accepted step and grows by 10 after a
//!   rejected or unsolvable one; the run stops when λ exceeds
//!   [`MAX_DAMPING`] after at least one accepted step.
//! - Termination on relative sum-of-squares change below `tol_cost`,
//!   gradient sup-norm below `tol_grad`, or `max_iter`.
//!
//! Invariants & assumptions
//! ------------------------
//! - The residual length is fixed by the first evaluation.
//! - The reported `value` is `LogLikelihood::value` at the final point, not
//!   a function of the residuals, so callers compare it with other solvers
//!   directly.
//!
//! Testing notes
//! -------------
//! - Unit tests fit the Rosenbrock residuals and a linear regression, and
//!   check that objectives without residuals are rejected up front.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        FnEvalMap, LogLikelihood, MLEOptions, OptimOutcome, Theta,
        finite_diff::compute_jacobian,
        validation::{validate_residuals, validate_theta0},
    },
};
use argmin::core::{TerminationReason, TerminationStatus};
use nalgebra::{DMatrix, DVector};
use ndarray::Array1;

pub const INITIAL_DAMPING: f64 = 1e-3;

pub const MAX_DAMPING: f64 = 1e16;

const DEFAULT_LM_TOL: f64 = 1e-10;

pub fn maximize_least_squares<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    validate_theta0(&theta0)?;
    f.check(&theta0, data)?;
    let residual_fn = |theta: &Theta| f.residuals(theta, data);
    let tol_cost = opts.tols.tol_cost.unwrap_or(DEFAULT_LM_TOL);
    let max_iter = opts.tols.max_iter.unwrap_or(usize::MAX);

    let mut evals: u64 = 0;
    let mut theta = theta0;
    let mut r = residual_fn(&theta)?;
    evals += 1;
    validate_residuals(&r, None)?;
    let n_res = r.len();
    let mut ssq = r.dot(&r);
    let mut lambda = INITIAL_DAMPING;
    let mut status = TerminationStatus::NotTerminated;
    let mut iterations: u64 = 0;
    let mut accepted_any = false;

    while (iterations as usize) < max_iter {
        iterations += 1;
        let jac = compute_jacobian(&residual_fn, &theta, &r)?;
        evals += theta.len() as u64;
        let jt_r = jac.t().dot(&r);
        if let Some(tol_grad) = opts.tols.tol_grad {
            if jt_r.iter().fold(0.0_f64, |m, g| m.max(g.abs())) < tol_grad {
                status = TerminationStatus::Terminated(TerminationReason::SolverConverged);
                break;
            }
        }
        let jt_j = jac.t().dot(&jac);

        let mut stepped = false;
        while lambda <= MAX_DAMPING {
            let Some(delta) = damped_step(&jt_j, &jt_r, lambda) else {
                lambda *= 10.0;
                continue;
            };
            let candidate = &theta + &delta;
            let r_new = match residual_fn(&candidate) {
                Ok(r_new) if validate_residuals(&r_new, Some(n_res)).is_ok() => r_new,
                _ => {
                    evals += 1;
                    lambda *= 10.0;
                    continue;
                }
            };
            evals += 1;
            let ssq_new = r_new.dot(&r_new);
            if ssq_new < ssq {
                let rel_change = (ssq - ssq_new) / ssq.max(f64::MIN_POSITIVE);
                theta = candidate;
                r = r_new;
                ssq = ssq_new;
                lambda = (lambda / 10.0).max(1e-12);
                stepped = true;
                accepted_any = true;
                if rel_change < tol_cost {
                    status = TerminationStatus::Terminated(TerminationReason::SolverConverged);
                }
                break;
            }
            lambda *= 10.0;
        }
        if !stepped {
            if !accepted_any && iterations == 1 && ssq > 0.0 {
                return Err(OptError::DampingExhausted { lambda });
            }
            status = TerminationStatus::Terminated(TerminationReason::SolverConverged);
        }
        if !matches!(status, TerminationStatus::NotTerminated) {
            break;
        }
    }
    if matches!(status, TerminationStatus::NotTerminated) {
        status = TerminationStatus::Terminated(TerminationReason::MaxItersReached);
    }

    let value = f.value(&theta, data)?;
    let mut fn_evals = FnEvalMap::new();
    fn_evals.insert("residual_count".to_string(), evals);
    let grad = compute_jacobian(&residual_fn, &theta, &r).ok().map(|jac| jac.t().dot(&r) * 2.0);
    OptimOutcome::new(Some(theta), value, status, iterations, fn_evals, grad)
}

// ---- Helper methods ----

/// Solve `(JᵀJ + λ diag(JᵀJ)) δ = −Jᵀr`; `None` if the system is not
/// positive definite.
fn damped_step(jt_j: &ndarray::Array2<f64>, jt_r: &Array1<f64>, lambda: f64) -> Option<Theta> {
    let n = jt_r.len();
    let a = DMatrix::from_fn(n, n, |i, j| {
        if i == j { jt_j[[i, i]] + lambda * jt_j[[i, i]].max(1e-12) } else { jt_j[[i, j]] }
    });
    let b = DVector::from_iterator(n, jt_r.iter().map(|g| -g));
    let delta = a.cholesky()?.solve(&b);
    if delta.iter().all(|d| d.is_finite()) {
        Some(Array1::from_iter(delta.iter().copied()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::{
        Cost,
        traits::{LineSearcher, Tolerances},
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Convergence on a nonlinear (Rosenbrock) residual map.
    // - Exact recovery of linear least-squares coefficients.
    // - Up-front rejection of objectives without residuals.
    // -------------------------------------------------------------------------

    struct Rosenbrock;

    impl LogLikelihood for Rosenbrock {
        type Data = ();

        fn value(&self, theta: &Theta, data: &()) -> OptResult<Cost> {
            let r = self.residuals(theta, data)?;
            Ok(-0.5 * r.dot(&r))
        }

        fn check(&self, _theta: &Theta, _data: &()) -> OptResult<()> {
            Ok(())
        }

        fn residuals(&self, theta: &Theta, _data: &()) -> OptResult<Array1<f64>> {
            Ok(array![1.0 - theta[0], 10.0 * (theta[1] - theta[0] * theta[0])])
        }
    }

    struct Regression;

    impl LogLikelihood for Regression {
        type Data = (ndarray::Array2<f64>, Array1<f64>);

        fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost> {
            let r = self.residuals(theta, data)?;
            Ok(-0.5 * r.dot(&r))
        }

        fn check(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<()> {
            Ok(())
        }

        fn residuals(&self, theta: &Theta, data: &Self::Data) -> OptResult<Array1<f64>> {
            Ok(&data.1 - &data.0.dot(theta))
        }
    }

    struct ValueOnly;

    impl LogLikelihood for ValueOnly {
        type Data = ();

        fn value(&self, theta: &Theta, _data: &()) -> OptResult<Cost> {
            Ok(-theta.dot(theta))
        }

        fn check(&self, _theta: &Theta, _data: &()) -> OptResult<()> {
            Ok(())
        }
    }

    fn lm_options() -> MLEOptions {
        let tols = Tolerances::new(Some(1e-10), Some(1e-14), Some(200)).expect("valid tolerances");
        MLEOptions::new(tols, LineSearcher::MoreThuente, false, None).expect("valid options")
    }

    #[test]
    // Purpose
    // -------
    // LM reaches the Rosenbrock minimum from the classic start point.
    //
    // Given
    // -----
    // - Residuals (1 − x, 10(y − x²)) starting at (−1.2, 1).
    //
    // Expect
    // ------
    // - θ̂ ≈ (1, 1) and ℓ(θ̂) ≈ 0.
    fn lm_solves_rosenbrock_residuals() {
        // Act
        let outcome = maximize_least_squares(&Rosenbrock, array![-1.2, 1.0], &(), &lm_options())
            .expect("LM should converge");

        // Assert
        assert_relative_eq!(outcome.theta_hat[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(outcome.theta_hat[1], 1.0, epsilon = 1e-5);
        assert!(outcome.value > -1e-10);
        assert!(outcome.converged);
    }

    #[test]
    // Purpose
    // -------
    // Linear least squares is recovered to high accuracy.
    //
    // Given
    // -----
    // - y = X (2, −1) exactly, with a 4×2 design.
    //
    // Expect
    // ------
    // - θ̂ ≈ (2, −1).
    fn lm_recovers_linear_regression() {
        // Arrange
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = x.dot(&array![2.0, -1.0]);

        // Act
        let outcome = maximize_least_squares(&Regression, array![0.0, 0.0], &(x, y), &lm_options())
            .expect("LM should converge");

        // Assert
        assert_relative_eq!(outcome.theta_hat[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(outcome.theta_hat[1], -1.0, epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // Objectives without residuals cannot use this solver.
    //
    // Given
    // -----
    // - A value-only log-likelihood.
    //
    // Expect
    // ------
    // - `OptError::ResidualsNotImplemented`.
    fn lm_requires_residuals() {
        let err = maximize_least_squares(&ValueOnly, array![1.0], &(), &lm_options())
            .expect_err("no residuals");
        assert_eq!(err, OptError::ResidualsNotImplemented);
    }
}
