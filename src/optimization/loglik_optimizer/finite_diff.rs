//! loglik_optimizer::finite_diff — finite-difference derivatives.
//!
//! Purpose
//! -------
//! Provide gradient, Hessian and residual-Jacobian approximations around a
//! parameter vector, with error capture and validation, so solvers can ask
//! for derivatives of objectives that only expose values.
//!
//! Key behaviors
//! -------------
//! - [`fd_gradient`]: central differences first, forward differences when
//!   the central estimate fails validation or the objective errored.
//! - [`compute_hessian`]: central-difference Hessian of a gradient map with
//!   forward fallback, symmetrized in place.
//! - [`compute_jacobian`]: forward-difference Jacobian of a residual map
//!   (rows = residuals, columns = parameters) used by Levenberg–Marquardt.
//!
//! Invariants & assumptions
//! ------------------------
//! - Errors raised by the objective inside a finite-difference sweep are
//!   parked in a `RefCell` and surfaced after the sweep; the sweep itself
//!   sees `NaN`.
//! - Returned derivatives always satisfy [`validate_grad`] /
//!   [`validate_hessian`].
//!
//! Testing notes
//! -------------
//! - Unit tests cover the happy paths on quadratics, error propagation
//!   from the objective, and the non-finite failure paths.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        Grad, Theta,
        types::Hessian,
        validation::{validate_grad, validate_hessian, validate_residuals},
    },
    numerical_stability::{DEFAULT_NUMERIC_STEP, numeric_step},
};
use finitediff::FiniteDiff;
use ndarray::{Array1, Array2};
use std::cell::RefCell;

/// Finite-difference gradient of a fallible scalar objective.
///
/// Errors
/// ------
/// - The first error raised by `func` during the forward sweep.
/// - `OptError::InvalidGradient` if even the forward estimate is non-finite.
pub fn fd_gradient<G: Fn(&Theta) -> OptResult<f64>>(theta: &Theta, func: &G) -> OptResult<Grad> {
    let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
    let wrapped = |x: &Theta| -> f64 {
        match func(x) {
            Ok(value) => value,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                f64::NAN
            }
        }
    };
    let dim = theta.len();
    let central = theta.central_diff(&wrapped);
    if closure_err.borrow().is_none() && validate_grad(&central, dim).is_ok() {
        return Ok(central);
    }
    closure_err.replace(None);
    let forward = theta.forward_diff(&wrapped);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_grad(&forward, dim)?;
    Ok(forward)
}

pub fn compute_hessian<F: Fn(&Theta) -> Grad>(f: &F, theta: &Theta) -> OptResult<Hessian> {
    let dim = theta.len();
    let mut cent_hess = theta.central_hessian(f);
    match validate_hessian(&cent_hess, dim) {
        Ok(_) => {
            symmetrize_hess(&mut cent_hess);
            Ok(cent_hess)
        }
        Err(_) => {
            let mut forward_hess = theta.forward_hessian(f);
            validate_hessian(&forward_hess, dim)?;
            symmetrize_hess(&mut forward_hess);
            Ok(forward_hess)
        }
    }
}

/// Forward-difference Jacobian of a residual map.
///
/// Parameters
/// ----------
/// - `f`: residual map `θ ↦ r(θ)`; must keep its output length.
/// - `theta`: expansion point.
/// - `r0`: `f(theta)`, already computed by the caller.
///
/// Returns
/// -------
/// `Array2<f64>` of shape `(r0.len(), theta.len())`.
pub fn compute_jacobian<F>(f: &F, theta: &Theta, r0: &Array1<f64>) -> OptResult<Array2<f64>>
where
    F: Fn(&Theta) -> OptResult<Array1<f64>>,
{
    let mut jac = Array2::<f64>::zeros((r0.len(), theta.len()));
    let mut shifted = theta.clone();
    for j in 0..theta.len() {
        let h = numeric_step(theta[j], DEFAULT_NUMERIC_STEP);
        shifted[j] = theta[j] + h;
        let r1 = f(&shifted)?;
        validate_residuals(&r1, Some(r0.len()))?;
        jac.column_mut(j).assign(&((&r1 - r0) / h));
        shifted[j] = theta[j];
    }
    Ok(jac)
}

// ---- Helper methods ----

fn symmetrize_hess(hess: &mut Hessian) {
    for i in 0..hess.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hess[[i, j]] + hess[[j, i]]);
            hess[[i, j]] = avg;
            hess[[j, i]] = avg;
        }
    }
}
