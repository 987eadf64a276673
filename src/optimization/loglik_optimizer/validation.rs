//! Validation helpers shared by every solver path.
//!
//! - **Configuration**: [`verify_tol_grad`], [`verify_tol_cost`],
//!   [`verify_simplex_step`] reject non-finite or non-positive settings.
//! - **Inputs**: [`validate_theta0`] rejects empty or non-finite start points.
//! - **Derivatives**: [`validate_grad`], [`validate_hessian`] and
//!   [`validate_residuals`] enforce shape and finiteness.
//! - **Outcomes**: [`validate_theta_hat`], [`validate_value`].
//!
//! Every failure is reported through a dedicated [`OptError`] variant so
//! callers can tell a bad configuration from a numerical breakdown.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{Grad, Theta, types::Hessian},
};
use ndarray::Array1;

pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    match tol {
        Some(tol) if !tol.is_finite() => {
            Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be finite." })
        }
        Some(tol) if tol <= 0.0 => {
            Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be positive." })
        }
        _ => Ok(()),
    }
}

pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    match tol {
        Some(tol) if !tol.is_finite() => {
            Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be finite." })
        }
        Some(tol) if tol <= 0.0 => {
            Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be positive." })
        }
        _ => Ok(()),
    }
}

pub fn verify_simplex_step(step: f64) -> OptResult<()> {
    if !step.is_finite() || step <= 0.0 {
        return Err(OptError::InvalidSimplexStep { step });
    }
    Ok(())
}

/// Reject start points no solver can work with.
///
/// # Errors
/// - [`OptError::EmptyTheta`] for a zero-length vector.
/// - [`OptError::InvalidParameter`] naming the first non-finite entry.
pub fn validate_theta0(theta: &Theta) -> OptResult<()> {
    if theta.is_empty() {
        return Err(OptError::EmptyTheta);
    }
    if let Some((index, value)) = theta.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(OptError::InvalidParameter {
            text: format!("initial parameter {index} is {value}"),
        });
    }
    Ok(())
}

pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Residual vectors must keep their length across evaluations and stay
/// finite; `expected = None` accepts any length (first evaluation).
pub fn validate_residuals(residuals: &Array1<f64>, expected: Option<usize>) -> OptResult<()> {
    if let Some(expected) = expected {
        if residuals.len() != expected {
            return Err(OptError::ResidualDimMismatch { expected, found: residuals.len() });
        }
    }
    match residuals.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        Some((index, &value)) => Err(OptError::InvalidResidual { index, value }),
        None => Ok(()),
    }
}

pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let theta = theta_hat.ok_or(OptError::MissingThetaHat)?;
    if let Some((index, &value)) = theta.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(OptError::InvalidThetaHat {
            index,
            value,
            reason: "Parameter estimates must be finite.",
        });
    }
    Ok(theta)
}

pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

/// Check a Hessian is `dim × dim` with finite entries.
pub fn validate_hessian(hessian: &Hessian, dim: usize) -> OptResult<()> {
    if hessian.nrows() != dim || hessian.ncols() != dim {
        return Err(OptError::HessianDimMismatch {
            expected: dim,
            found: (hessian.nrows(), hessian.ncols()),
        });
    }
    match hessian.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, col), &value)) => Err(OptError::InvalidHessian { row, col, value }),
        None => Ok(()),
    }
}
