//! Adapter that exposes a `LogLikelihood` as an `argmin` problem.
//!
//! We convert a *maximization* of a log-likelihood `ℓ(θ)` into a *minimization*
//! problem by defining the cost as `c(θ) = -ℓ(θ)`. Analytic gradients (if
//! provided by the model) are negated accordingly. If a gradient is not
//! provided, we finite-difference the **cost** closure, so no sign flip is
//! needed in that branch. Hessians are always finite differences of the cost
//! gradient and are only requested by the trust-region solver.
use std::cell::RefCell;

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        finite_diff::{compute_hessian, fd_gradient},
        traits::LogLikelihood,
        types::{Cost, Grad, Hessian as HessianMatrix, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient, Hessian};

#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }

    /// Cost `-ℓ(θ)` with the crate error type.
    pub fn neg_loglik(&self, theta: &Theta) -> OptResult<Cost> {
        let output = self.f.value(theta, self.data)?;
        if !output.is_finite() {
            return Err(OptError::NonFiniteCost { value: output });
        }
        Ok(-output)
    }

    /// Gradient of the cost with the crate error type.
    pub fn cost_gradient(&self, theta: &Theta) -> OptResult<Grad> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(-g)
            }
            Err(OptError::GradientNotImplemented) => {
                fd_gradient(theta, &|x: &Theta| self.neg_loglik(x))
            }
            Err(e) => Err(e),
        }
    }
}

impl<'a, F: LogLikelihood> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.neg_loglik(theta)?)
    }
}

impl<'a, F: LogLikelihood> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        Ok(self.cost_gradient(theta)?)
    }
}

impl<'a, F: LogLikelihood> Hessian for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Hessian = HessianMatrix;

    fn hessian(&self, theta: &Self::Param) -> Result<Self::Hessian, Error> {
        let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
        let grad_fn = |x: &Theta| -> Grad {
            match self.cost_gradient(x) {
                Ok(g) => g,
                Err(e) => {
                    let mut slot = closure_err.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    Grad::from_elem(x.len(), f64::NAN)
                }
            }
        };
        let hess = compute_hessian(&grad_fn, theta);
        if let Some(err) = closure_err.take() {
            return Err(err.into());
        }
        Ok(hess?)
    }
}
