//! loglik_optimizer::types — shared numeric aliases and solver wiring.
//!
//! Purpose
//! -------
//! Centralize the core numeric types and solver aliases used by the
//! log-likelihood optimizer so the rest of the optimization code can stay
//! agnostic to `ndarray` and Argmin generics.
//!
//! Key behaviors
//! -------------
//! - Define canonical aliases for parameter vectors, gradients, Hessians,
//!   and scalar costs (`Theta`, `Grad`, `Hessian`, `Cost`).
//! - Provide a standard map type for function-evaluation counters
//!   (`FnEvalMap`).
//! - Expose pre-wired solver aliases for the three supported families:
//!   L-BFGS (two line searches), Steihaug trust region, and Nelder–Mead.
//!
//! Conventions
//! -----------
//! - `Theta` and `Grad` are column vectors with length equal to the number
//!   of free parameters; `Hessian` is the matching dense square matrix.
//! - `DEFAULT_LBFGS_MEM`, `DEFAULT_TRUST_RADIUS` and `DEFAULT_SIMPLEX_STEP`
//!   are starting values; callers may override them via [`MLEOptions`].
//!
//! [`MLEOptions`]: crate::optimization::loglik_optimizer::MLEOptions
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    neldermead::NelderMead,
    quasinewton::LBFGS,
    trustregion::{Steihaug, TrustRegion},
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

pub type Theta = Array1<f64>;

pub type Grad = Array1<f64>;

pub type Hessian = Array2<f64>;

pub type Cost = f64;

pub type FnEvalMap = HashMap<String, u64>;

pub const DEFAULT_LBFGS_MEM: usize = 7;

pub const DEFAULT_TRUST_RADIUS: f64 = 1.0;

pub const DEFAULT_SIMPLEX_STEP: f64 = 0.1;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;

pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;

pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;

pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;

pub type SteihaugTrustRegion = TrustRegion<Steihaug<Theta, Cost>, Cost>;

pub type NelderMeadSimplex = NelderMead<Theta, Cost>;
