//! optimization — MLE stack, numerical helpers, and unified error surface.
//!
//! Purpose
//! -------
//! Provide the optimization layer used when fitting structural state-space
//! models: an Argmin-backed log-likelihood optimizer with several algorithm
//! families, numerically stable helpers for parameter domains (boundary
//! clamping, polynomial stability projection), and a single error/result
//! surface.
//!
//! Key behaviors
//! -------------
//! - Expose high-level entry points for **maximizing log-likelihoods** `ℓ(θ)`
//!   (`loglik_optimizer`): quasi-Newton, Levenberg–Marquardt, trust region
//!   and Nelder–Mead.
//! - Supply shared numerical primitives (`numerical_stability`) for
//!   autoregressive stability checks and projection.
//! - Normalize configuration issues, numerical failures, and backend solver
//!   errors into a single enum (`errors::OptError`) with a common result
//!   alias (`OptResult<T>`).
//!
//! Invariants & assumptions
//! ------------------------
//! - Optimizers operate in an unconstrained parameter space `θ` and assume
//!   that inputs are finite once validation has passed; invalid states are
//!   reported as `OptError`, not panics.
//! - Likelihood implementations treat domain violations (negative
//!   variances, explosive autoregressions) as recoverable errors surfaced
//!   through this layer.
//!
//! Conventions
//! -----------
//! - All solvers conceptually maximize `ℓ(θ)` by minimizing an internal cost
//!   `c(θ) = -ℓ(θ)`; user-facing outcomes are expressed in terms of `ℓ`.
//! - Parameters, gradients, and Hessians are `ndarray`-based aliases
//!   (`Theta`, `Grad`, `Hessian`).
//! - This module and its submodules avoid I/O; progress logging belongs to
//!   the estimation monitor in `structural`.
//!
//! Downstream usage
//! ----------------
//! - `structural::monitor` implements `LogLikelihood` and dispatches to the
//!   configured solver for every estimation stage.
//! - `structural::core::params` uses `numerical_stability` to project
//!   autoregressive blocks onto the stationary region.
//!
//! Testing notes
//! -------------
//! - Unit tests in the submodules focus on local concerns: solver wiring and
//!   toy-model convergence in `loglik_optimizer`, root reflection in
//!   `numerical_stability`, and error conversions in `errors`.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use composite_sts::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
