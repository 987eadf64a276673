//! loglik_optimizer — argmin-powered log-likelihood optimizer.
//!
//! Purpose
//! -------
//! Provide the numerical optimizer abstraction used by staged estimation:
//! callers implement a single trait, [`LogLikelihood`], and pick one of the
//! supported algorithms: quasi-Newton ([`maximize`]), Levenberg–Marquardt
//! ([`maximize_least_squares`]), a constrained-step trust region
//! ([`maximize_trust_region`]), or the derivative-free fallback
//! ([`maximize_nelder_mead`]). Each accepts a start point, a function
//! precision and an iteration cap, and returns an [`OptimOutcome`].
//!
//! Key behaviors
//! -------------
//! - Convert log-likelihoods `ℓ(θ)` into Argmin cost functions
//!   `c(θ) = -ℓ(θ)` via [`adapter::ArgMinAdapter`], including
//!   finite-difference gradients and Hessians.
//! - Centralize optimizer configuration ([`Tolerances`], [`MLEOptions`]) and
//!   validation logic ([`validation`]) so downstream code can assume sane,
//!   finite inputs.
//!
//! Invariants & assumptions
//! ------------------------
//! - The optimizer **always maximizes** `ℓ(θ)`; models implement `ℓ(θ)`,
//!   `∇ℓ(θ)` (optional) and residuals (optional), never the cost.
//! - [`LogLikelihood::value`] must report invalid inputs as recoverable
//!   [`OptError`] values, not panics.
//! - Start points must be non-empty and finite; parameter-free problems are
//!   handled by the caller, not by the solvers.
//!
//! Conventions
//! -----------
//! - Parameters live in an unconstrained optimizer space as [`Theta`];
//!   any domain projection happens in the model layer.
//! - Errors bubble up as [`OptResult<T>`] / [`OptError`]; this module never
//!   intentionally panics or uses `unsafe`.
//!
//! Downstream usage
//! ----------------
//! - `structural::monitor` implements [`LogLikelihood`] for the assembled
//!   state-space model and calls the entry point that matches its
//!   configured optimizer kind.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover sign conventions in [`adapter`], solver
//!   construction in [`builders`], derivative helpers in [`finite_diff`],
//!   the LM iteration in [`levenberg`], and convergence of every entry point
//!   on a Gaussian toy likelihood in [`api`].
//!
//! [`OptError`]: crate::optimization::errors::OptError
//! [`OptResult<T>`]: crate::optimization::errors::OptResult

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod levenberg;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::{maximize, maximize_nelder_mead, maximize_trust_region};
pub use self::levenberg::maximize_least_squares;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Theta};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use composite_sts::optimization::loglik_optimizer::prelude::*;
//
// to import the main optimizer surface in a single line.

pub mod prelude {
    pub use super::api::{maximize, maximize_nelder_mead, maximize_trust_region};
    pub use super::levenberg::maximize_least_squares;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
