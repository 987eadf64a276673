//! inference — uncertainty of fitted parameters.
//!
//! Purpose
//! -------
//! Provide post-estimation standard errors for fitted models from the
//! observed information matrix, expressed in optimizer space `θ` (free
//! parameters only).
//!
//! Key behaviors
//! -------------
//! - [`hessian::observed_information`] builds `J(θ̂)` by finite differences
//!   of a fallible log-likelihood.
//! - [`hessian::calc_standard_errors`] and
//!   [`hessian::loglik_standard_errors`] turn it into standard errors via an
//!   eigenvalue-truncated pseudoinverse.
//!
//! Conventions
//! -----------
//! - All functions are pure: no logging, no global state. Failures are
//!   reported as `OptResult` errors from the optimizer layer.

pub mod hessian;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::hessian::{calc_standard_errors, loglik_standard_errors, observed_information};

pub mod prelude {
    pub use super::hessian::{calc_standard_errors, loglik_standard_errors, observed_information};
}
