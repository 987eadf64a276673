//! composite_sts — maximum-likelihood estimation of composite structural
//! time-series models.
//!
//! Purpose
//! -------
//! Serve as the crate root: assemble linear Gaussian state-space models out
//! of structural blocks (level, trend, seasonal, cycle, autoregression,
//! noise) and measurement equations, estimate their parameters, and
//! extract filtered and smoothed states.
//!
//! Key behaviors
//! -------------
//! - [`structural`] holds the estimation engine: parameter interpreters,
//!   the model assembler, the Kalman filtering service, the estimation
//!   monitor and the estimation result.
//! - [`optimization`] provides the argmin-backed MLE layer the monitor
//!   drives (quasi-Newton, Levenberg–Marquardt, trust region, Nelder–Mead)
//!   and the polynomial stability helpers used by AR domains.
//! - [`inference`] computes standard errors from the observed information.
//! - [`statistical_tests`] runs residual diagnostics on fitted models.
//!
//! Invariants & assumptions
//! ------------------------
//! - Estimation is single-threaded and keeps no global state; tolerances
//!   travel in option structs so independent fits may use different
//!   settings.
//! - Errors propagate as typed enums (`ParamError`, `FilterError`,
//!   `ModelError`, `OptError`, `LBError`); nothing panics on bad input.
//!
//! Downstream usage
//! ----------------
//! - Most callers only need [`prelude`]: build a
//!   [`CompositeModel`](structural::model::CompositeModel), call `estimate`
//!   and query the returned
//!   [`EstimationResult`](structural::results::EstimationResult).
//!
//! Testing notes
//! -------------
//! - Unit tests live next to the code; `tests/` runs the end-to-end
//!   estimation pipeline on seeded synthetic data.

pub mod inference;
pub mod optimization;
pub mod statistical_tests;
pub mod structural;

pub mod prelude {
    pub use crate::inference::prelude::*;
    pub use crate::optimization::loglik_optimizer::{LineSearcher, MLEOptions, Tolerances};
    pub use crate::statistical_tests::prelude::*;
    pub use crate::structural::prelude::*;
}
