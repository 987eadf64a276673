//! High-level entry points for maximizing a `LogLikelihood`.
//!
//! - [`maximize`]: L-BFGS with Hager–Zhang or More–Thuente line search.
//! - [`maximize_trust_region`]: Steihaug trust region on a finite-difference
//!   Hessian (the constrained-step variant).
//! - [`maximize_nelder_mead`]: derivative-free simplex search.
//! - [`maximize_least_squares`](super::levenberg::maximize_least_squares):
//!   Levenberg–Marquardt, re-exported from [`super::levenberg`].
//!
//! Every entry point validates the start point, wraps the model in an
//! `ArgMinAdapter` (which *minimizes* `-ℓ(θ)`), and returns an
//! [`OptimOutcome`] expressed on the log-likelihood scale.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        OptimOutcome, Theta,
        adapter::ArgMinAdapter,
        builders::{
            build_nelder_mead, build_optimizer_hager_zhang, build_optimizer_more_thuente,
            build_trust_region,
        },
        run::{run_lbfgs, run_nelder_mead, run_trust_region},
        traits::{LineSearcher, LogLikelihood, MLEOptions},
        types::DEFAULT_SIMPLEX_STEP,
        validation::validate_theta0,
    },
};

pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    validate_theta0(&theta0)?;
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}

pub fn maximize_trust_region<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    validate_theta0(&theta0)?;
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    let solver = build_trust_region(None)?;
    run_trust_region(theta0, opts, problem, solver)
}

pub fn maximize_nelder_mead<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    validate_theta0(&theta0)?;
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    let solver = build_nelder_mead(&theta0, DEFAULT_SIMPLEX_STEP, opts)?;
    run_nelder_mead(opts, problem, solver)
}
