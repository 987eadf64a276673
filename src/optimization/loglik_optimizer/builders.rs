//! loglik_optimizer::builders — solver construction helpers.
//!
//! Purpose
//! -------
//! Provide small, focused builders for the solvers used by the
//! log-likelihood optimizer. These helpers hide Argmin's generic wiring and
//! apply crate-level options (tolerances, memory size, radius, simplex step)
//! so that higher-level code can request a configured solver without
//! touching Argmin-specific types.
//!
//! Key behaviors
//! -------------
//! - L-BFGS with Hager–Zhang or More–Thuente line search
//!   ([`build_optimizer_hager_zhang`], [`build_optimizer_more_thuente`]),
//!   sharing [`configure_lbfgs`] for tolerances.
//! - Steihaug trust region ([`build_trust_region`]) for the
//!   constrained-step variant.
//! - Nelder–Mead ([`build_nelder_mead`]) around a start point, used as the
//!   derivative-free fallback.
//!
//! Conventions
//! -----------
//! - Builders never set the initial parameter vector (except the simplex,
//!   which *is* the Nelder–Mead state) or `max_iters`; those are applied by
//!   the runner.
//! - Argmin errors from `with_*` setters surface as [`OptError`] through
//!   the crate's `From<Error>` implementation.
//!
//! [`OptError`]: crate::optimization::errors::OptError
use argmin::solver::{
    neldermead::NelderMead,
    quasinewton::LBFGS,
    trustregion::{Steihaug, TrustRegion},
};

use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        traits::MLEOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, DEFAULT_TRUST_RADIUS, Grad, HagerZhangLS, LbfgsHagerZhang,
            LbfgsMoreThuente, MoreThuenteLS, NelderMeadSimplex, SteihaugTrustRegion, Theta,
        },
        validation::verify_simplex_step,
    },
};

pub fn build_optimizer_hager_zhang(opts: &MLEOptions) -> OptResult<LbfgsHagerZhang> {
    let hager_zhang = HagerZhangLS::new();
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsHagerZhang::new(hager_zhang, mem);
    configure_lbfgs(lbfgs, opts)
}

pub fn build_optimizer_more_thuente(opts: &MLEOptions) -> OptResult<LbfgsMoreThuente> {
    let more_thuente = MoreThuenteLS::new();
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsMoreThuente::new(more_thuente, mem);
    configure_lbfgs(lbfgs, opts)
}

/// Apply the optional gradient and cost-change tolerances to an L-BFGS
/// solver, whatever its line search.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &MLEOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}

pub fn build_trust_region(radius: Option<f64>) -> OptResult<SteihaugTrustRegion> {
    let subproblem = Steihaug::new();
    let solver = TrustRegion::new(subproblem).with_radius(radius.unwrap_or(DEFAULT_TRUST_RADIUS))?;
    Ok(solver)
}

/// Nelder–Mead around `theta0`: the simplex is `theta0` plus one vertex per
/// coordinate shifted by `step · max(|θᵢ|, 1)`.
pub fn build_nelder_mead(
    theta0: &Theta, step: f64, opts: &MLEOptions,
) -> OptResult<NelderMeadSimplex> {
    verify_simplex_step(step)?;
    let mut simplex = Vec::with_capacity(theta0.len() + 1);
    simplex.push(theta0.clone());
    for i in 0..theta0.len() {
        let mut vertex = theta0.clone();
        vertex[i] += step * theta0[i].abs().max(1.0);
        simplex.push(vertex);
    }
    let sd_tol = opts.tols.tol_cost.unwrap_or(1e-10);
    Ok(NelderMead::new(simplex).with_sd_tolerance(sd_tol)?)
}
