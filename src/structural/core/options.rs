//! Estimation options — configuration for filtering and staged estimation.
//!
//! Purpose
//! -------
//! Collect every tolerance and budget used by the filtering service and the
//! estimation monitor in two validated carriers, [`FilterOptions`] and
//! [`MonitorOptions`], so that no numeric threshold lives in global state
//! and several estimations can run side by side with different settings.
//!
//! Key behaviors
//! -------------
//! - [`FilterOptions`]: diffuse correction, concentration, diffuse
//!   covariance smoothing, checkpoint block size and an optional memory
//!   budget (bytes) beyond which storage-heavy requests fail with
//!   `FilterError::OutOfMemory`.
//! - [`MonitorOptions`]: preferred [`OptimizerKind`], outer/final
//!   precisions and iteration budgets, small-variance cutoff, fix tolerance,
//!   data rescaling, and the optimizer-layer [`MLEOptions`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Constructors validate ranges and return `ModelError::InvalidOption`
//!   instead of panicking; `Default` impls are always valid.
//!
//! Testing notes
//! -------------
//! - Unit tests check defaults, validation and `OptimizerKind` parsing.
use crate::{
    optimization::loglik_optimizer::MLEOptions,
    structural::errors::{ModelError, ModelResult},
};
use std::str::FromStr;

pub const DEFAULT_CHECKPOINT_BLOCK: usize = 50;

/// Options understood by a `FilteringService`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    /// Add `log F∞` of diffuse steps to the determinant term.
    pub diffuse_correction: bool,
    /// Profile the common scale factor out of the likelihood.
    pub concentrated: bool,
    /// Report smoothed covariances over the diffuse prefix.
    pub diffuse_covariances: bool,
    /// Steps between checkpoints in means-only smoothing.
    pub block: usize,
    /// Storage budget in bytes.
    pub memory_limit: Option<usize>,
}

impl FilterOptions {
    pub fn new(
        diffuse_correction: bool, concentrated: bool, diffuse_covariances: bool, block: usize,
        memory_limit: Option<usize>,
    ) -> ModelResult<Self> {
        if block == 0 {
            return Err(ModelError::InvalidOption { name: "block", reason: "must be >= 1" });
        }
        Ok(FilterOptions { diffuse_correction, concentrated, diffuse_covariances, block, memory_limit })
    }

    pub fn with_memory_limit(&self, memory_limit: Option<usize>) -> Self {
        FilterOptions { memory_limit, ..self.clone() }
    }

    pub fn with_concentrated(&self, concentrated: bool) -> Self {
        FilterOptions { concentrated, ..self.clone() }
    }
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            diffuse_correction: false,
            concentrated: true,
            diffuse_covariances: true,
            block: DEFAULT_CHECKPOINT_BLOCK,
            memory_limit: None,
        }
    }
}

/// Optimizer families the monitor can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    QuasiNewton,
    LevenbergMarquardt,
    TrustRegion,
}

impl FromStr for OptimizerKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "quasi-newton" | "bfgs" | "lbfgs" => Ok(OptimizerKind::QuasiNewton),
            "levenberg-marquardt" | "lm" => Ok(OptimizerKind::LevenbergMarquardt),
            "trust-region" | "tr" => Ok(OptimizerKind::TrustRegion),
            _ => Err(ModelError::InvalidOptimizer { name: s.to_string() }),
        }
    }
}

/// Configuration of one estimation run.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOptions {
    pub optimizer: OptimizerKind,
    pub concentrated: bool,
    /// Outer convergence threshold on |Δℓ|; also the stage cost tolerance.
    pub precision: f64,
    pub final_precision: f64,
    pub max_outer_iter: usize,
    pub stage_max_iter: usize,
    pub final_max_iter: usize,
    /// Standard-deviation cutoff below which a variance is a fixing
    /// candidate.
    pub small_variance_eps: f64,
    /// Largest likelihood loss accepted when fixing a variance at zero.
    pub fix_tolerance: f64,
    pub rescale_data: bool,
    pub filter: FilterOptions,
    pub mle: MLEOptions,
}

impl MonitorOptions {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        optimizer: OptimizerKind, concentrated: bool, precision: f64, final_precision: f64,
        max_outer_iter: usize, stage_max_iter: usize, final_max_iter: usize,
        small_variance_eps: f64, fix_tolerance: f64, rescale_data: bool, filter: FilterOptions,
        mle: MLEOptions,
    ) -> ModelResult<Self> {
        verify_positive("precision", precision)?;
        verify_positive("final_precision", final_precision)?;
        verify_positive("small_variance_eps", small_variance_eps)?;
        if !fix_tolerance.is_finite() || fix_tolerance < 0.0 {
            return Err(ModelError::InvalidOption {
                name: "fix_tolerance",
                reason: "must be finite and >= 0",
            });
        }
        for (name, value) in [
            ("max_outer_iter", max_outer_iter),
            ("stage_max_iter", stage_max_iter),
            ("final_max_iter", final_max_iter),
        ] {
            if value == 0 {
                return Err(ModelError::InvalidOption { name, reason: "must be >= 1" });
            }
        }
        Ok(MonitorOptions {
            optimizer,
            concentrated,
            precision,
            final_precision,
            max_outer_iter,
            stage_max_iter,
            final_max_iter,
            small_variance_eps,
            fix_tolerance,
            rescale_data,
            filter,
            mle,
        })
    }

    /// Filter options with the monitor's concentration flag applied.
    pub fn filter_options(&self) -> FilterOptions {
        self.filter.with_concentrated(self.concentrated)
    }

    /// The optimizer actually used: least squares needs a concentrated
    /// residual structure and falls back to quasi-Newton otherwise.
    pub fn effective_optimizer(&self) -> OptimizerKind {
        match (self.optimizer, self.concentrated) {
            (OptimizerKind::LevenbergMarquardt, false) => OptimizerKind::QuasiNewton,
            (kind, _) => kind,
        }
    }
}

impl Default for MonitorOptions {
    fn default() -> Self {
        MonitorOptions {
            optimizer: OptimizerKind::LevenbergMarquardt,
            concentrated: true,
            precision: 1e-7,
            final_precision: 1e-9,
            max_outer_iter: 10,
            stage_max_iter: 100,
            final_max_iter: 500,
            small_variance_eps: 1e-3,
            fix_tolerance: 1e-6,
            rescale_data: true,
            filter: FilterOptions::default(),
            mle: MLEOptions::default(),
        }
    }
}

// ---- Helper methods ----

fn verify_positive(name: &'static str, value: f64) -> ModelResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ModelError::InvalidOption { name, reason: "must be finite and > 0" });
    }
    Ok(())
}
