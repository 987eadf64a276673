//! structural::filter — likelihood evaluation and state extraction.
//!
//! Purpose
//! -------
//! Define the contract between the estimation engine and the state-space
//! filtering engine ([`FilteringService`]) and ship a sequential default
//! implementation ([`UnivariateKalman`]).
//!
//! Key behaviors
//! -------------
//! - `likelihood`: exact-Gaussian log-likelihood of the data under a
//!   [`CompositeSsf`], optionally concentrated on the common scale factor.
//! - `filter`: filtered and one-step-ahead state means (and covariances on
//!   request).
//! - `smooth`: fixed-interval smoothed means and, on request, covariances;
//!   the means-only mode keeps checkpoints and recomputes block-wise.
//!
//! Invariants & assumptions
//! ------------------------
//! - Data column `j` feeds the observed equation `EquationSource::Observed(j)`;
//!   `NaN` entries are skipped.
//! - Every storage-heavy request first checks its footprint (see
//!   [`filter_footprint`], [`smoother_footprint`]) against
//!   `FilterOptions::memory_limit`; allocation failures map to
//!   `FilterError::OutOfMemory` as well.
//! - Services are stateless and sequential.
//!
//! Downstream usage
//! ----------------
//! - The monitor evaluates `likelihood` inside the optimizer; the result
//!   layer calls `filter` / `smooth` and handles `OutOfMemory` fallbacks.
pub mod kalman;
pub mod smoother;

pub use self::kalman::{DIFFUSE_KAPPA, UnivariateKalman};

use crate::structural::{
    core::{options::FilterOptions, ssf::CompositeSsf},
    data::ObservationMatrix,
    errors::{FilterError, FilterResult},
};
use ndarray::{Array1, Array2};

const F64_BYTES: usize = std::mem::size_of::<f64>();

/// Contract of a filtering/likelihood engine.
pub trait FilteringService {
    fn likelihood(
        &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
    ) -> FilterResult<Likelihood>;

    fn filter(
        &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
        covariances: bool,
    ) -> FilterResult<FilteredStates>;

    fn smooth(
        &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
        covariances: bool,
    ) -> FilterResult<StateSeries>;
}

/// Outcome of one likelihood evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Likelihood {
    pub log_likelihood: f64,
    /// Observations that entered the likelihood (non-diffuse, non-missing).
    pub n_obs: usize,
    /// Sum of squared standardized prediction errors.
    pub ssq: f64,
    pub logdet: f64,
    pub diffuse_count: usize,
    /// `ssq / n_obs` when concentrated, 1 otherwise.
    pub scale: f64,
    pub concentrated: bool,
    /// Standardized prediction errors `v / √F`, in processing order.
    pub residuals: Array1<f64>,
}

impl Likelihood {
    /// Errors
    /// ------
    /// - `FilterError::NoObservations` when `n_obs == 0`.
    /// - `FilterError::NonFiniteState` when the value is not finite, e.g. a
    ///   zero sum of squares under concentration.
    pub fn new(
        ssq: f64, logdet: f64, n_obs: usize, diffuse_count: usize, residuals: Array1<f64>,
        concentrated: bool,
    ) -> FilterResult<Self> {
        if n_obs == 0 {
            return Err(FilterError::NoObservations);
        }
        let n = n_obs as f64;
        let ln2pi = (2.0 * std::f64::consts::PI).ln();
        let (log_likelihood, scale) = if concentrated {
            let scale = ssq / n;
            (-0.5 * (n * (ln2pi + 1.0) + n * scale.ln() + logdet), scale)
        } else {
            (-0.5 * (n * ln2pi + ssq + logdet), 1.0)
        };
        if !log_likelihood.is_finite() {
            return Err(FilterError::NonFiniteState { t: n_obs, what: "likelihood" });
        }
        Ok(Likelihood { log_likelihood, n_obs, ssq, logdet, diffuse_count, scale, concentrated, residuals })
    }

    /// Residuals whose sum of squares is a monotone transform of the
    /// concentrated likelihood: `e · exp(logdet / 2n)`.
    pub fn ls_residuals(&self) -> Array1<f64> {
        let factor = (self.logdet / (2.0 * self.n_obs as f64)).exp();
        self.residuals.mapv(|e| e * factor)
    }
}

/// A time-indexed sequence of state means and optional covariances.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSeries {
    /// `n × m` means.
    pub means: Array2<f64>,
    /// One `m × m` covariance per time point, `None` when not computed.
    pub covariances: Option<Vec<Array2<f64>>>,
    /// Number of leading time points inside the diffuse phase.
    pub diffuse_prefix: usize,
}

impl StateSeries {
    pub fn n_obs(&self) -> usize {
        self.means.nrows()
    }

    pub fn state_dim(&self) -> usize {
        self.means.ncols()
    }

    /// Multiply every covariance by `factor`.
    pub fn rescale_covariances(&mut self, factor: f64) {
        if let Some(covs) = self.covariances.as_mut() {
            for c in covs.iter_mut() {
                c.mapv_inplace(|v| v * factor);
            }
        }
    }

    /// Overwrite the means (and covariances, when `covariances` is set) of
    /// the first `diffuse_prefix` time points with `NaN`.
    pub fn mask_diffuse_prefix(&mut self, covariances: bool) {
        let k = self.diffuse_prefix.min(self.n_obs());
        for t in 0..k {
            self.means.row_mut(t).fill(f64::NAN);
        }
        if covariances {
            if let Some(covs) = self.covariances.as_mut() {
                for c in covs.iter_mut().take(k) {
                    c.fill(f64::NAN);
                }
            }
        }
    }
}

/// Filtered (`a_{t|t}`) and one-step-ahead (`a_{t|t-1}`) states.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredStates {
    pub filtered: StateSeries,
    pub predicted: StateSeries,
}

/// Bytes needed by `filter` for `n` steps of an `m`-dimensional state.
pub fn filter_footprint(n: usize, m: usize, covariances: bool) -> usize {
    let per_step = m + if covariances { m * m } else { 0 };
    2 * n * per_step * F64_BYTES
}

/// Bytes needed by `smooth` for `n` steps, `m` states and `neq`
/// equations. With covariances every predicted covariance and step record
/// is kept; without, only checkpoints every `block` steps plus one block of
/// records.
pub fn smoother_footprint(n: usize, m: usize, neq: usize, covariances: bool, block: usize) -> usize {
    let step = neq * (m + 3);
    let means = n * m;
    let floats = if covariances {
        n * (m + m * m + step) + means + n * m * m
    } else {
        let block = block.max(1).min(n.max(1));
        let checkpoints = n.div_ceil(block);
        checkpoints * (m + 2 * m * m) + block * (m + m * m + step) + means
    };
    floats * F64_BYTES
}

// ---- Helper methods ----

/// Fail with `OutOfMemory` when `bytes` exceeds the configured budget.
pub(crate) fn check_budget(bytes: usize, opts: &FilterOptions) -> FilterResult<()> {
    match opts.memory_limit {
        Some(limit) if bytes > limit => Err(FilterError::OutOfMemory { requested: bytes, limit }),
        _ => Ok(()),
    }
}

/// A vector with room for `len` items; allocator refusal is reported as
/// `OutOfMemory`.
pub(crate) fn try_vec<T>(len: usize, opts: &FilterOptions) -> FilterResult<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|_| FilterError::OutOfMemory {
        requested: len.saturating_mul(std::mem::size_of::<T>()),
        limit: opts.memory_limit.unwrap_or(usize::MAX),
    })?;
    Ok(out)
}
