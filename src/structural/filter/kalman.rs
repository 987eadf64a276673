//! Univariate Kalman filter with approximate diffuse initialization.
//!
//! Purpose
//! -------
//! Default [`FilteringService`]: processes the measurement equations of a
//! [`CompositeSsf`] one at a time within each time step, which turns every
//! update into scalar arithmetic and makes missing values trivial to skip.
//!
//! Key behaviors
//! -------------
//! - Initial state `a₁ = a0`, `P₁ = P0 + κ·Pi0` with κ = [`DIFFUSE_KAPPA`];
//!   `Pinf` starts at `Pi0` and is propagated exactly to flag diffuse
//!   steps (`F∞ > tol`).
//! - Diffuse steps condition the state but stay out of the likelihood;
//!   with `diffuse_correction` they add `log F∞` to the determinant term.
//! - Constraint equations are processed with their target value as the
//!   observation and zero variance; they never enter the likelihood.
//! - Steps with `F` below a small threshold are skipped.
//!
//! Invariants & assumptions
//! ------------------------
//! - `P` and `Pinf` are re-symmetrized after each prediction.
//! - Non-finite prediction errors abort with `FilterError::NonFiniteState`.
use crate::structural::{
    core::{
        options::FilterOptions,
        ssf::{CompositeSsf, EquationSource},
    },
    data::ObservationMatrix,
    errors::{FilterError, FilterResult},
    filter::{
        FilteredStates, FilteringService, Likelihood, StateSeries, check_budget, filter_footprint,
        smoother, try_vec,
    },
};
use ndarray::{Array1, Array2};

/// Scale of the approximate diffuse prior.
pub const DIFFUSE_KAPPA: f64 = 1e6;

const DIFFUSE_TOL: f64 = 1e-9;
const MIN_PREDICTION_VARIANCE: f64 = 1e-12;

/// Sequential (univariate) Kalman filter and smoother.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnivariateKalman;

impl UnivariateKalman {
    pub fn new() -> Self {
        UnivariateKalman
    }
}

/// One processed scalar update.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StepRecord {
    pub equation: usize,
    pub v: f64,
    pub f: f64,
    pub finf: f64,
    /// Kalman gain `P z / F`.
    pub k: Array1<f64>,
    pub diffuse: bool,
    pub observed: bool,
}

/// Predicted state at the start of a time step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ForwardState {
    pub a: Array1<f64>,
    pub p: Array2<f64>,
    pub pinf: Array2<f64>,
}

impl ForwardState {
    pub fn initial(ssf: &CompositeSsf) -> Self {
        let p = ssf.initial_covariance() + &(ssf.initial_diffuse() * DIFFUSE_KAPPA);
        ForwardState { a: ssf.initial_mean().clone(), p, pinf: ssf.initial_diffuse().clone() }
    }

    /// Process every equation of time step `t`; the state becomes the
    /// filtered state `a_{t|t}`.
    pub fn update(
        &mut self, ssf: &CompositeSsf, data: &ObservationMatrix, t: usize,
    ) -> FilterResult<Vec<StepRecord>> {
        let row = data.row(t);
        let mut records = Vec::with_capacity(ssf.equations().len());
        for (j, eq) in ssf.equations().iter().enumerate() {
            let (y, observed) = match eq.source {
                EquationSource::Observed(col) => (row[col], true),
                EquationSource::Constraint(target) => (target, false),
            };
            if y.is_nan() {
                continue;
            }
            let z = &eq.z;
            let m = self.p.dot(z);
            let f = z.dot(&m) + eq.variance;
            let v = y - z.dot(&self.a);
            if !v.is_finite() || !f.is_finite() {
                return Err(FilterError::NonFiniteState { t, what: "prediction error" });
            }
            if f < MIN_PREDICTION_VARIANCE {
                continue;
            }
            let minf = self.pinf.dot(z);
            let finf = z.dot(&minf);
            let diffuse = finf > DIFFUSE_TOL;

            let k = &m / f;
            self.a.scaled_add(v, &k);
            subtract_outer(&mut self.p, &m, 1.0 / f);
            if diffuse {
                subtract_outer(&mut self.pinf, &minf, 1.0 / finf);
            }
            records.push(StepRecord { equation: j, v, f, finf, k, diffuse, observed });
        }
        Ok(records)
    }

    /// `a ← T a`, `P ← T P Tᵀ + V`, `Pinf ← T Pinf Tᵀ`.
    pub fn predict(&mut self, ssf: &CompositeSsf) {
        let t = ssf.transition();
        self.a = t.dot(&self.a);
        self.p = t.dot(&self.p).dot(&t.t()) + ssf.innovation();
        self.pinf = t.dot(&self.pinf).dot(&t.t());
        symmetrize(&mut self.p);
        symmetrize(&mut self.pinf);
    }
}

impl FilteringService for UnivariateKalman {
    fn likelihood(
        &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
    ) -> FilterResult<Likelihood> {
        check_inputs(ssf, data)?;
        let mut residuals: Vec<f64> = try_vec(data.n_observed(), opts)?;
        let (mut ssq, mut logdet) = (0.0, 0.0);
        let mut diffuse_count = 0;

        let mut state = ForwardState::initial(ssf);
        for t in 0..data.n_obs() {
            for rec in state.update(ssf, data, t)?.into_iter().filter(|r| r.observed) {
                if rec.diffuse {
                    diffuse_count += 1;
                    if opts.diffuse_correction {
                        logdet += rec.finf.ln();
                    }
                } else {
                    let e = rec.v / rec.f.sqrt();
                    ssq += e * e;
                    logdet += rec.f.ln();
                    residuals.push(e);
                }
            }
            state.predict(ssf);
        }
        let n_obs = residuals.len();
        Likelihood::new(ssq, logdet, n_obs, diffuse_count, Array1::from(residuals), opts.concentrated)
    }

    fn filter(
        &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
        covariances: bool,
    ) -> FilterResult<FilteredStates> {
        check_inputs(ssf, data)?;
        let (n, m) = (data.n_obs(), ssf.state_dim());
        check_budget(filter_footprint(n, m, covariances), opts)?;

        let mut filtered: Array2<f64> = Array2::zeros((n, m));
        let mut predicted: Array2<f64> = Array2::zeros((n, m));
        let (mut filtered_cov, mut predicted_cov) = if covariances {
            (Some(try_vec::<Array2<f64>>(n, opts)?), Some(try_vec::<Array2<f64>>(n, opts)?))
        } else {
            (None, None)
        };
        let mut diffuse_prefix = 0;

        let mut state = ForwardState::initial(ssf);
        for t in 0..n {
            predicted.row_mut(t).assign(&state.a);
            if let Some(c) = predicted_cov.as_mut() {
                c.push(state.p.clone());
            }
            let records = state.update(ssf, data, t)?;
            if records.iter().any(|r| r.diffuse) {
                diffuse_prefix = t + 1;
            }
            filtered.row_mut(t).assign(&state.a);
            if let Some(c) = filtered_cov.as_mut() {
                c.push(state.p.clone());
            }
            state.predict(ssf);
        }

        Ok(FilteredStates {
            filtered: StateSeries { means: filtered, covariances: filtered_cov, diffuse_prefix },
            predicted: StateSeries { means: predicted, covariances: predicted_cov, diffuse_prefix },
        })
    }

    fn smooth(
        &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
        covariances: bool,
    ) -> FilterResult<StateSeries> {
        check_inputs(ssf, data)?;
        if covariances {
            smoother::smooth_full(ssf, data, opts)
        } else {
            smoother::smooth_means(ssf, data, opts)
        }
    }
}

// ---- Helper methods ----

pub(crate) fn check_inputs(ssf: &CompositeSsf, data: &ObservationMatrix) -> FilterResult<()> {
    if ssf.state_dim() == 0 {
        return Err(FilterError::EmptySystem);
    }
    if data.n_series() != ssf.n_series() {
        return Err(FilterError::SeriesCountMismatch {
            expected: ssf.n_series(),
            found: data.n_series(),
        });
    }
    Ok(())
}

/// `p ← p − alpha · x xᵀ`.
fn subtract_outer(p: &mut Array2<f64>, x: &Array1<f64>, alpha: f64) {
    for ((i, j), value) in p.indexed_iter_mut() {
        *value -= alpha * x[i] * x[j];
    }
}

fn symmetrize(p: &mut Array2<f64>) {
    let m = p.nrows();
    for i in 0..m {
        for j in (i + 1)..m {
            let avg = 0.5 * (p[[i, j]] + p[[j, i]]);
            p[[i, j]] = avg;
            p[[j, i]] = avg;
        }
    }
}
