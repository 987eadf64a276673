//! Estimation result — state extraction and diagnostics for a fitted model.
//!
//! Purpose
//! -------
//! Hold everything an estimation produced (mapping, final state, raw data,
//! filtering service, options) and derive state estimates, fitted signals
//! and post-estimation diagnostics from it.
//!
//! Key behaviors
//! -------------
//! - [`EstimationResult::smoothed_states`]: full covariances first; on
//!   `OutOfMemory` fall back to the checkpointed means-only smoother; on any
//!   other failure retry once with `diffuse_covariances = false`, which
//!   skips the covariance recursion inside the diffuse prefix.
//! - [`EstimationResult::filtered_states`]: full covariances first; on
//!   `OutOfMemory` recompute means only and mark the diffuse prefix `NaN`.
//! - [`EstimationResult::one_step_ahead_states`]: same policy, and the
//!   diffuse prefix of both means and covariances is always `NaN`.
//! - Covariances are multiplied by the likelihood scale factor (σ² of a
//!   concentrated fit, 1 otherwise); so are the variances returned by
//!   [`EstimationResult::scaled_parameters`].
//! - [`EstimationResult::signal`] / [`EstimationResult::stdev_signal`]
//!   project smoothed states on a subset of components for one series and
//!   return `None` for an unknown series or component.
//!
//! Invariants & assumptions
//! ------------------------
//! - `OutOfMemory` never escapes a state-extraction call unless the reduced
//!   computation fails as well.
//! - Results are recomputed on each call; nothing is cached.
use crate::{
    inference::hessian::loglik_standard_errors,
    optimization::loglik_optimizer::{LogLikelihood, Theta},
    statistical_tests::{LBOutcome, LBResult},
    structural::{
        core::{
            options::{FilterOptions, MonitorOptions},
            ssf::CompositeSsf,
        },
        data::ObservationMatrix,
        errors::{FilterError, FilterResult, ModelResult},
        filter::{FilteringService, Likelihood, StateSeries},
        mapping::ModelMapping,
        monitor::{EstimationState, SsfFunction},
    },
};
use ndarray::{Array1, s};
use tracing::warn;

/// Akaike and Bayesian information criteria of a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InformationCriteria {
    /// Estimated parameters, including the profiled scale when concentrated.
    pub n_params: usize,
    pub aic: f64,
    pub bic: f64,
}

#[derive(Debug, Clone)]
pub struct EstimationResult<S> {
    mapping: ModelMapping,
    state: EstimationState,
    data: ObservationMatrix,
    service: S,
    options: MonitorOptions,
}

impl<S: FilteringService> EstimationResult<S> {
    pub fn new(
        mapping: ModelMapping, state: EstimationState, data: ObservationMatrix, service: S,
        options: MonitorOptions,
    ) -> Self {
        EstimationResult { mapping, state, data, service, options }
    }

    pub fn mapping(&self) -> &ModelMapping {
        &self.mapping
    }

    pub fn state(&self) -> &EstimationState {
        &self.state
    }

    pub fn data(&self) -> &ObservationMatrix {
        &self.data
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    pub fn ssf(&self) -> &CompositeSsf {
        &self.state.ssf
    }

    pub fn likelihood(&self) -> &Likelihood {
        &self.state.likelihood
    }

    /// Full (model-space) parameters. Variances are relative to the scale
    /// anchor after a concentrated fit.
    pub fn parameters(&self) -> &Array1<f64> {
        &self.state.parameters
    }

    /// Full parameters with variances multiplied by the likelihood scale
    /// factor (standard deviations by its square root). Equal to
    /// [`parameters`](Self::parameters) for a plain fit.
    pub fn scaled_parameters(&self) -> ModelResult<Array1<f64>> {
        let mut full = self.state.parameters.clone();
        let mut mapping = self.mapping.clone();
        mapping.rescale_variances(self.scale_factor(), &mut full)?;
        Ok(full)
    }

    /// Factor applied to every reported covariance.
    pub fn scale_factor(&self) -> f64 {
        self.state.likelihood.scale
    }

    pub fn smoothed_states(&self) -> FilterResult<StateSeries> {
        let opts = self.filter_options();
        let mut states = match self.service.smooth(self.ssf(), &self.data, &opts, true) {
            Ok(states) => states,
            Err(FilterError::OutOfMemory { requested, limit }) => {
                warn!(requested, limit, "Smoothed covariances exceed memory, keeping means only");
                self.service.smooth(self.ssf(), &self.data, &opts, false)?
            }
            Err(err) => {
                warn!(error = %err, "Smoothing failed, retrying without diffuse covariances");
                let retry = FilterOptions { diffuse_covariances: false, ..opts };
                self.service.smooth(self.ssf(), &self.data, &retry, true)?
            }
        };
        states.rescale_covariances(self.scale_factor());
        Ok(states)
    }

    pub fn filtered_states(&self) -> FilterResult<StateSeries> {
        let opts = self.filter_options();
        let mut states = match self.service.filter(self.ssf(), &self.data, &opts, true) {
            Ok(states) => states.filtered,
            Err(FilterError::OutOfMemory { requested, limit }) => {
                warn!(requested, limit, "Filtered covariances exceed memory, keeping means only");
                let mut light = self.service.filter(self.ssf(), &self.data, &opts, false)?.filtered;
                light.mask_diffuse_prefix(false);
                light
            }
            Err(err) => return Err(err),
        };
        states.rescale_covariances(self.scale_factor());
        Ok(states)
    }

    pub fn one_step_ahead_states(&self) -> FilterResult<StateSeries> {
        let opts = self.filter_options();
        let mut states = match self.service.filter(self.ssf(), &self.data, &opts, true) {
            Ok(states) => states.predicted,
            Err(FilterError::OutOfMemory { requested, limit }) => {
                warn!(requested, limit, "Predicted covariances exceed memory, keeping means only");
                self.service.filter(self.ssf(), &self.data, &opts, false)?.predicted
            }
            Err(err) => return Err(err),
        };
        states.mask_diffuse_prefix(true);
        states.rescale_covariances(self.scale_factor());
        Ok(states)
    }

    /// Smoothed fitted value of `series` restricted to `components`
    /// (indices into `ssf().components()`; `None` keeps all of them).
    pub fn signal(&self, series: usize, components: Option<&[usize]>) -> Option<Array1<f64>> {
        let z = self.masked_loading(series, components)?;
        let states = self.smoothed_for_signal()?;
        Some(states.means.dot(&z))
    }

    /// Pointwise standard deviation of [`signal`](Self::signal); `None`
    /// additionally when covariances are unavailable.
    pub fn stdev_signal(&self, series: usize, components: Option<&[usize]>) -> Option<Array1<f64>> {
        let z = self.masked_loading(series, components)?;
        let states = self.smoothed_for_signal()?;
        let covariances = states.covariances?;
        Some(Array1::from_iter(covariances.iter().map(|v| {
            let q = z.dot(&v.dot(&z));
            if q <= 0.0 { 0.0 } else { q.sqrt() }
        })))
    }

    /// Standard errors of the free parameters (optimizer space).
    pub fn standard_errors(&self) -> ModelResult<Array1<f64>> {
        let theta = &self.state.free_parameters;
        if theta.is_empty() {
            return Ok(Array1::zeros(0));
        }
        let f = SsfFunction::new(&self.mapping, &self.service, self.filter_options());
        let loglik = |x: &Theta| f.value(x, &self.data);
        Ok(loglik_standard_errors(&loglik, theta)?)
    }

    pub fn information_criteria(&self) -> InformationCriteria {
        let lik = self.likelihood();
        let n_params = self.mapping.dim() + usize::from(lik.concentrated);
        let (k, n) = (n_params as f64, lik.n_obs as f64);
        InformationCriteria {
            n_params,
            aic: 2.0 * k - 2.0 * lik.log_likelihood,
            bic: k * n.ln() - 2.0 * lik.log_likelihood,
        }
    }

    /// Ljung–Box test on the standardized one-step-ahead prediction errors.
    pub fn ljung_box(&self, lags: usize) -> LBResult<LBOutcome> {
        let residuals = self.likelihood().residuals.to_vec();
        LBOutcome::ljung_box(&residuals, lags, self.mapping.dim())
    }

    // ---- Helper methods ----

    fn filter_options(&self) -> FilterOptions {
        self.options.filter_options()
    }

    fn smoothed_for_signal(&self) -> Option<StateSeries> {
        match self.smoothed_states() {
            Ok(states) => Some(states),
            Err(err) => {
                warn!(error = %err, "Smoothing failed, no signal available");
                None
            }
        }
    }

    /// Loading row of `series` with the columns of unselected components
    /// zeroed.
    fn masked_loading(&self, series: usize, components: Option<&[usize]>) -> Option<Array1<f64>> {
        let ssf = self.ssf();
        let z = ssf.loading_of_series(series)?.to_owned();
        let Some(selected) = components else {
            return Some(z);
        };
        let n_components = ssf.components().len();
        if selected.iter().any(|&c| c >= n_components) {
            return None;
        }
        let mut masked = Array1::zeros(z.len());
        for &c in selected {
            let start = ssf.component_positions()[c];
            let end = start + ssf.components()[c].dim();
            masked.slice_mut(s![start..end]).assign(&z.slice(s![start..end]));
        }
        Some(masked)
    }
}
