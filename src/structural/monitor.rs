//! Estimation monitor — staged maximum likelihood with degeneracy handling.
//!
//! Purpose
//! -------
//! Drive one estimation run of a [`ModelMapping`] against an
//! [`ObservationMatrix`]: optimize the free parameters in bounded stages,
//! pin the likelihood scale when it is not identified, switch variances
//! that collapse to zero between free and fixed, and finish with a tight
//! final pass.
//!
//! Key behaviors
//! -------------
//! - [`SsfFunction`] adapts mapping + filtering service to the optimizer's
//!   [`LogLikelihood`] contract. Candidates are projected onto the domain
//!   (`ModelMapping::validate`) before mapping; least-squares residuals come
//!   from [`Likelihood::ls_residuals`].
//! - [`EstimationMonitor::process`] runs
//!   `anchor → outer { stage → fix/free probes → anchor swap →
//!   stabilization } → final pass` and returns an [`EstimationState`].
//! - Optimizer selection follows `MonitorOptions::effective_optimizer`; a
//!   failing backend is retried once with Nelder–Mead from the same start.
//! - A stage never accepts a point with a lower likelihood than its start.
//! - Probe evaluations that fail count as "no improvement" and are logged.
//!
//! Invariants & assumptions
//! ------------------------
//! - Exactly one block is fixed or freed per probe (best candidate only).
//! - When data are standardized by their sample standard deviation `s`,
//!   variances are scaled by `1/s²` on entry and `s²` on exit; the final
//!   likelihood is re-evaluated on the raw data. `history` stays on the
//!   working scale.
//! - An anchored (concentrated) fit keeps the anchor at [`SCALE_ANCHOR`]
//!   on exit. Its variances are relative to the anchor and
//!   `likelihood.scale` carries the raw-data scale.
//! - The mapping is mutated only between optimizations.
//!
//! Downstream usage
//! ----------------
//! - `CompositeModel::estimate` calls [`EstimationMonitor::process`] and
//!   wraps the state in an `EstimationResult`.
use crate::{
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{
            Cost, LogLikelihood, Theta, maximize, maximize_least_squares, maximize_nelder_mead,
            maximize_trust_region,
        },
    },
    structural::{
        core::{
            options::{FilterOptions, MonitorOptions, OptimizerKind},
            ssf::CompositeSsf,
        },
        data::ObservationMatrix,
        errors::ModelResult,
        filter::{FilteringService, Likelihood},
        mapping::ModelMapping,
    },
};
use ndarray::{Array1, s};
use tracing::{debug, info, warn};

/// Scale the largest variance is pinned to.
pub const SCALE_ANCHOR: f64 = 1.0;

/// Free-parameter log-likelihood of a mapped model.
#[derive(Debug, Clone)]
pub struct SsfFunction<'a, S> {
    mapping: &'a ModelMapping,
    service: &'a S,
    opts: FilterOptions,
}

impl<'a, S: FilteringService> SsfFunction<'a, S> {
    pub fn new(mapping: &'a ModelMapping, service: &'a S, opts: FilterOptions) -> Self {
        SsfFunction { mapping, service, opts }
    }

    /// Project `theta` onto the domain and resolve the system.
    pub fn system(&self, theta: &Theta) -> ModelResult<CompositeSsf> {
        let mut projected = theta.clone();
        self.mapping.validate(&mut projected)?;
        self.mapping.map(projected.view())
    }

    pub fn evaluate(&self, theta: &Theta, data: &ObservationMatrix) -> ModelResult<Likelihood> {
        let ssf = self.system(theta)?;
        Ok(self.service.likelihood(&ssf, data, &self.opts)?)
    }
}

impl<'a, S: FilteringService> LogLikelihood for SsfFunction<'a, S> {
    type Data = ObservationMatrix;

    fn value(&self, theta: &Theta, data: &ObservationMatrix) -> OptResult<Cost> {
        Ok(self.evaluate(theta, data)?.log_likelihood)
    }

    fn check(&self, theta: &Theta, data: &ObservationMatrix) -> OptResult<()> {
        if theta.len() != self.mapping.dim() {
            return Err(OptError::InvalidParameter {
                text: format!("expected {} free parameters, found {}", self.mapping.dim(), theta.len()),
            });
        }
        if data.n_series() != self.system(theta)?.n_series() {
            return Err(OptError::InvalidParameter {
                text: "data columns do not match the observed equations".to_string(),
            });
        }
        Ok(())
    }

    fn residuals(&self, theta: &Theta, data: &ObservationMatrix) -> OptResult<Array1<f64>> {
        Ok(self.evaluate(theta, data)?.ls_residuals())
    }
}

/// Snapshot of a finished estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationState {
    /// Free parameters (optimizer space) on the raw data scale.
    pub free_parameters: Array1<f64>,
    /// Full parameters (model space) on the raw data scale. After a
    /// concentrated fit the variances are relative to the anchor; multiply
    /// by `likelihood.scale` for absolute values
    /// (`EstimationResult::scaled_parameters`).
    pub parameters: Array1<f64>,
    /// Likelihood on the raw data.
    pub likelihood: Likelihood,
    pub ssf: CompositeSsf,
    /// Blocks fixed at zero by degeneracy handling.
    pub auto_fixed: Vec<usize>,
    /// Block pinned to [`SCALE_ANCHOR`], if any.
    pub anchor: Option<usize>,
    /// Log-likelihood after every outer iteration (working scale).
    pub history: Vec<f64>,
    pub outer_iterations: usize,
    /// Standard deviation the data were divided by (1 when not rescaled).
    pub data_scale: f64,
}

/// A free vector with its likelihood.
#[derive(Debug, Clone)]
struct Point {
    theta: Theta,
    lik: Likelihood,
}

impl Point {
    fn ll(&self) -> f64 {
        self.lik.log_likelihood
    }
}

#[derive(Debug, Clone)]
pub struct EstimationMonitor<'a, S> {
    service: &'a S,
    options: MonitorOptions,
}

impl<'a, S: FilteringService> EstimationMonitor<'a, S> {
    pub fn new(service: &'a S, options: MonitorOptions) -> Self {
        EstimationMonitor { service, options }
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    /// Run the full estimation; `mapping` ends with the fixed/free status of
    /// the final fit.
    pub fn process(
        &self, mapping: &mut ModelMapping, data: &ObservationMatrix,
    ) -> ModelResult<EstimationState> {
        let opts = &self.options;
        let data_scale = match (opts.rescale_data && mapping.is_scalable(), data.sample_std()) {
            (true, Some(s)) => s,
            _ => 1.0,
        };
        let work = if data_scale != 1.0 { data.scaled(1.0 / data_scale) } else { data.clone() };

        let mut full = mapping.model_parameters(mapping.default_parameters()?.view())?;
        if data_scale != 1.0 {
            mapping.rescale_variances(1.0 / (data_scale * data_scale), &mut full)?;
        }
        let mut anchor = None;
        if mapping.is_scalable() && opts.concentrated && !mapping.has_fixed_scale() {
            anchor = mapping.fix_max_variance(&mut full, SCALE_ANCHOR)?;
        }
        debug!(
            free = mapping.dim(),
            full = mapping.full_dim(),
            data_scale = %format!("{data_scale:.4e}"),
            anchor = ?anchor,
            optimizer = ?opts.effective_optimizer(),
            "Estimation started"
        );

        let theta = mapping.function_parameters(full.view())?;
        let mut point = Point { lik: self.evaluate(mapping, &theta, &work)?, theta };
        let mut auto_fixed: Vec<usize> = Vec::new();
        let mut history = Vec::new();
        let mut outer_iterations = 0;

        for iter in 0..opts.max_outer_iter {
            outer_iterations = iter + 1;
            let start_ll = point.ll();
            point = self.optimize(mapping, point, &work, opts.precision, opts.stage_max_iter)?;

            for _ in 0..=mapping.parameters().len() {
                let fixed = self.try_fix(mapping, &mut point, &work, &mut auto_fixed)?;
                let freed = self.try_free(mapping, &mut point, &work, &mut auto_fixed, fixed)?;
                if fixed.is_none() && freed.is_none() {
                    break;
                }
                point = self.optimize(mapping, point, &work, opts.precision, opts.stage_max_iter)?;
            }

            if let Some(current) = anchor {
                if let Some(swapped) = self.swap_anchor(mapping, current, &mut point, &work)? {
                    anchor = Some(swapped);
                    auto_fixed.clear();
                }
            }

            point = self.stabilize(mapping, point, &work)?;
            history.push(point.ll());
            debug!(
                iteration = outer_iterations,
                loglik = %format!("{:.6}", point.ll()),
                auto_fixed = auto_fixed.len(),
                "Outer iteration finished"
            );
            if (point.ll() - start_ll).abs() < opts.precision {
                break;
            }
        }

        point = self.optimize(mapping, point, &work, opts.final_precision, opts.final_max_iter)?;

        let mut full = mapping.model_parameters(point.theta.view())?;
        // Anchored variances stay relative to the anchor; the raw-data scale
        // factor of the concentrated likelihood absorbs s².
        if data_scale != 1.0 && anchor.is_none() {
            mapping.rescale_variances(data_scale * data_scale, &mut full)?;
        }
        let free_parameters = mapping.function_parameters(full.view())?;
        let ssf = mapping.map(free_parameters.view())?;
        let likelihood = self.service.likelihood(&ssf, data, &opts.filter_options())?;
        info!(
            loglik = %format!("{:.6}", likelihood.log_likelihood),
            outer_iterations,
            free = mapping.dim(),
            auto_fixed = ?auto_fixed,
            "Estimation finished"
        );

        Ok(EstimationState {
            free_parameters,
            parameters: full,
            likelihood,
            ssf,
            auto_fixed,
            anchor,
            history,
            outer_iterations,
            data_scale,
        })
    }

    // ---- Helper methods ----

    fn function<'m>(&self, mapping: &'m ModelMapping) -> SsfFunction<'m, S>
    where
        'a: 'm,
    {
        SsfFunction::new(mapping, self.service, self.options.filter_options())
    }

    fn evaluate(
        &self, mapping: &ModelMapping, theta: &Theta, data: &ObservationMatrix,
    ) -> ModelResult<Likelihood> {
        self.function(mapping).evaluate(theta, data)
    }

    /// One bounded optimization stage from `start`. Returns `start` when
    /// nothing better is found.
    fn optimize(
        &self, mapping: &ModelMapping, start: Point, data: &ObservationMatrix, precision: f64,
        max_iter: usize,
    ) -> ModelResult<Point> {
        if mapping.dim() == 0 {
            let lik = self.evaluate(mapping, &start.theta, data)?;
            return Ok(Point { theta: start.theta, lik });
        }
        let f = self.function(mapping);
        let mle = self.options.mle.with_budget(precision, max_iter)?;
        let theta0 = start.theta.clone();
        let kind = self.options.effective_optimizer();
        let outcome = match kind {
            OptimizerKind::QuasiNewton => maximize(&f, theta0.clone(), data, &mle),
            OptimizerKind::LevenbergMarquardt => maximize_least_squares(&f, theta0.clone(), data, &mle),
            OptimizerKind::TrustRegion => maximize_trust_region(&f, theta0.clone(), data, &mle),
        };
        let outcome = outcome.or_else(|err| {
            warn!(optimizer = ?kind, error = %err, "Optimizer failed, retrying with Nelder-Mead");
            maximize_nelder_mead(&f, theta0, data, &mle)
        });
        let candidate = match outcome {
            Ok(outcome) => outcome.theta_hat,
            Err(err) => {
                warn!(error = %err, "Stage failed, keeping start point");
                return Ok(start);
            }
        };

        let mut theta = candidate;
        mapping.validate(&mut theta)?;
        match f.evaluate(&theta, data) {
            Ok(lik) if lik.log_likelihood >= start.ll() => Ok(Point { theta, lik }),
            Ok(lik) => {
                debug!(
                    start = %format!("{:.6}", start.ll()),
                    candidate = %format!("{:.6}", lik.log_likelihood),
                    "Stage rejected a worse point"
                );
                Ok(start)
            }
            Err(err) => {
                warn!(error = %err, "Stage end point could not be evaluated");
                Ok(start)
            }
        }
    }

    /// Fix the small free variance whose removal costs the least
    /// likelihood (at most `fix_tolerance`). Returns the fixed block.
    fn try_fix(
        &self, mapping: &mut ModelMapping, point: &mut Point, data: &ObservationMatrix,
        auto_fixed: &mut Vec<usize>,
    ) -> ModelResult<Option<usize>> {
        let full = mapping.model_parameters(point.theta.view())?;
        let candidates = mapping.small_variances(full.view(), self.options.small_variance_eps);
        let mut best: Option<(usize, ModelMapping, Point)> = None;
        for index in candidates {
            match self.probe_fix(mapping, &full, index, data) {
                Ok((probe, trial)) => {
                    let acceptable = trial.ll() >= point.ll() - self.options.fix_tolerance;
                    let better = best.as_ref().map_or(true, |(_, _, b)| trial.ll() > b.ll());
                    if acceptable && better {
                        best = Some((index, probe, trial));
                    }
                }
                Err(err) => warn!(block = index, error = %err, "Fix probe failed"),
            }
        }
        let Some((index, probe, trial)) = best else {
            return Ok(None);
        };
        debug!(
            block = index,
            name = mapping.parameters()[index].name(),
            loglik = %format!("{:.6}", trial.ll()),
            "Variance fixed at zero"
        );
        *mapping = probe;
        *point = trial;
        auto_fixed.push(index);
        Ok(Some(index))
    }

    fn probe_fix(
        &self, mapping: &ModelMapping, full: &Array1<f64>, index: usize, data: &ObservationMatrix,
    ) -> ModelResult<(ModelMapping, Point)> {
        let mut probe = mapping.clone();
        let offset = probe.offset(index)?;
        let k = probe.parameters()[index].dim();
        let mut zeroed = full.clone();
        zeroed.slice_mut(s![offset..offset + k]).fill(0.0);
        probe.fix_parameter(index, zeroed.slice(s![offset..offset + k]))?;
        let theta = probe.function_parameters(zeroed.view())?;
        let lik = self.evaluate(&probe, &theta, data)?;
        Ok((probe, Point { theta, lik }))
    }

    /// Free the auto-fixed variance whose short re-optimization improves
    /// the likelihood the most. `skip` is the block fixed in the same probe.
    fn try_free(
        &self, mapping: &mut ModelMapping, point: &mut Point, data: &ObservationMatrix,
        auto_fixed: &mut Vec<usize>, skip: Option<usize>,
    ) -> ModelResult<Option<usize>> {
        let full = mapping.model_parameters(point.theta.view())?;
        let mut best: Option<(usize, ModelMapping, Point)> = None;
        for &index in auto_fixed.iter().filter(|i| Some(**i) != skip) {
            match self.probe_free(mapping, &full, index, data) {
                Ok((probe, trial)) => {
                    let improves = trial.ll() > point.ll() + self.options.precision;
                    let better = best.as_ref().map_or(true, |(_, _, b)| trial.ll() > b.ll());
                    if improves && better {
                        best = Some((index, probe, trial));
                    }
                }
                Err(err) => warn!(block = index, error = %err, "Free probe failed"),
            }
        }
        let Some((index, probe, trial)) = best else {
            return Ok(None);
        };
        debug!(block = index, loglik = %format!("{:.6}", trial.ll()), "Variance freed");
        *mapping = probe;
        *point = trial;
        auto_fixed.retain(|i| *i != index);
        Ok(Some(index))
    }

    fn probe_free(
        &self, mapping: &ModelMapping, full: &Array1<f64>, index: usize, data: &ObservationMatrix,
    ) -> ModelResult<(ModelMapping, Point)> {
        let mut probe = mapping.clone();
        let offset = probe.offset(index)?;
        let k = probe.parameters()[index].dim();
        let restart = 10.0 * self.options.small_variance_eps;
        let mut seeded = full.clone();
        seeded.slice_mut(s![offset..offset + k]).fill(restart * restart);
        probe.free_parameter(index, seeded.slice(s![offset..offset + k]))?;
        let theta = probe.function_parameters(seeded.view())?;
        let start = Point { lik: self.evaluate(&probe, &theta, data)?, theta };
        let trial = self.optimize(&probe, start, data, self.options.precision, self.options.stage_max_iter)?;
        Ok((probe, trial))
    }

    /// Move the anchor when another free variance now exceeds it. The
    /// concentrated likelihood is scale invariant, so the point is only
    /// re-expressed and re-evaluated.
    fn swap_anchor(
        &self, mapping: &mut ModelMapping, current: usize, point: &mut Point, data: &ObservationMatrix,
    ) -> ModelResult<Option<usize>> {
        let mut full = mapping.model_parameters(point.theta.view())?;
        let mut pos = 0;
        let mut dominant = false;
        for p in mapping.parameters() {
            if p.is_variance() && !p.is_fixed() && p.dim() == 1 && full[pos] > SCALE_ANCHOR {
                dominant = true;
            }
            pos += p.dim();
        }
        if !dominant {
            return Ok(None);
        }
        let offset = mapping.offset(current)?;
        mapping.free_parameter(current, full.slice(s![offset..offset + 1]))?;
        let Some(next) = mapping.fix_max_variance(&mut full, SCALE_ANCHOR)? else {
            return Ok(None);
        };
        let theta = mapping.function_parameters(full.view())?;
        *point = Point { lik: self.evaluate(mapping, &theta, data)?, theta };
        debug!(from = current, to = next, "Scale anchor moved");
        Ok(Some(next))
    }

    /// Hold every free scale-sensitive block at its value, re-optimize the
    /// rest, then release exactly those blocks.
    fn stabilize(
        &self, mapping: &mut ModelMapping, point: Point, data: &ObservationMatrix,
    ) -> ModelResult<Point> {
        let held: Vec<usize> = mapping
            .parameters()
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_fixed() && p.is_scale_sensitive(false))
            .map(|(i, _)| i)
            .collect();
        if held.is_empty() || held.len() == mapping.parameters().iter().filter(|p| !p.is_fixed()).count() {
            return Ok(point);
        }
        let full = mapping.model_parameters(point.theta.view())?;
        for &i in &held {
            let offset = mapping.offset(i)?;
            let k = mapping.parameters()[i].dim();
            mapping.fix_parameter(i, full.slice(s![offset..offset + k]))?;
        }
        let start = Point { theta: mapping.function_parameters(full.view())?, lik: point.lik };
        let stabilized = self.optimize(mapping, start, data, self.options.precision, self.options.stage_max_iter)?;

        let full = mapping.model_parameters(stabilized.theta.view())?;
        for &i in &held {
            let offset = mapping.offset(i)?;
            let k = mapping.parameters()[i].dim();
            mapping.free_parameter(i, full.slice(s![offset..offset + k]))?;
        }
        let theta = mapping.function_parameters(full.view())?;
        Ok(Point { theta, lik: stabilized.lik })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structural::{
        core::items::{ModelEquation, ModelItem, StateItem},
        errors::{FilterError, FilterResult},
        filter::{FilteredStates, StateSeries, UnivariateKalman},
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The optimizer adapter (`SsfFunction`) against the filtering service.
    // - Estimation of a model without free parameters.
    // - Fixing of a collapsed variance and its bookkeeping.
    // - Failed fix/free evaluations treated as no improvement.
    // - Freeing of a variance that was fixed too early.
    // - Anchor swap and the stabilization cycle.
    // - Nelder–Mead retry and rejection of worse stage end points.
    // -------------------------------------------------------------------------

    /// Kalman filter that fails for every system matching `fails`.
    struct Selective<F> {
        fails: F,
    }

    impl<F: Fn(&CompositeSsf) -> bool> FilteringService for Selective<F> {
        fn likelihood(
            &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
        ) -> FilterResult<Likelihood> {
            if (self.fails)(ssf) {
                return Err(FilterError::NonFiniteState { t: 0, what: "prediction variance" });
            }
            UnivariateKalman.likelihood(ssf, data, opts)
        }

        fn filter(
            &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
            covariances: bool,
        ) -> FilterResult<FilteredStates> {
            UnivariateKalman.filter(ssf, data, opts, covariances)
        }

        fn smooth(
            &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
            covariances: bool,
        ) -> FilterResult<StateSeries> {
            UnivariateKalman.smooth(ssf, data, opts, covariances)
        }
    }

    /// Kalman filter whose residuals are all NaN; the likelihood value is
    /// intact.
    struct NanResiduals;

    impl FilteringService for NanResiduals {
        fn likelihood(
            &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
        ) -> FilterResult<Likelihood> {
            let mut lik = UnivariateKalman.likelihood(ssf, data, opts)?;
            lik.residuals.fill(f64::NAN);
            Ok(lik)
        }

        fn filter(
            &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
            covariances: bool,
        ) -> FilterResult<FilteredStates> {
            UnivariateKalman.filter(ssf, data, opts, covariances)
        }

        fn smooth(
            &self, ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
            covariances: bool,
        ) -> FilterResult<StateSeries> {
            UnivariateKalman.smooth(ssf, data, opts, covariances)
        }
    }

    /// Quasi-Newton on the plain likelihood, raw data.
    fn plain_options() -> MonitorOptions {
        MonitorOptions {
            optimizer: OptimizerKind::QuasiNewton,
            concentrated: false,
            rescale_data: false,
            ..MonitorOptions::default()
        }
    }

    fn start<S: FilteringService>(
        monitor: &EstimationMonitor<'_, S>, mapping: &ModelMapping, data: &ObservationMatrix,
    ) -> Point {
        let theta = mapping.default_parameters().expect("defaults");
        let lik = monitor.evaluate(mapping, &theta, data).expect("lik");
        Point { theta, lik }
    }

    fn level_mapping(level_var: f64, noise_var: f64, noise_fixed: bool) -> ModelMapping {
        let level = StateItem::local_level("level", level_var).expect("level");
        let mut eq = ModelEquation::new("y", noise_var, noise_fixed).expect("eq");
        eq.add_item(&level).expect("term");
        let mut m = ModelMapping::new();
        m.add_item(&ModelItem::from(level)).expect("level");
        m.add_item(&ModelItem::from(eq)).expect("eq");
        m
    }

    fn data() -> ObservationMatrix {
        ObservationMatrix::from_series(array![0.3, 0.9, 0.4, 1.3, 1.1, 1.8, 1.5, 2.4, 2.0, 2.6, 3.1, 2.7])
            .expect("data")
    }

    #[test]
    // Purpose
    // -------
    // `SsfFunction` reports the service's likelihood at the mapped system
    // and rejects vectors of the wrong length.
    //
    // Given
    // -----
    // - Local level with both variances free.
    //
    // Expect
    // ------
    // - value == likelihood(map(θ)); check fails for a short θ.
    fn ssf_function_matches_service() {
        let mapping = level_mapping(0.5, 1.0, false);
        let service = UnivariateKalman;
        let opts = FilterOptions::default();
        let f = SsfFunction::new(&mapping, &service, opts.clone());
        let theta = mapping.default_parameters().expect("defaults");

        let value = f.value(&theta, &data()).expect("value");
        let ssf = mapping.map(theta.view()).expect("ssf");
        let direct = service.likelihood(&ssf, &data(), &opts).expect("direct");

        assert_eq!(value, direct.log_likelihood);
        assert!(matches!(
            f.check(&array![1.0], &data()),
            Err(OptError::InvalidParameter { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // A model without free parameters is evaluated directly.
    //
    // Given
    // -----
    // - Both variances fixed; no rescaling.
    //
    // Expect
    // ------
    // - Parameters unchanged and the likelihood equals a direct evaluation.
    fn all_fixed_model_is_evaluated_once() {
        // Arrange
        let mut mapping = level_mapping(0.5, 1.0, true);
        let full = array![0.5, 1.0];
        mapping.fix_model_parameters(|_| true, full.view()).expect("fix");
        let mut options = MonitorOptions::default();
        options.rescale_data = false;
        let service = UnivariateKalman;

        // Act
        let state = EstimationMonitor::new(&service, options.clone())
            .process(&mut mapping, &data())
            .expect("estimate");

        // Assert
        let direct = service
            .likelihood(&mapping.map_full(full.view()).expect("ssf"), &data(), &options.filter_options())
            .expect("direct");
        assert_eq!(state.parameters, full);
        assert_eq!(state.anchor, None);
        assert_relative_eq!(state.likelihood.log_likelihood, direct.log_likelihood, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // A variance already at (numerically) zero is fixed by the probe.
    //
    // Given
    // -----
    // - Level variance 1e-12 (below the 1e-3 stdev cutoff), noise free.
    //
    // Expect
    // ------
    // - Block 0 fixed at 0 and recorded as auto-fixed; likelihood within
    //   the fix tolerance.
    fn collapsed_variance_is_fixed() {
        // Arrange
        let mut mapping = level_mapping(1e-12, 1.0, false);
        let service = UnivariateKalman;
        let monitor = EstimationMonitor::new(&service, MonitorOptions::default());
        let theta = mapping.default_parameters().expect("defaults");
        let lik = monitor.evaluate(&mapping, &theta, &data()).expect("lik");
        let mut point = Point { theta, lik };
        let before = point.ll();
        let mut auto_fixed = Vec::new();

        // Act
        let fixed = monitor.try_fix(&mut mapping, &mut point, &data(), &mut auto_fixed).expect("probe");

        // Assert
        assert_eq!(fixed, Some(0));
        assert_eq!(auto_fixed, vec![0]);
        assert!(mapping.parameters()[0].is_fixed());
        assert_eq!(mapping.parameters()[0].values()[0], 0.0);
        assert_eq!(mapping.dim(), 1);
        assert!(point.ll() >= before - MonitorOptions::default().fix_tolerance);
    }

    #[test]
    // Purpose
    // -------
    // A fix attempt whose evaluation fails leaves the estimation untouched.
    //
    // Given
    // -----
    // - Level variance 1e-12 (a fix candidate) and a service that fails
    //   whenever the level variance is exactly zero.
    //
    // Expect
    // ------
    // - No block fixed; mapping, point and auto-fixed list unchanged.
    fn failed_fix_attempt_is_no_improvement() {
        // Arrange
        let mut mapping = level_mapping(1e-12, 1.0, false);
        let service = Selective { fails: |ssf: &CompositeSsf| ssf.innovation()[[0, 0]] == 0.0 };
        let monitor = EstimationMonitor::new(&service, MonitorOptions::default());
        let mut point = start(&monitor, &mapping, &data());
        let (before_blocks, before_theta) = (mapping.parameters().to_vec(), point.theta.clone());
        let mut auto_fixed = Vec::new();

        // Act
        let fixed = monitor.try_fix(&mut mapping, &mut point, &data(), &mut auto_fixed).expect("attempt");

        // Assert
        assert_eq!(fixed, None);
        assert!(auto_fixed.is_empty());
        assert_eq!(mapping.parameters(), before_blocks.as_slice());
        assert_eq!(point.theta, before_theta);
    }

    #[test]
    // Purpose
    // -------
    // A free attempt whose evaluation fails leaves the variance fixed.
    //
    // Given
    // -----
    // - Level variance auto-fixed at zero and a service that fails whenever
    //   the level variance is positive.
    //
    // Expect
    // ------
    // - No block freed; block 0 still fixed at zero and still auto-fixed.
    fn failed_free_attempt_is_no_improvement() {
        // Arrange
        let mut mapping = level_mapping(0.0, 1.0, false);
        mapping.fix_parameter(0, array![0.0].view()).expect("fix");
        let service = Selective { fails: |ssf: &CompositeSsf| ssf.innovation()[[0, 0]] > 0.0 };
        let monitor = EstimationMonitor::new(&service, plain_options());
        let mut point = start(&monitor, &mapping, &data());
        let before = point.ll();
        let mut auto_fixed = vec![0];

        // Act
        let freed =
            monitor.try_free(&mut mapping, &mut point, &data(), &mut auto_fixed, None).expect("attempt");

        // Assert
        assert_eq!(freed, None);
        assert_eq!(auto_fixed, vec![0]);
        assert!(mapping.parameters()[0].is_fixed());
        assert_eq!(mapping.parameters()[0].values()[0], 0.0);
        assert_eq!(point.ll(), before);
    }

    #[test]
    // Purpose
    // -------
    // A level variance fixed at zero on trending data is released because
    // re-optimizing it raises the likelihood.
    //
    // Given
    // -----
    // - The trending series, level variance auto-fixed at zero, noise
    //   optimized under that restriction.
    //
    // Expect
    // ------
    // - Block 0 freed and dropped from the auto-fixed list; the likelihood
    //   strictly improves.
    fn try_free_releases_variance_that_helps() {
        // Arrange
        let mut mapping = level_mapping(0.0, 1.0, false);
        mapping.fix_parameter(0, array![0.0].view()).expect("fix");
        let service = UnivariateKalman;
        let options = plain_options();
        let monitor = EstimationMonitor::new(&service, options.clone());
        let initial = start(&monitor, &mapping, &data());
        let mut point = monitor
            .optimize(&mapping, initial, &data(), options.precision, options.stage_max_iter)
            .expect("restricted fit");
        let restricted = point.ll();
        let mut auto_fixed = vec![0];

        // Act
        let freed =
            monitor.try_free(&mut mapping, &mut point, &data(), &mut auto_fixed, None).expect("attempt");

        // Assert
        assert_eq!(freed, Some(0));
        assert!(auto_fixed.is_empty());
        assert!(!mapping.parameters()[0].is_fixed());
        assert_eq!(mapping.dim(), 2);
        assert!(point.ll() > restricted + options.precision);
    }

    #[test]
    // Purpose
    // -------
    // When a free variance outgrows the anchor, the anchor moves to it and
    // the concentrated likelihood is unchanged.
    //
    // Given
    // -----
    // - Concentrated options; noise anchored at 1 and level variance 3.
    //
    // Expect
    // ------
    // - Level becomes the anchor at 1, noise is freed at 1/3, and the
    //   log-likelihood agrees within 1e-4.
    fn swap_anchor_moves_scale_to_dominant_variance() {
        // Arrange
        let mut mapping = level_mapping(3.0, 1.0, false);
        mapping.fix_parameter(1, array![SCALE_ANCHOR].view()).expect("anchor");
        let service = UnivariateKalman;
        let monitor = EstimationMonitor::new(&service, MonitorOptions::default());
        let mut point = start(&monitor, &mapping, &data());
        let before = point.ll();

        // Act
        let swapped = monitor.swap_anchor(&mut mapping, 1, &mut point, &data()).expect("swap");

        // Assert
        assert_eq!(swapped, Some(0));
        assert!(mapping.parameters()[0].is_fixed());
        assert_eq!(mapping.parameters()[0].values()[0], SCALE_ANCHOR);
        assert!(!mapping.parameters()[1].is_fixed());
        let full = mapping.model_parameters(point.theta.view()).expect("full");
        assert_relative_eq!(full[1], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(point.ll(), before, epsilon = 1e-4);
    }

    #[test]
    // Purpose
    // -------
    // Stabilization re-optimizes only the non-variance blocks and then
    // releases exactly the blocks it held.
    //
    // Given
    // -----
    // - level + AR(1) + observation noise, all free, AR coefficient −0.5.
    //
    // Expect
    // ------
    // - Same fixed/free status as before; variances unchanged; likelihood
    //   not lower.
    fn stabilize_holds_variances_and_releases_them() {
        // Arrange
        let level = StateItem::local_level("level", 0.2).expect("level");
        let ar = StateItem::ar("ar", array![-0.5], 0.3).expect("ar");
        let mut eq = ModelEquation::new("y", 0.5, false).expect("eq");
        eq.add_item(&level).expect("level").add_item(&ar).expect("ar");
        let mut mapping = ModelMapping::new();
        for item in [ModelItem::from(level), ar.into(), eq.into()] {
            mapping.add_item(&item).expect("add");
        }
        let service = UnivariateKalman;
        let monitor = EstimationMonitor::new(&service, plain_options());
        let point = start(&monitor, &mapping, &data());
        let (before_ll, before_dim) = (point.ll(), mapping.dim());
        let before_full = mapping.model_parameters(point.theta.view()).expect("full");

        // Act
        let stabilized = monitor.stabilize(&mut mapping, point, &data()).expect("stabilize");

        // Assert
        assert_eq!(mapping.dim(), before_dim);
        assert!(mapping.parameters().iter().all(|p| !p.is_fixed()));
        let after = mapping.model_parameters(stabilized.theta.view()).expect("full");
        for i in (0..mapping.parameters().len()).filter(|i| mapping.parameters()[*i].is_variance()) {
            let offset = mapping.offset(i).expect("offset");
            assert_relative_eq!(after[offset], before_full[offset], max_relative = 1e-12);
        }
        assert!(stabilized.ll() >= before_ll);
    }

    #[test]
    // Purpose
    // -------
    // A least-squares stage that cannot use the residuals falls back to
    // Nelder–Mead and still improves.
    //
    // Given
    // -----
    // - Levenberg–Marquardt on the concentrated likelihood, a service with
    //   NaN residuals, noise fixed at 1 and level variance started at 25.
    //
    // Expect
    // ------
    // - The stage ends strictly above its start.
    fn nelder_mead_takes_over_when_residuals_are_invalid() {
        // Arrange
        let mapping = level_mapping(25.0, 1.0, true);
        let service = NanResiduals;
        let options = MonitorOptions { rescale_data: false, ..MonitorOptions::default() };
        assert_eq!(options.effective_optimizer(), OptimizerKind::LevenbergMarquardt);
        let monitor = EstimationMonitor::new(&service, options.clone());
        let initial = start(&monitor, &mapping, &data());
        let before = initial.ll();

        // Act
        let end = monitor
            .optimize(&mapping, initial, &data(), options.precision, options.stage_max_iter)
            .expect("stage");

        // Assert
        assert!(end.ll() > before + 1e-6);
        assert!(end.theta[0].abs() < 5.0);
    }

    #[test]
    // Purpose
    // -------
    // A stage never returns a point below its start.
    //
    // Given
    // -----
    // - A start whose recorded log-likelihood (1e10) no real point reaches.
    //
    // Expect
    // ------
    // - The start is returned unchanged.
    fn optimize_rejects_worse_end_point() {
        // Arrange
        let mapping = level_mapping(0.5, 1.0, false);
        let service = UnivariateKalman;
        let options = plain_options();
        let monitor = EstimationMonitor::new(&service, options.clone());
        let mut initial = start(&monitor, &mapping, &data());
        initial.lik.log_likelihood = 1e10;
        let theta = initial.theta.clone();

        // Act
        let end = monitor
            .optimize(&mapping, initial, &data(), options.precision, options.stage_max_iter)
            .expect("stage");

        // Assert
        assert_eq!(end.theta, theta);
        assert_eq!(end.ll(), 1e10);
    }
}
