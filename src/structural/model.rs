//! Composite model front-end.
//!
//! [`CompositeModel`] collects [`ModelItem`]s in registration order and
//! turns them into a [`ModelMapping`]. `estimate` runs the
//! [`EstimationMonitor`] with the default [`UnivariateKalman`] service;
//! `estimate_with` accepts any [`FilteringService`].
//!
//! The model itself is never mutated by estimation: each call builds a
//! fresh mapping from deep copies of the items' parameters, so a model can
//! serve as a template for several fits.
use crate::structural::{
    core::{
        items::{ModelItem, Registration},
        options::MonitorOptions,
    },
    data::ObservationMatrix,
    errors::{ModelError, ModelResult},
    filter::{FilteringService, UnivariateKalman},
    mapping::ModelMapping,
    monitor::EstimationMonitor,
    results::EstimationResult,
};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct CompositeModel {
    items: Vec<ModelItem>,
}

impl CompositeModel {
    pub fn new() -> Self {
        CompositeModel { items: Vec::new() }
    }

    /// Register an item. Names must be unique across all items.
    pub fn add(&mut self, item: impl Into<ModelItem>) -> ModelResult<&mut Self> {
        let item = item.into();
        if self.items.iter().any(|other| other.name() == item.name()) {
            return Err(ModelError::DuplicateName { name: item.name().to_string() });
        }
        self.items.push(item);
        Ok(self)
    }

    pub fn items(&self) -> &[ModelItem] {
        &self.items
    }

    pub fn mapping(&self) -> ModelResult<ModelMapping> {
        let mut mapping = ModelMapping::new();
        for item in &self.items {
            mapping.add_item(item)?;
        }
        Ok(mapping)
    }

    pub fn estimate(
        &self, data: &ObservationMatrix, options: MonitorOptions,
    ) -> ModelResult<EstimationResult<UnivariateKalman>> {
        self.estimate_with(UnivariateKalman::new(), data, options)
    }

    pub fn estimate_with<S: FilteringService>(
        &self, service: S, data: &ObservationMatrix, options: MonitorOptions,
    ) -> ModelResult<EstimationResult<S>> {
        let mut mapping = self.mapping()?;
        let state = EstimationMonitor::new(&service, options.clone()).process(&mut mapping, data)?;
        info!(
            loglik = %format!("{:.6}", state.likelihood.log_likelihood),
            n_obs = state.likelihood.n_obs,
            free = mapping.dim(),
            auto_fixed = ?state.auto_fixed,
            outer_iterations = state.outer_iterations,
            "Composite model estimated"
        );
        Ok(EstimationResult::new(mapping, state, data.clone(), service, options))
    }
}
