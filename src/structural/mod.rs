//! structural — composite structural time-series estimation.
//!
//! Purpose
//! -------
//! Assemble state-space models out of reusable structural blocks, estimate
//! their parameters by maximum likelihood, and extract state estimates.
//!
//! Layout
//! ------
//! - [`core`]: parameter interpreters and domains, structural items, the
//!   composite system and its builder, options.
//! - [`data`]: the observation matrix.
//! - [`mapping`]: the model assembler between optimizer and model space.
//! - [`filter`]: the filtering-service contract and the univariate Kalman
//!   filter / smoother.
//! - [`monitor`]: staged estimation with degeneracy handling.
//! - [`results`]: state extraction with memory fallbacks and diagnostics.
//! - [`model`]: the [`model::CompositeModel`] front-end.
//!
//! Conventions
//! -----------
//! - Time runs along rows, series along columns; `NaN` marks a missing
//!   observation.
//! - Variance blocks are optimized on the standard-deviation scale.

pub mod core;
pub mod data;
pub mod errors;
pub mod filter;
pub mod mapping;
pub mod model;
pub mod monitor;
pub mod results;

pub mod prelude {
    pub use super::core::{
        items::{ModelConstraint, ModelEquation, ModelItem, Registration, StateItem, StateKind},
        options::{FilterOptions, MonitorOptions, OptimizerKind},
        params::ParameterInterpreter,
        ssf::CompositeSsf,
    };
    pub use super::data::ObservationMatrix;
    pub use super::errors::{FilterError, ModelError, ModelResult, ParamError};
    pub use super::filter::{FilteringService, Likelihood, StateSeries, UnivariateKalman};
    pub use super::mapping::ModelMapping;
    pub use super::model::CompositeModel;
    pub use super::monitor::{EstimationMonitor, EstimationState};
    pub use super::results::{EstimationResult, InformationCriteria};
}
