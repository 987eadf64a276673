//! Errors for the structural estimation engine (parameter blocks, model
//! assembly, filtering, and staged estimation).
//!
//! Three layered error types live here:
//! - [`ParamError`]: construction and cursor failures of parameter blocks and
//!   their domains.
//! - [`FilterError`]: failures of the filtering service, including the
//!   out-of-memory condition that drives the state-extraction fallbacks.
//! - [`ModelError`]: assembly and estimation failures; wraps the other two
//!   and the optimizer's [`OptError`].
//!
//! ## Conventions
//! - **Indices are 0-based.** Block indices refer to the mapping's
//!   registration order, series indices to data columns.
//! - Evaluation failures raised *inside* the optimizer are flattened into
//!   [`OptError::LikelihoodEvaluation`] so the solver layer stays agnostic of
//!   the model.
use crate::optimization::errors::OptError;

/// Result alias for parameter-block operations that may produce [`ParamError`].
pub type ParamResult<T> = Result<T, ParamError>;

/// Result alias for filtering-service operations that may produce
/// [`FilterError`].
pub type FilterResult<T> = Result<T, FilterError>;

/// Result alias for assembly and estimation paths that may produce
/// [`ModelError`].
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by parameter interpreters, domains and the parameter cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamError {
    /// A parameter block needs at least one coordinate.
    EmptyBlock { name: String },

    /// Values, bounds or domain disagree on the block dimension.
    DimensionMismatch { name: String, expected: usize, found: usize },

    /// Parameter values must be finite.
    NonFiniteValue { name: String, index: usize, value: f64 },

    /// Variances must be non-negative.
    NegativeVariance { name: String, value: f64 },

    /// Lower bound must be strictly below the upper bound.
    InvalidBounds { index: usize, lower: f64, upper: f64 },

    /// Numeric step and boundary epsilon must be finite and > 0.
    InvalidEpsilon { value: f64 },

    /// The cursor ran past the end of its buffer.
    ReaderExhausted { requested: usize, remaining: usize },

    /// A write would run past the end of the output buffer.
    BufferOverflow { position: usize, needed: usize, len: usize },

    /// Block index outside the registered parameter list.
    UnknownBlock { index: usize, len: usize },
}

impl std::error::Error for ParamError {}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamError::EmptyBlock { name } => {
                write!(f, "Parameter block '{name}' must have at least one coordinate.")
            }
            ParamError::DimensionMismatch { name, expected, found } => {
                write!(f, "Parameter block '{name}': expected dimension {expected}, got {found}")
            }
            ParamError::NonFiniteValue { name, index, value } => {
                write!(f, "Parameter block '{name}' has a non-finite value at index {index}: {value}")
            }
            ParamError::NegativeVariance { name, value } => {
                write!(f, "Variance block '{name}' must be non-negative; got {value}")
            }
            ParamError::InvalidBounds { index, lower, upper } => {
                write!(f, "Bounds at index {index} must satisfy lower < upper; got [{lower}, {upper}]")
            }
            ParamError::InvalidEpsilon { value } => {
                write!(f, "Domain epsilon must be finite and > 0; got {value}")
            }
            ParamError::ReaderExhausted { requested, remaining } => {
                write!(f, "Parameter reader exhausted: requested {requested}, {remaining} remaining")
            }
            ParamError::BufferOverflow { position, needed, len } => {
                write!(
                    f,
                    "Cannot write {needed} values at position {position} into a buffer of length {len}"
                )
            }
            ParamError::UnknownBlock { index, len } => {
                write!(f, "Parameter block index {index} out of range for {len} blocks")
            }
        }
    }
}

/// Errors raised by the filtering service.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// The requested storage exceeds the configured memory budget, or the
    /// allocator refused it.
    OutOfMemory { requested: usize, limit: usize },

    /// Observation matrix has no rows.
    EmptyData,

    /// Data columns do not match the number of observed equations.
    SeriesCountMismatch { expected: usize, found: usize },

    /// The system has no state.
    EmptySystem,

    /// Recursions produced a non-finite quantity.
    NonFiniteState { t: usize, what: &'static str },

    /// No observation contributed to the likelihood.
    NoObservations,

    /// Checkpoint block size must be at least 1.
    InvalidBlockSize { block: usize },
}

impl std::error::Error for FilterError {}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::OutOfMemory { requested, limit } => {
                write!(f, "Out of memory: requested {requested} bytes with a limit of {limit} bytes")
            }
            FilterError::EmptyData => write!(f, "Observation matrix is empty."),
            FilterError::SeriesCountMismatch { expected, found } => {
                write!(f, "Data has {found} series but the system observes {expected}")
            }
            FilterError::EmptySystem => write!(f, "State-space system has no state."),
            FilterError::NonFiniteState { t, what } => {
                write!(f, "Non-finite {what} at time index {t}")
            }
            FilterError::NoObservations => {
                write!(f, "No observation contributed to the likelihood.")
            }
            FilterError::InvalidBlockSize { block } => {
                write!(f, "Checkpoint block size must be >= 1; got {block}")
            }
        }
    }
}

/// Errors raised while assembling or estimating a composite model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    // ---- Assembly ----
    /// An equation term references a component that was never registered.
    UnknownComponent { name: String },

    /// Two items or components share a name.
    DuplicateName { name: String },

    /// The implicit-loading path was used on an item with several loadings.
    AmbiguousLoading { item: String, loadings: usize },

    /// Explicit loading index outside the item's default loadings.
    LoadingOutOfRange { item: String, index: usize, available: usize },

    /// Matrix or vector dimensions disagree.
    DimensionMismatch { what: String, expected: usize, found: usize },

    /// Seasonal periods must be at least 2; cycle periods above 2.
    InvalidPeriod { period: f64 },

    /// Autoregressive blocks need at least one coefficient.
    InvalidOrder { order: usize },

    /// The stationary initial covariance could not be solved for.
    SingularLyapunov { component: String },

    /// A build step references parameter blocks that do not exist.
    InvalidStepRange { start: usize, end: usize, len: usize },

    /// Model has no observed equation.
    NoEquations,

    // ---- Options ----
    /// Monitor / filter option outside its admissible range.
    InvalidOption { name: &'static str, reason: &'static str },

    /// Unknown optimizer name.
    InvalidOptimizer { name: String },

    // ---- Layers ----
    Param(ParamError),
    Filter(FilterError),
    Optimization(OptError),
}

impl std::error::Error for ModelError {}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::UnknownComponent { name } => {
                write!(f, "Unknown component '{name}' referenced by an equation")
            }
            ModelError::DuplicateName { name } => write!(f, "Duplicate item name '{name}'"),
            ModelError::AmbiguousLoading { item, loadings } => {
                write!(
                    f,
                    "Item '{item}' has {loadings} default loadings; select one explicitly"
                )
            }
            ModelError::LoadingOutOfRange { item, index, available } => {
                write!(f, "Item '{item}' has {available} loadings; index {index} is out of range")
            }
            ModelError::DimensionMismatch { what, expected, found } => {
                write!(f, "Dimension mismatch for {what}: expected {expected}, got {found}")
            }
            ModelError::InvalidPeriod { period } => write!(f, "Invalid period: {period}"),
            ModelError::InvalidOrder { order } => {
                write!(f, "Autoregressive order must be >= 1; got {order}")
            }
            ModelError::SingularLyapunov { component } => {
                write!(f, "Stationary covariance of '{component}' could not be computed")
            }
            ModelError::InvalidStepRange { start, end, len } => {
                write!(f, "Build step uses blocks {start}..{end} but only {len} are registered")
            }
            ModelError::NoEquations => write!(f, "Model has no observed equation."),
            ModelError::InvalidOption { name, reason } => {
                write!(f, "Invalid option '{name}': {reason}")
            }
            ModelError::InvalidOptimizer { name } => {
                write!(
                    f,
                    "Invalid optimizer '{name}'; expected 'quasi-newton', 'levenberg-marquardt' or 'trust-region'"
                )
            }
            ModelError::Param(err) => write!(f, "{err}"),
            ModelError::Filter(err) => write!(f, "{err}"),
            ModelError::Optimization(err) => write!(f, "Optimization failed: {err}"),
        }
    }
}

impl From<ParamError> for ModelError {
    fn from(err: ParamError) -> ModelError {
        ModelError::Param(err)
    }
}

impl From<FilterError> for ModelError {
    fn from(err: FilterError) -> ModelError {
        ModelError::Filter(err)
    }
}

impl From<OptError> for ModelError {
    fn from(err: OptError) -> ModelError {
        ModelError::Optimization(err)
    }
}

impl From<ModelError> for OptError {
    fn from(err: ModelError) -> OptError {
        match err {
            ModelError::Optimization(inner) => inner,
            other => OptError::LikelihoodEvaluation { text: other.to_string() },
        }
    }
}

impl From<FilterError> for OptError {
    fn from(err: FilterError) -> OptError {
        OptError::LikelihoodEvaluation { text: err.to_string() }
    }
}
