//! Structural items — the closed set of things that register into a model.
//!
//! Purpose
//! -------
//! Model the three kinds of contributors to a composite system as one sum
//! type, [`ModelItem`]:
//! - [`StateItem`]: a structural block adding state dimensions (level,
//!   trend, seasonal, cycle, autoregression, noise).
//! - [`ModelEquation`]: one observed linear measurement equation.
//! - [`ModelConstraint`]: a zero-variance equation asserting an exact
//!   linear relation between components.
//!
//! Every variant owns its [`ParameterInterpreter`]s exclusively and
//! implements [`Registration`]: given the resolved model-space values of
//! its own parameters (in `parameters()` order), it appends its piece to an
//! [`SsfBuilder`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Registration is deterministic: equal inputs produce equal systems.
//! - An equation variance declared fixed at exactly zero registers no
//!   interpreter; neither does a term coefficient fixed at exactly one.
//! - The implicit-loading path (`add_item`) rejects items with more than
//!   one default loading.
use crate::structural::{
    core::{
        params::ParameterInterpreter,
        ssf::{PendingTerm, SsfBuilder},
    },
    errors::{ModelError, ModelResult},
};
use ndarray::{Array1, ArrayView1};

/// Common registration capability of every model item.
pub trait Registration {
    fn name(&self) -> &str;

    fn parameters(&self) -> &[ParameterInterpreter];

    /// Append this item's contribution. `values` holds the model-space
    /// values of `parameters()`, concatenated in order.
    fn build(&self, values: ArrayView1<f64>, builder: &mut SsfBuilder) -> ModelResult<()>;

    /// Whether the item keeps the likelihood invariant under a common
    /// rescaling of all variances.
    fn is_scalable(&self) -> bool {
        true
    }
}

/// Catalog of structural block kinds (see `blocks` for their systems).
#[derive(Debug, Clone, PartialEq)]
pub enum StateKind {
    /// White noise.
    Noise,
    /// Random-walk level.
    LocalLevel,
    /// Level plus slope.
    LocalLinearTrend,
    /// Dummy seasonal with the given period.
    Seasonal(usize),
    /// Damped stochastic cycle.
    Cycle,
    /// Stationary autoregression of the given order.
    Ar(usize),
    /// Independent white noises, one default loading each.
    Noises(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateItem {
    pub(crate) name: String,
    pub(crate) kind: StateKind,
    pub(crate) params: Vec<ParameterInterpreter>,
    pub(crate) scalable: bool,
}

impl StateItem {
    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    /// Mutable access to one of the item's parameters by full name.
    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut ParameterInterpreter> {
        self.params.iter_mut().find(|p| p.name() == name)
    }

    /// Opt the item out of data rescaling and scale anchoring.
    pub fn non_scalable(mut self) -> Self {
        self.scalable = false;
        self
    }
}

impl Registration for StateItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[ParameterInterpreter] {
        &self.params
    }

    fn build(&self, values: ArrayView1<f64>, builder: &mut SsfBuilder) -> ModelResult<()> {
        builder.add_component(self.component(values)?)
    }

    fn is_scalable(&self) -> bool {
        self.scalable
    }
}

#[derive(Debug, Clone, PartialEq)]
struct EquationTerm {
    item: String,
    loading: Array1<f64>,
    /// Index into the equation's parameters; `None` means coefficient 1.
    coefficient: Option<usize>,
}

/// One observed linear measurement equation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEquation {
    name: String,
    has_variance: bool,
    params: Vec<ParameterInterpreter>,
    terms: Vec<EquationTerm>,
}

impl ModelEquation {
    /// New equation with innovation variance `variance`. A variance fixed
    /// at exactly zero registers no parameter.
    pub fn new(name: impl Into<String>, variance: f64, fixed: bool) -> ModelResult<Self> {
        let name = name.into();
        let mut params = Vec::new();
        let has_variance = !(fixed && variance == 0.0);
        if has_variance {
            params.push(ParameterInterpreter::variance(format!("{name}.var"), variance, fixed)?);
        }
        Ok(ModelEquation { name, has_variance, params, terms: Vec::new() })
    }

    /// Add `item` through its single default loading, coefficient 1.
    pub fn add_item(&mut self, item: &StateItem) -> ModelResult<&mut Self> {
        let loadings = item.default_loadings();
        if loadings.len() != 1 {
            return Err(ModelError::AmbiguousLoading {
                item: item.name.clone(),
                loadings: loadings.len(),
            });
        }
        self.add_loading(item, 0)
    }

    /// Add `item` through its default loading number `index`, coefficient 1.
    pub fn add_loading(&mut self, item: &StateItem, index: usize) -> ModelResult<&mut Self> {
        let loading = select_loading(item, index)?;
        self.terms.push(EquationTerm { item: item.name.clone(), loading, coefficient: None });
        Ok(self)
    }

    /// Add `item` (single default loading) multiplied by `coefficient`.
    /// A coefficient fixed at exactly one registers no parameter.
    pub fn add_scaled_item(
        &mut self, item: &StateItem, coefficient: f64, fixed: bool,
    ) -> ModelResult<&mut Self> {
        if fixed && coefficient == 1.0 {
            return self.add_item(item);
        }
        let loadings = item.default_loadings();
        if loadings.len() != 1 {
            return Err(ModelError::AmbiguousLoading {
                item: item.name.clone(),
                loadings: loadings.len(),
            });
        }
        let mut p = ParameterInterpreter::loading(
            format!("{}.{}.coeff", self.name, item.name),
            coefficient,
        )?;
        if fixed {
            p.fix();
        }
        let loading = loadings[0].clone();
        self.add_term(item.name.clone(), loading, p)
    }

    /// Add an explicit loading on component `item_name` multiplied by a
    /// scalar coefficient parameter.
    pub fn add_term(
        &mut self, item_name: impl Into<String>, loading: Array1<f64>,
        coefficient: ParameterInterpreter,
    ) -> ModelResult<&mut Self> {
        if coefficient.dim() != 1 {
            return Err(ModelError::DimensionMismatch {
                what: format!("coefficient {}", coefficient.name()),
                expected: 1,
                found: coefficient.dim(),
            });
        }
        self.params.push(coefficient);
        let index = self.params.len() - 1;
        self.terms.push(EquationTerm { item: item_name.into(), loading, coefficient: Some(index) });
        Ok(self)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut ParameterInterpreter> {
        self.params.iter_mut().find(|p| p.name() == name)
    }

    fn pending_terms(&self, values: ArrayView1<f64>) -> Vec<PendingTerm> {
        self.terms
            .iter()
            .map(|term| PendingTerm {
                component: term.item.clone(),
                loading: term.loading.clone(),
                coefficient: term.coefficient.map_or(1.0, |i| values[i]),
            })
            .collect()
    }
}

impl Registration for ModelEquation {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[ParameterInterpreter] {
        &self.params
    }

    fn build(&self, values: ArrayView1<f64>, builder: &mut SsfBuilder) -> ModelResult<()> {
        if values.len() != self.params.len() {
            return Err(ModelError::DimensionMismatch {
                what: format!("{} values", self.name),
                expected: self.params.len(),
                found: values.len(),
            });
        }
        let variance = if self.has_variance { values[0] } else { 0.0 };
        builder.add_observed(variance, self.pending_terms(values));
        Ok(())
    }
}

/// Zero-variance equation `Σ cᵢ zᵢ'α = target` with fixed coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConstraint {
    name: String,
    target: f64,
    terms: Vec<PendingTerm>,
}

impl ModelConstraint {
    pub fn new(name: impl Into<String>, target: f64) -> Self {
        ModelConstraint { name: name.into(), target, terms: Vec::new() }
    }

    /// Add `item` through its single default loading.
    pub fn add(&mut self, item: &StateItem, coefficient: f64) -> ModelResult<&mut Self> {
        let loadings = item.default_loadings();
        if loadings.len() != 1 {
            return Err(ModelError::AmbiguousLoading {
                item: item.name.clone(),
                loadings: loadings.len(),
            });
        }
        self.add_loading(item, 0, coefficient)
    }

    pub fn add_loading(
        &mut self, item: &StateItem, index: usize, coefficient: f64,
    ) -> ModelResult<&mut Self> {
        let loading = select_loading(item, index)?;
        self.terms.push(PendingTerm { component: item.name.clone(), loading, coefficient });
        Ok(self)
    }
}

impl Registration for ModelConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[ParameterInterpreter] {
        &[]
    }

    fn build(&self, _values: ArrayView1<f64>, builder: &mut SsfBuilder) -> ModelResult<()> {
        builder.add_constraint(self.target, self.terms.clone());
        Ok(())
    }

    /// A non-zero target is expressed in data units.
    fn is_scalable(&self) -> bool {
        self.target == 0.0
    }
}

/// Closed set of registrable items.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelItem {
    State(StateItem),
    Equation(ModelEquation),
    Constraint(ModelConstraint),
}

impl Registration for ModelItem {
    fn name(&self) -> &str {
        match self {
            ModelItem::State(item) => item.name(),
            ModelItem::Equation(eq) => eq.name(),
            ModelItem::Constraint(c) => c.name(),
        }
    }

    fn parameters(&self) -> &[ParameterInterpreter] {
        match self {
            ModelItem::State(item) => item.parameters(),
            ModelItem::Equation(eq) => eq.parameters(),
            ModelItem::Constraint(c) => c.parameters(),
        }
    }

    fn build(&self, values: ArrayView1<f64>, builder: &mut SsfBuilder) -> ModelResult<()> {
        match self {
            ModelItem::State(item) => item.build(values, builder),
            ModelItem::Equation(eq) => eq.build(values, builder),
            ModelItem::Constraint(c) => c.build(values, builder),
        }
    }

    fn is_scalable(&self) -> bool {
        match self {
            ModelItem::State(item) => item.is_scalable(),
            ModelItem::Equation(eq) => eq.is_scalable(),
            ModelItem::Constraint(c) => c.is_scalable(),
        }
    }
}

impl From<StateItem> for ModelItem {
    fn from(item: StateItem) -> Self {
        ModelItem::State(item)
    }
}

impl From<ModelEquation> for ModelItem {
    fn from(eq: ModelEquation) -> Self {
        ModelItem::Equation(eq)
    }
}

impl From<ModelConstraint> for ModelItem {
    fn from(c: ModelConstraint) -> Self {
        ModelItem::Constraint(c)
    }
}

// ---- Helper methods ----

fn select_loading(item: &StateItem, index: usize) -> ModelResult<Array1<f64>> {
    let mut loadings = item.default_loadings();
    if index >= loadings.len() {
        return Err(ModelError::LoadingOutOfRange {
            item: item.name.clone(),
            index,
            available: loadings.len(),
        });
    }
    Ok(loadings.swap_remove(index))
}
