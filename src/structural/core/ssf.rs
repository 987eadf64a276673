//! Composite state-space system and its builder.
//!
//! Purpose
//! -------
//! Hold the concrete linear-Gaussian system produced by resolving a model:
//! a block-diagonal state made of named [`SsfComponent`]s, plus an ordered
//! list of univariate [`MeasurementEquation`]s. Structural items append
//! their pieces to an [`SsfBuilder`]; `build` resolves term references by
//! component name and lays out the state.
//!
//! Key behaviors
//! -------------
//! - Component `i` occupies state rows `positions[i] .. positions[i] + dim`.
//! - Observed equations are numbered in registration order; equation `j`
//!   with `EquationSource::Observed(j)` reads data column `j`.
//! - Constraint equations carry their target value and a zero variance;
//!   they condition the state but occupy no data column.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every component matrix is square and matches the component dimension.
//! - Building twice from the same inputs produces identical systems.
use crate::structural::errors::{ModelError, ModelResult};
use ndarray::{Array1, Array2, ArrayView1, s};

/// One structural block's contribution to the state.
#[derive(Debug, Clone, PartialEq)]
pub struct SsfComponent {
    pub name: String,
    /// Transition matrix.
    pub t: Array2<f64>,
    /// Innovation covariance.
    pub v: Array2<f64>,
    /// Initial mean.
    pub a0: Array1<f64>,
    /// Stationary part of the initial covariance.
    pub p0: Array2<f64>,
    /// Diffuse part of the initial covariance.
    pub pi0: Array2<f64>,
    /// Default loadings (rows over the component state).
    pub loadings: Vec<Array1<f64>>,
}

impl SsfComponent {
    pub fn new(
        name: impl Into<String>, t: Array2<f64>, v: Array2<f64>, p0: Array2<f64>,
        pi0: Array2<f64>, loadings: Vec<Array1<f64>>,
    ) -> ModelResult<Self> {
        let name = name.into();
        let dim = t.nrows();
        for (what, m) in [("transition", &t), ("innovation", &v), ("p0", &p0), ("pi0", &pi0)] {
            if m.nrows() != dim || m.ncols() != dim {
                return Err(ModelError::DimensionMismatch {
                    what: format!("{name}.{what}"),
                    expected: dim,
                    found: if m.nrows() != dim { m.nrows() } else { m.ncols() },
                });
            }
        }
        if let Some(bad) = loadings.iter().find(|l| l.len() != dim) {
            return Err(ModelError::DimensionMismatch {
                what: format!("{name}.loading"),
                expected: dim,
                found: bad.len(),
            });
        }
        Ok(SsfComponent { name, t, v, a0: Array1::zeros(dim), p0, pi0, loadings })
    }

    pub fn dim(&self) -> usize {
        self.t.nrows()
    }

    /// Number of diffuse directions (non-zero diagonal entries of `pi0`).
    pub fn diffuse_dim(&self) -> usize {
        self.pi0.diag().iter().filter(|d| **d != 0.0).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EquationSource {
    /// Reads the given data column.
    Observed(usize),
    /// Exact linear restriction with this target value.
    Constraint(f64),
}

/// A measurement term before name resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTerm {
    pub component: String,
    pub loading: Array1<f64>,
    pub coefficient: f64,
}

/// One resolved univariate measurement equation `y = z'α + ε`,
/// `ε ~ N(0, variance)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementEquation {
    pub source: EquationSource,
    pub variance: f64,
    /// Full-state loading row `z`.
    pub z: Array1<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSsf {
    components: Vec<SsfComponent>,
    positions: Vec<usize>,
    equations: Vec<MeasurementEquation>,
    n_series: usize,
    t: Array2<f64>,
    v: Array2<f64>,
    a0: Array1<f64>,
    p0: Array2<f64>,
    pi0: Array2<f64>,
}

impl CompositeSsf {
    pub fn state_dim(&self) -> usize {
        self.t.nrows()
    }

    pub fn diffuse_dim(&self) -> usize {
        self.components.iter().map(SsfComponent::diffuse_dim).sum()
    }

    /// State offset at which each component begins, in registration order.
    pub fn component_positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn components(&self) -> &[SsfComponent] {
        &self.components
    }

    pub fn equations(&self) -> &[MeasurementEquation] {
        &self.equations
    }

    /// Number of observed series (data columns).
    pub fn n_series(&self) -> usize {
        self.n_series
    }

    /// Loading row of the equation that reads data column `series`.
    pub fn loading_of_series(&self, series: usize) -> Option<ArrayView1<'_, f64>> {
        self.equations
            .iter()
            .find(|eq| matches!(eq.source, EquationSource::Observed(j) if j == series))
            .map(|eq| eq.z.view())
    }

    pub fn transition(&self) -> &Array2<f64> {
        &self.t
    }

    pub fn innovation(&self) -> &Array2<f64> {
        &self.v
    }

    pub fn initial_mean(&self) -> &Array1<f64> {
        &self.a0
    }

    pub fn initial_covariance(&self) -> &Array2<f64> {
        &self.p0
    }

    pub fn initial_diffuse(&self) -> &Array2<f64> {
        &self.pi0
    }
}

/// Collects components and equations while a model is being resolved.
#[derive(Debug, Default, Clone)]
pub struct SsfBuilder {
    components: Vec<SsfComponent>,
    equations: Vec<(EquationSource, f64, Vec<PendingTerm>)>,
    n_series: usize,
}

impl SsfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(&mut self, component: SsfComponent) -> ModelResult<()> {
        if self.components.iter().any(|c| c.name == component.name) {
            return Err(ModelError::DuplicateName { name: component.name });
        }
        self.components.push(component);
        Ok(())
    }

    /// Append an observed equation; it reads the next data column.
    pub fn add_observed(&mut self, variance: f64, terms: Vec<PendingTerm>) -> usize {
        let series = self.n_series;
        self.equations.push((EquationSource::Observed(series), variance, terms));
        self.n_series += 1;
        series
    }

    pub fn add_constraint(&mut self, target: f64, terms: Vec<PendingTerm>) {
        self.equations.push((EquationSource::Constraint(target), 0.0, terms));
    }

    pub fn build(self) -> ModelResult<CompositeSsf> {
        let mut positions = Vec::with_capacity(self.components.len());
        let mut m = 0;
        for c in &self.components {
            positions.push(m);
            m += c.dim();
        }
        let mut t = Array2::zeros((m, m));
        let mut v = Array2::zeros((m, m));
        let mut a0 = Array1::zeros(m);
        let mut p0 = Array2::zeros((m, m));
        let mut pi0 = Array2::zeros((m, m));
        for (c, &pos) in self.components.iter().zip(&positions) {
            let r = pos..pos + c.dim();
            t.slice_mut(s![r.clone(), r.clone()]).assign(&c.t);
            v.slice_mut(s![r.clone(), r.clone()]).assign(&c.v);
            p0.slice_mut(s![r.clone(), r.clone()]).assign(&c.p0);
            pi0.slice_mut(s![r.clone(), r.clone()]).assign(&c.pi0);
            a0.slice_mut(s![r]).assign(&c.a0);
        }

        let mut equations = Vec::with_capacity(self.equations.len());
        for (source, variance, terms) in self.equations {
            let mut z = Array1::zeros(m);
            for term in terms {
                let idx = self
                    .components
                    .iter()
                    .position(|c| c.name == term.component)
                    .ok_or_else(|| ModelError::UnknownComponent { name: term.component.clone() })?;
                let c = &self.components[idx];
                if term.loading.len() != c.dim() {
                    return Err(ModelError::DimensionMismatch {
                        what: format!("loading on {}", c.name),
                        expected: c.dim(),
                        found: term.loading.len(),
                    });
                }
                let pos = positions[idx];
                let mut block = z.slice_mut(s![pos..pos + c.dim()]);
                block.scaled_add(term.coefficient, &term.loading);
            }
            equations.push(MeasurementEquation { source, variance, z });
        }

        Ok(CompositeSsf {
            components: self.components,
            positions,
            equations,
            n_series: self.n_series,
            t,
            v,
            a0,
            p0,
            pi0,
        })
    }
}
