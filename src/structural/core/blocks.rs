//! Block catalog — constructors and state-space systems of [`StateItem`]s.
//!
//! Each constructor creates the item's parameter interpreters (named
//! `"{item}.{role}"`) and each kind knows how to turn resolved values into
//! an [`SsfComponent`]:
//!
//! | kind               | dim   | parameters                    | initial state      |
//! |--------------------|-------|-------------------------------|--------------------|
//! | `Noise`            | 1     | var                           | stationary         |
//! | `LocalLevel`       | 1     | var                           | diffuse            |
//! | `LocalLinearTrend` | 2     | level_var, slope_var          | diffuse            |
//! | `Seasonal(s)`      | s − 1 | var                           | diffuse            |
//! | `Cycle`            | 2     | damping, period (fixed), var  | stationary         |
//! | `Ar(p)`            | p     | coeffs (stability), var       | stationary (Lyap.) |
//! | `Noises(n)`        | n     | vars (one block)              | stationary         |
//!
//! Autoregressive coefficients are lag-polynomial coefficients: the block
//! follows `(1 + c₁L + … + c_pL^p) x_t = ε_t`, so the AR weights are `−cᵢ`.
use crate::{
    optimization::numerical_stability::DEFAULT_BOUNDARY_EPS,
    structural::{
        core::{
            items::{StateItem, StateKind},
            params::ParameterInterpreter,
            ssf::SsfComponent,
        },
        errors::{ModelError, ModelResult},
    },
};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1};
use std::f64::consts::PI;

impl StateItem {
    fn with_params(name: String, kind: StateKind, params: Vec<ParameterInterpreter>) -> Self {
        StateItem { name, kind, params, scalable: true }
    }

    pub fn noise(name: impl Into<String>, variance: f64) -> ModelResult<Self> {
        let name = name.into();
        let var = ParameterInterpreter::variance(format!("{name}.var"), variance, false)?;
        Ok(Self::with_params(name, StateKind::Noise, vec![var]))
    }

    pub fn local_level(name: impl Into<String>, variance: f64) -> ModelResult<Self> {
        let name = name.into();
        let var = ParameterInterpreter::variance(format!("{name}.var"), variance, false)?;
        Ok(Self::with_params(name, StateKind::LocalLevel, vec![var]))
    }

    pub fn local_linear_trend(
        name: impl Into<String>, level_variance: f64, slope_variance: f64,
    ) -> ModelResult<Self> {
        let name = name.into();
        let level = ParameterInterpreter::variance(format!("{name}.level_var"), level_variance, false)?;
        let slope = ParameterInterpreter::variance(format!("{name}.slope_var"), slope_variance, false)?;
        Ok(Self::with_params(name, StateKind::LocalLinearTrend, vec![level, slope]))
    }

    pub fn seasonal(name: impl Into<String>, period: usize, variance: f64) -> ModelResult<Self> {
        if period < 2 {
            return Err(ModelError::InvalidPeriod { period: period as f64 });
        }
        let name = name.into();
        let var = ParameterInterpreter::variance(format!("{name}.var"), variance, false)?;
        Ok(Self::with_params(name, StateKind::Seasonal(period), vec![var]))
    }

    /// Damped cycle; the period is fixed, the damping lives in `(0, 1)`.
    pub fn cycle(
        name: impl Into<String>, damping: f64, period: f64, variance: f64,
    ) -> ModelResult<Self> {
        if !period.is_finite() || period <= 2.0 {
            return Err(ModelError::InvalidPeriod { period });
        }
        let name = name.into();
        let rho = ParameterInterpreter::bounded(
            format!("{name}.damping"),
            damping,
            0.0,
            1.0,
            DEFAULT_BOUNDARY_EPS,
        )?;
        let period = ParameterInterpreter::plain(format!("{name}.period"), Array1::from_elem(1, period))?
            .fixed();
        let var = ParameterInterpreter::variance(format!("{name}.var"), variance, false)?;
        Ok(Self::with_params(name, StateKind::Cycle, vec![rho, period, var]))
    }

    pub fn ar(name: impl Into<String>, coeffs: Array1<f64>, variance: f64) -> ModelResult<Self> {
        if coeffs.is_empty() {
            return Err(ModelError::InvalidOrder { order: 0 });
        }
        let name = name.into();
        let order = coeffs.len();
        let c = ParameterInterpreter::stability(format!("{name}.coeffs"), coeffs, DEFAULT_BOUNDARY_EPS)?;
        let var = ParameterInterpreter::variance(format!("{name}.var"), variance, false)?;
        Ok(Self::with_params(name, StateKind::Ar(order), vec![c, var]))
    }

    pub fn noises(name: impl Into<String>, variances: Array1<f64>) -> ModelResult<Self> {
        let name = name.into();
        let n = variances.len();
        let vars = ParameterInterpreter::variances(format!("{name}.vars"), variances, false)?;
        Ok(Self::with_params(name, StateKind::Noises(n), vec![vars]))
    }

    pub fn dim(&self) -> usize {
        match self.kind {
            StateKind::Noise | StateKind::LocalLevel => 1,
            StateKind::LocalLinearTrend | StateKind::Cycle => 2,
            StateKind::Seasonal(period) => period - 1,
            StateKind::Ar(order) => order,
            StateKind::Noises(n) => n,
        }
    }

    /// Default loadings: first state for every kind except `Noises`, which
    /// exposes one unit loading per noise.
    pub fn default_loadings(&self) -> Vec<Array1<f64>> {
        let dim = self.dim();
        match self.kind {
            StateKind::Noises(n) => (0..n).map(|i| unit(dim, i)).collect(),
            _ => vec![unit(dim, 0)],
        }
    }

    /// Concrete component for resolved model-space `values`.
    pub fn component(&self, values: ArrayView1<f64>) -> ModelResult<SsfComponent> {
        let expected: usize = self.params.iter().map(ParameterInterpreter::dim).sum();
        if values.len() != expected {
            return Err(ModelError::DimensionMismatch {
                what: format!("{} values", self.name),
                expected,
                found: values.len(),
            });
        }
        let dim = self.dim();
        let loadings = self.default_loadings();
        let zeros = Array2::zeros((dim, dim));
        let eye = Array2::eye(dim);
        match self.kind {
            StateKind::Noise => {
                let v = Array2::from_elem((1, 1), values[0]);
                SsfComponent::new(&self.name, zeros.clone(), v.clone(), v, zeros, loadings)
            }
            StateKind::LocalLevel => {
                let v = Array2::from_elem((1, 1), values[0]);
                SsfComponent::new(&self.name, eye.clone(), v, zeros, eye, loadings)
            }
            StateKind::LocalLinearTrend => {
                let t = ndarray::array![[1.0, 1.0], [0.0, 1.0]];
                let v = Array2::from_diag(&ndarray::array![values[0], values[1]]);
                SsfComponent::new(&self.name, t, v, zeros, eye, loadings)
            }
            StateKind::Seasonal(_) => {
                let mut t = Array2::zeros((dim, dim));
                t.row_mut(0).fill(-1.0);
                for i in 1..dim {
                    t[[i, i - 1]] = 1.0;
                }
                let mut v = Array2::zeros((dim, dim));
                v[[0, 0]] = values[0];
                SsfComponent::new(&self.name, t, v, zeros, eye, loadings)
            }
            StateKind::Cycle => {
                let (rho, period, var) = (values[0], values[1], values[2]);
                let lambda = 2.0 * PI / period;
                let (sin, cos) = lambda.sin_cos();
                let t = ndarray::array![[rho * cos, rho * sin], [-rho * sin, rho * cos]];
                let v = &eye * var;
                let p0 = &eye * (var / (1.0 - rho * rho));
                SsfComponent::new(&self.name, t, v, p0, zeros, loadings)
            }
            StateKind::Ar(order) => {
                let mut t = Array2::zeros((dim, dim));
                for j in 0..order {
                    t[[0, j]] = -values[j];
                }
                for i in 1..dim {
                    t[[i, i - 1]] = 1.0;
                }
                let mut v = Array2::zeros((dim, dim));
                v[[0, 0]] = values[order];
                let p0 = stationary_covariance(&t, &v)
                    .ok_or_else(|| ModelError::SingularLyapunov { component: self.name.clone() })?;
                SsfComponent::new(&self.name, t, v, p0, zeros, loadings)
            }
            StateKind::Noises(_) => {
                let v = Array2::from_diag(&values.to_owned());
                SsfComponent::new(&self.name, zeros.clone(), v.clone(), v, zeros, loadings)
            }
        }
    }
}

// ---- Helper methods ----

fn unit(dim: usize, i: usize) -> Array1<f64> {
    let mut e = Array1::zeros(dim);
    e[i] = 1.0;
    e
}

/// Solve `P = T P Tᵀ + V` through `(I − T ⊗ T) vec(P) = vec(V)`.
fn stationary_covariance(t: &Array2<f64>, v: &Array2<f64>) -> Option<Array2<f64>> {
    let m = t.nrows();
    let t_nalg = DMatrix::from_fn(m, m, |i, j| t[[i, j]]);
    let system = DMatrix::<f64>::identity(m * m, m * m) - t_nalg.kronecker(&t_nalg);
    let rhs = DVector::from_fn(m * m, |k, _| v[[k % m, k / m]]);
    let solution = system.lu().solve(&rhs)?;
    let p = Array2::from_shape_fn((m, m), |(i, j)| 0.5 * (solution[i + j * m] + solution[j + i * m]));
    if p.iter().all(|x| x.is_finite()) { Some(p) } else { None }
}
