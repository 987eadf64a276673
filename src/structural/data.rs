//! Observation matrix — time × series data with missing values.
//!
//! Rows are time points, columns are observed series in the order of the
//! model's observed equations. Missing observations are `NaN`; infinite
//! values are rejected at construction.
use crate::structural::errors::{FilterError, FilterResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationMatrix {
    values: Array2<f64>,
}

impl ObservationMatrix {
    /// Errors
    /// ------
    /// - `FilterError::EmptyData` for zero rows or columns.
    /// - `FilterError::NonFiniteState` (with `what = "observation"`) for
    ///   ±inf entries.
    pub fn new(values: Array2<f64>) -> FilterResult<Self> {
        if values.nrows() == 0 || values.ncols() == 0 {
            return Err(FilterError::EmptyData);
        }
        if let Some(((t, _), _)) = values.indexed_iter().find(|(_, v)| v.is_infinite()) {
            return Err(FilterError::NonFiniteState { t, what: "observation" });
        }
        Ok(ObservationMatrix { values })
    }

    /// Single series.
    pub fn from_series(series: Array1<f64>) -> FilterResult<Self> {
        let n = series.len();
        let values = series.into_shape((n, 1)).map_err(|_| FilterError::EmptyData)?;
        Self::new(values)
    }

    pub fn n_obs(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_series(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn row(&self, t: usize) -> ArrayView1<'_, f64> {
        self.values.row(t)
    }

    /// Number of non-missing entries.
    pub fn n_observed(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// Sample standard deviation over all non-missing entries; `None` when
    /// fewer than two values are present or the data are constant.
    pub fn sample_std(&self) -> Option<f64> {
        let present: Vec<f64> = self.values.iter().copied().filter(|v| !v.is_nan()).collect();
        if present.len() < 2 {
            return None;
        }
        let n = present.len() as f64;
        let mean = present.iter().sum::<f64>() / n;
        let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std = var.sqrt();
        (std.is_finite() && std > 0.0).then_some(std)
    }

    /// Copy with every entry multiplied by `factor` (missing stays missing).
    pub fn scaled(&self, factor: f64) -> Self {
        ObservationMatrix { values: self.values.mapv(|v| v * factor) }
    }
}
