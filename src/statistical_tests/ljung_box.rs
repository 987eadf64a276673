//! statistical_tests::ljung_box — portmanteau test on standardized residuals.
//!
//! Purpose
//! -------
//! Test the one-step-ahead prediction errors of a fitted state-space model
//! for remaining serial correlation with the Ljung–Box statistic
//! `Q = n(n+2) Σ_{j=1}^{h} ρ̂ⱼ² / (n − j)` and its χ²(h − k) p-value.
//!
//! Key behaviors
//! -------------
//! - Autocorrelations ρ̂ⱼ use the demeaned series and the biased
//!   (`1/n`) autocovariance estimator.
//! - Degrees of freedom are `h − fitted`, floored at 1, where `fitted` is
//!   the number of estimated parameters the caller chooses to subtract.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are validated by `validation::validate_input`; a constant
//!   series yields `LBError::ZeroVariance`.
//! - `p_value` lies in [0, 1].
use crate::statistical_tests::{
    errors::{LBError, LBResult},
    validation::validate_input,
};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Outcome of one Ljung–Box test.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LBOutcome {
    lags: usize,
    df: usize,
    stat: f64,
    p_value: f64,
}

impl LBOutcome {
    /// Run the Ljung–Box test with `lags` autocorrelations, subtracting
    /// `fitted` degrees of freedom.
    ///
    /// Errors
    /// ------
    /// - Any `LBError` from `validate_input`.
    /// - `LBError::ZeroVariance` for a constant series.
    pub fn ljung_box(data: &[f64], lags: usize, fitted: usize) -> LBResult<Self> {
        validate_input(data, lags)?;
        let n = data.len() as f64;
        let rho = autocorrelations(data, lags)?;
        let stat = n
            * (n + 2.0)
            * rho.iter().enumerate().map(|(j, r)| r * r / (n - (j + 1) as f64)).sum::<f64>();
        let df = lags.saturating_sub(fitted).max(1);
        let p_value = calc_p_value(stat, df);
        Ok(LBOutcome { lags, df, stat, p_value })
    }

    pub fn lags(&self) -> usize {
        self.lags
    }

    pub fn df(&self) -> usize {
        self.df
    }

    pub fn stat(&self) -> f64 {
        self.stat
    }

    pub fn p_value(&self) -> f64 {
        self.p_value
    }
}

// ---- Helper methods ----

/// ρ̂ⱼ for j = 1..=lags.
fn autocorrelations(data: &[f64], lags: usize) -> LBResult<Vec<f64>> {
    let n = data.len();
    let mean = data.iter().sum::<f64>() / n as f64;
    let gamma0 = data.iter().map(|y| (y - mean).powi(2)).sum::<f64>();
    if gamma0 <= 0.0 {
        return Err(LBError::ZeroVariance);
    }
    Ok((1..=lags)
        .map(|j| (j..n).map(|t| (data[t] - mean) * (data[t - j] - mean)).sum::<f64>() / gamma0)
        .collect())
}

fn calc_p_value(stat: f64, df: usize) -> f64 {
    match ChiSquared::new(df as f64) {
        Ok(dist) => (1.0 - dist.cdf(stat)).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}
