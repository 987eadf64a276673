//! Fixed-interval smoother over univariate Kalman steps.
//!
//! Backward recursion (per scalar update, in reverse processing order):
//!
//! ```text
//! r ← z·v/F + Lᵀ r,          L = I − K zᵀ
//! N ← z zᵀ/F + Lᵀ N L
//! ```
//!
//! with `r ← Tᵀ r`, `N ← Tᵀ N T` between time steps. Smoothed moments are
//! `â_t = a_t + P_t r_t` and `V_t = P_t − P_t N_t P_t`, where `(a_t, P_t)`
//! is the one-step-ahead prediction.
//!
//! The full variant stores every prediction and step record. The
//! means-only variant carries `r` alone: it keeps a [`ForwardState`]
//! checkpoint every `block` steps, then for each block (last to first)
//! re-runs the filter from its checkpoint and smooths within the block.
use crate::structural::{
    core::{options::FilterOptions, ssf::CompositeSsf},
    data::ObservationMatrix,
    errors::{FilterError, FilterResult},
    filter::{
        StateSeries, check_budget,
        kalman::{ForwardState, StepRecord},
        smoother_footprint, try_vec,
    },
};
use ndarray::{Array1, Array2, Axis};

pub(crate) fn smooth_full(
    ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
) -> FilterResult<StateSeries> {
    let (n, m) = (data.n_obs(), ssf.state_dim());
    check_budget(smoother_footprint(n, m, ssf.equations().len(), true, opts.block), opts)?;

    let mut predictions: Vec<(Array1<f64>, Array2<f64>)> = try_vec(n, opts)?;
    let mut records: Vec<Vec<StepRecord>> = try_vec(n, opts)?;
    let mut diffuse_prefix = 0;
    let mut state = ForwardState::initial(ssf);
    for t in 0..n {
        predictions.push((state.a.clone(), state.p.clone()));
        let step = state.update(ssf, data, t)?;
        if step.iter().any(|r| r.diffuse) {
            diffuse_prefix = t + 1;
        }
        records.push(step);
        state.predict(ssf);
    }

    let mut means: Array2<f64> = Array2::zeros((n, m));
    let mut covariances: Vec<Array2<f64>> = try_vec(n, opts)?;
    let mut r: Array1<f64> = Array1::zeros(m);
    let mut big_n: Array2<f64> = Array2::zeros((m, m));
    let tt = ssf.transition().t();
    for t in (0..n).rev() {
        // N is not needed inside the diffuse prefix unless its covariances are.
        let variances = opts.diffuse_covariances || t >= diffuse_prefix;
        r = tt.dot(&r);
        if variances {
            big_n = tt.dot(&big_n).dot(ssf.transition());
        }
        for rec in records[t].iter().rev() {
            let z = &ssf.equations()[rec.equation].z;
            backward_mean(&mut r, z, rec);
            if variances {
                backward_variance(&mut big_n, z, rec);
            }
        }
        let (a, p) = &predictions[t];
        means.row_mut(t).assign(&(a + &p.dot(&r)));
        if !variances {
            covariances.push(Array2::from_elem((m, m), f64::NAN));
            continue;
        }
        let v = p - &p.dot(&big_n).dot(p);
        if v.iter().any(|x| !x.is_finite()) {
            return Err(FilterError::NonFiniteState { t, what: "smoothed covariance" });
        }
        covariances.push(v);
    }
    covariances.reverse();
    Ok(StateSeries { means, covariances: Some(covariances), diffuse_prefix })
}

pub(crate) fn smooth_means(
    ssf: &CompositeSsf, data: &ObservationMatrix, opts: &FilterOptions,
) -> FilterResult<StateSeries> {
    let (n, m) = (data.n_obs(), ssf.state_dim());
    let block = opts.block.max(1);
    check_budget(smoother_footprint(n, m, ssf.equations().len(), false, block), opts)?;

    let mut checkpoints: Vec<ForwardState> = try_vec(n.div_ceil(block), opts)?;
    let mut diffuse_prefix = 0;
    let mut state = ForwardState::initial(ssf);
    for t in 0..n {
        if t % block == 0 {
            checkpoints.push(state.clone());
        }
        if state.update(ssf, data, t)?.iter().any(|r| r.diffuse) {
            diffuse_prefix = t + 1;
        }
        state.predict(ssf);
    }

    let mut means: Array2<f64> = Array2::zeros((n, m));
    let mut r: Array1<f64> = Array1::zeros(m);
    let tt = ssf.transition().t();
    for (b, checkpoint) in checkpoints.into_iter().enumerate().rev() {
        let start = b * block;
        let end = (start + block).min(n);
        let mut state = checkpoint;
        let mut local: Vec<(Array1<f64>, Array2<f64>, Vec<StepRecord>)> = try_vec(end - start, opts)?;
        for t in start..end {
            let (a, p) = (state.a.clone(), state.p.clone());
            let step = state.update(ssf, data, t)?;
            local.push((a, p, step));
            state.predict(ssf);
        }
        for (offset, (a, p, step)) in local.iter().enumerate().rev() {
            r = tt.dot(&r);
            for rec in step.iter().rev() {
                backward_mean(&mut r, &ssf.equations()[rec.equation].z, rec);
            }
            means.index_axis_mut(Axis(0), start + offset).assign(&(a + &p.dot(&r)));
        }
    }
    Ok(StateSeries { means, covariances: None, diffuse_prefix })
}

// ---- Helper methods ----

/// `r ← z·v/F + (I − z Kᵀ) r`.
fn backward_mean(r: &mut Array1<f64>, z: &Array1<f64>, rec: &StepRecord) {
    let kr = rec.k.dot(r);
    r.scaled_add(rec.v / rec.f - kr, z);
}

/// `N ← z zᵀ/F + Lᵀ N L`, expanded as
/// `N − z (NK)ᵀ − (NK) zᵀ + (KᵀNK + 1/F) z zᵀ`.
fn backward_variance(big_n: &mut Array2<f64>, z: &Array1<f64>, rec: &StepRecord) {
    let nk = big_n.dot(&rec.k);
    let c = rec.k.dot(&nk) + 1.0 / rec.f;
    for ((i, j), value) in big_n.indexed_iter_mut() {
        *value += -z[i] * nk[j] - nk[i] * z[j] + c * z[i] * z[j];
    }
}

#[cfg(test)]
mod tests {
    use crate::structural::{
        core::options::FilterOptions,
        data::ObservationMatrix,
        filter::{FilteringService, UnivariateKalman, kalman::test_support::local_level},
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Agreement of the checkpointed means-only smoother with the full one.
    // - Agreement of smoothed and filtered moments at the last time point.
    // - Masking of diffuse covariances when requested, without changing the
    //   covariances after the diffuse prefix.
    // -------------------------------------------------------------------------

    fn series() -> ObservationMatrix {
        ObservationMatrix::from_series(array![1.0, 1.4, f64::NAN, 2.2, 1.9, 2.8, 3.1, 2.5, 3.3, 3.0])
            .expect("data")
    }

    #[test]
    // Purpose
    // -------
    // Block-wise recomputation reproduces the full smoother's means.
    //
    // Given
    // -----
    // - Ten observations (one missing), block size 3.
    //
    // Expect
    // ------
    // - Equal means within 1e-10; no covariances in the light variant.
    fn means_only_matches_full_smoother() {
        // Arrange
        let ssf = local_level(0.3, 0.8);
        let data = series();
        let opts = FilterOptions::new(false, true, true, 3, None).expect("opts");

        // Act
        let full = UnivariateKalman.smooth(&ssf, &data, &opts, true).expect("full");
        let light = UnivariateKalman.smooth(&ssf, &data, &opts, false).expect("light");

        // Assert
        assert!(light.covariances.is_none());
        assert_eq!(light.diffuse_prefix, full.diffuse_prefix);
        for (x, y) in full.means.iter().zip(light.means.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-10);
        }
    }

    #[test]
    // Purpose
    // -------
    // At the last time point the smoothed and filtered moments coincide.
    //
    // Given
    // -----
    // - Local level, ten observations.
    //
    // Expect
    // ------
    // - Equal means and variances at t = n − 1.
    fn last_smoothed_state_equals_filtered_state() {
        let ssf = local_level(0.3, 0.8);
        let data = series();
        let opts = FilterOptions::default();

        let smoothed = UnivariateKalman.smooth(&ssf, &data, &opts, true).expect("smooth");
        let filtered = UnivariateKalman.filter(&ssf, &data, &opts, true).expect("filter").filtered;

        let last = data.n_obs() - 1;
        assert_relative_eq!(smoothed.means[[last, 0]], filtered.means[[last, 0]], epsilon = 1e-9);
        let vs = &smoothed.covariances.expect("smoothed")[last];
        let vf = &filtered.covariances.expect("filtered")[last];
        assert_relative_eq!(vs[[0, 0]], vf[[0, 0]], epsilon = 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // Without diffuse covariances the diffuse prefix is reported as NaN.
    //
    // Given
    // -----
    // - `diffuse_covariances = false`.
    //
    // Expect
    // ------
    // - NaN at t = 0, finite afterwards.
    fn diffuse_covariances_can_be_masked() {
        let ssf = local_level(0.3, 0.8);
        let opts = FilterOptions::new(false, true, false, 50, None).expect("opts");

        let smoothed = UnivariateKalman.smooth(&ssf, &series(), &opts, true).expect("smooth");
        let covs = smoothed.covariances.expect("covariances");

        assert!(covs[0][[0, 0]].is_nan());
        assert!(covs[1][[0, 0]].is_finite());
    }
    #[test]
    // Purpose
    // -------
    // Skipping the variance recursion inside the diffuse prefix leaves the
    // remaining covariances and all means untouched.
    //
    // Given
    // -----
    // - The same model smoothed with and without diffuse covariances.
    //
    // Expect
    // ------
    // - Equal means everywhere; equal covariances from the prefix on; NaN
    //   before it in the masked run only.
    fn masked_prefix_keeps_later_covariances() {
        // Arrange
        let ssf = local_level(0.3, 0.8);
        let data = series();
        let full_opts = FilterOptions::new(false, true, true, 50, None).expect("opts");
        let masked_opts = FilterOptions { diffuse_covariances: false, ..full_opts.clone() };

        // Act
        let full = UnivariateKalman.smooth(&ssf, &data, &full_opts, true).expect("full");
        let masked = UnivariateKalman.smooth(&ssf, &data, &masked_opts, true).expect("masked");

        // Assert
        let prefix = masked.diffuse_prefix;
        assert!(prefix >= 1);
        for (x, y) in full.means.iter().zip(masked.means.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-12);
        }
        let (vf, vm) = (full.covariances.expect("full"), masked.covariances.expect("masked"));
        for t in 0..data.n_obs() {
            if t < prefix {
                assert!(vf[t][[0, 0]].is_finite());
                assert!(vm[t][[0, 0]].is_nan());
            } else {
                assert_relative_eq!(vf[t][[0, 0]], vm[t][[0, 0]], epsilon = 1e-12);
            }
        }
    }
}
