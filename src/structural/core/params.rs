//! Parameter interpreters — the unit of reparameterization.
//!
//! Purpose
//! -------
//! A [`ParameterInterpreter`] owns one named block of `k ≥ 1` real
//! parameters together with its fixed/free status and its
//! [`ParamDomain`]. It converts between the *optimizer space* (what the
//! numerical optimizer sees, fixed blocks dropped) and the *model space*
//! (what the structural blocks consume, every block present) through an
//! explicit index cursor, [`ParamReader`].
//!
//! Key behaviors
//! -------------
//! - `decode`: optimizer space → model space. Free blocks pull `k` values
//!   from the reader; fixed blocks write their stored values.
//! - `encode`: model space → optimizer space. Free blocks copy their `k`
//!   values; fixed blocks are skipped in the reader and write nothing.
//! - `fill_default`: write the optimizer-space image of the current values
//!   of a free block, used to seed optimizations.
//! - `rescale_variances`: rescale model-space variances (and stored fixed
//!   values) when the monitor standardizes the data.
//!
//! Invariants & assumptions
//! ------------------------
//! - `values.len() == domain.dim() == k` for every interpreter.
//! - [`ParamKind::Variance`] blocks are parameterized by their standard
//!   deviation in optimizer space (`decode` squares, `encode` takes the
//!   square root); every other kind maps values unchanged.
//! - Fixed values live in model space and are reproduced exactly.
//! - Interpreters are owned by exactly one structural item or mapping;
//!   `duplicate` always deep-copies.
//!
//! Conventions
//! -----------
//! - Positions passed to `decode`/`encode`/`fill_default` index the output
//!   buffer; every method returns the next free position.
//! - Cursor and buffer misuse is reported as [`ParamError`] rather than a
//!   panic.
use crate::{
    optimization::numerical_stability::DEFAULT_BOUNDARY_EPS,
    structural::{
        core::domain::ParamDomain,
        errors::{ParamError, ParamResult},
    },
};
use ndarray::{Array1, ArrayView1};

/// Explicit position-tracking cursor over a parameter vector.
#[derive(Debug, Clone)]
pub struct ParamReader<'a> {
    data: ArrayView1<'a, f64>,
    pos: usize,
}

impl<'a> ParamReader<'a> {
    pub fn new(data: ArrayView1<'a, f64>) -> Self {
        ParamReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn next(&mut self) -> ParamResult<f64> {
        Ok(self.next_n(1)?[0])
    }

    pub fn next_n(&mut self, k: usize) -> ParamResult<ArrayView1<'a, f64>> {
        if k > self.remaining() {
            return Err(ParamError::ReaderExhausted { requested: k, remaining: self.remaining() });
        }
        let slice = self.data.slice_move(ndarray::s![self.pos..self.pos + k]);
        self.pos += k;
        Ok(slice)
    }

    pub fn skip(&mut self, k: usize) -> ParamResult<()> {
        self.next_n(k).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Unrestricted real values.
    Plain,
    /// Loading / scaling coefficients of a measurement term.
    Loading,
    /// Variances, parameterized by their standard deviation.
    Variance,
    /// Standard deviations, kept non-negative.
    StdDev,
    /// Scalars restricted to an open interval.
    Bounded,
    /// Lag-polynomial coefficients restricted to the stationary region.
    Stability,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInterpreter {
    name: String,
    kind: ParamKind,
    values: Array1<f64>,
    fixed: bool,
    domain: ParamDomain,
}

impl ParameterInterpreter {
    /// General constructor; prefer the kind-specific ones below.
    ///
    /// Errors
    /// ------
    /// - `ParamError::EmptyBlock` when `values` is empty.
    /// - `ParamError::DimensionMismatch` when `domain.dim() != values.len()`.
    /// - `ParamError::NonFiniteValue` for NaN/±inf entries.
    /// - `ParamError::NegativeVariance` for negative variance/std-dev values.
    pub fn new(
        name: impl Into<String>, kind: ParamKind, values: Array1<f64>, domain: ParamDomain,
        fixed: bool,
    ) -> ParamResult<Self> {
        let name = name.into();
        if values.is_empty() {
            return Err(ParamError::EmptyBlock { name });
        }
        if domain.dim() != values.len() {
            return Err(ParamError::DimensionMismatch {
                name,
                expected: values.len(),
                found: domain.dim(),
            });
        }
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ParamError::NonFiniteValue { name, index, value });
        }
        if matches!(kind, ParamKind::Variance | ParamKind::StdDev) {
            if let Some(&value) = values.iter().find(|v| **v < 0.0) {
                return Err(ParamError::NegativeVariance { name, value });
            }
        }
        Ok(ParameterInterpreter { name, kind, values, fixed, domain })
    }

    pub fn plain(name: impl Into<String>, values: Array1<f64>) -> ParamResult<Self> {
        let domain = ParamDomain::unbounded(values.len())?;
        Self::new(name, ParamKind::Plain, values, domain, false)
    }

    pub fn loading(name: impl Into<String>, value: f64) -> ParamResult<Self> {
        Self::new(name, ParamKind::Loading, Array1::from_elem(1, value), ParamDomain::unbounded(1)?, false)
    }

    /// Scalar variance; free unless `fixed`.
    pub fn variance(name: impl Into<String>, value: f64, fixed: bool) -> ParamResult<Self> {
        Self::variances(name, Array1::from_elem(1, value), fixed)
    }

    /// Vector of independent variances sharing one block.
    pub fn variances(name: impl Into<String>, values: Array1<f64>, fixed: bool) -> ParamResult<Self> {
        let domain = ParamDomain::unbounded(values.len())?;
        Self::new(name, ParamKind::Variance, values, domain, fixed)
    }

    pub fn std_dev(name: impl Into<String>, value: f64) -> ParamResult<Self> {
        Self::new(name, ParamKind::StdDev, Array1::from_elem(1, value), ParamDomain::non_negative(1)?, false)
    }

    pub fn bounded(
        name: impl Into<String>, value: f64, lower: f64, upper: f64, boundary_eps: f64,
    ) -> ParamResult<Self> {
        let domain = ParamDomain::bounded(lower, upper, boundary_eps)?;
        Self::new(name, ParamKind::Bounded, Array1::from_elem(1, value), domain, false)
    }

    /// Scalar in `(-1, 1)` with the default boundary margin.
    pub fn scale(name: impl Into<String>, value: f64) -> ParamResult<Self> {
        let domain = ParamDomain::scale(DEFAULT_BOUNDARY_EPS)?;
        Self::new(name, ParamKind::Bounded, Array1::from_elem(1, value), domain, false)
    }

    pub fn stability(
        name: impl Into<String>, coeffs: Array1<f64>, boundary_eps: f64,
    ) -> ParamResult<Self> {
        let domain = ParamDomain::stability(coeffs.len(), boundary_eps)?;
        Self::new(name, ParamKind::Stability, coeffs, domain, false)
    }

    /// Builder-style fixing at the current values.
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    pub fn domain(&self) -> &ParamDomain {
        &self.domain
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn is_variance(&self) -> bool {
        matches!(self.kind, ParamKind::Variance)
    }

    pub fn free(&mut self) {
        self.fixed = false;
    }

    /// Fix at the current values.
    pub fn fix(&mut self) {
        self.fixed = true;
    }

    /// Replace the stored (model-space) values without touching the status.
    pub fn set_values(&mut self, values: ArrayView1<f64>) -> ParamResult<()> {
        let candidate = Self::new(
            self.name.clone(),
            self.kind,
            values.to_owned(),
            self.domain.clone(),
            self.fixed,
        )?;
        self.values = candidate.values;
        Ok(())
    }

    /// Consume `k` model-space values from `reader`, store them and fix.
    pub fn fix_model_parameter(&mut self, reader: &mut ParamReader<'_>) -> ParamResult<()> {
        let values = reader.next_n(self.dim())?;
        self.set_values(values)?;
        self.fixed = true;
        Ok(())
    }

    /// Optimizer space → model space. Returns `pos + k`.
    pub fn decode(
        &self, reader: &mut ParamReader<'_>, buffer: &mut Array1<f64>, pos: usize,
    ) -> ParamResult<usize> {
        let k = self.dim();
        check_room(buffer, pos, k)?;
        if self.fixed {
            buffer.slice_mut(ndarray::s![pos..pos + k]).assign(&self.values);
        } else {
            let source = reader.next_n(k)?;
            for (dst, &src) in buffer.slice_mut(ndarray::s![pos..pos + k]).iter_mut().zip(source) {
                *dst = self.to_model(src);
            }
        }
        Ok(pos + k)
    }

    /// Model space → optimizer space. Returns `pos + k` for free blocks and
    /// `pos` for fixed ones.
    pub fn encode(
        &self, reader: &mut ParamReader<'_>, buffer: &mut Array1<f64>, pos: usize,
    ) -> ParamResult<usize> {
        let k = self.dim();
        if self.fixed {
            reader.skip(k)?;
            return Ok(pos);
        }
        check_room(buffer, pos, k)?;
        let source = reader.next_n(k)?;
        for (dst, &src) in buffer.slice_mut(ndarray::s![pos..pos + k]).iter_mut().zip(source) {
            *dst = self.to_optimizer(src);
        }
        Ok(pos + k)
    }

    /// Seed a free block's optimizer-space entries from the current values.
    pub fn fill_default(&self, buffer: &mut Array1<f64>, pos: usize) -> ParamResult<usize> {
        if self.fixed {
            return Ok(pos);
        }
        let k = self.dim();
        check_room(buffer, pos, k)?;
        for (dst, &src) in buffer.slice_mut(ndarray::s![pos..pos + k]).iter_mut().zip(&self.values) {
            *dst = self.to_optimizer(src);
        }
        Ok(pos + k)
    }

    /// Whether rescaling the data requires rescaling this block.
    ///
    /// Variances and standard deviations always are; loadings only count
    /// when the caller is not restricting attention to variances.
    pub fn is_scale_sensitive(&self, variance: bool) -> bool {
        match self.kind {
            ParamKind::Variance | ParamKind::StdDev => true,
            ParamKind::Loading => !variance,
            _ => false,
        }
    }

    /// Rescale the model-space entries at `pos` (and the stored values of
    /// a fixed block) for data multiplied by `sqrt(factor)`.
    pub fn rescale_variances(
        &mut self, factor: f64, buffer: &mut Array1<f64>, pos: usize,
    ) -> ParamResult<usize> {
        let k = self.dim();
        check_room(buffer, pos, k)?;
        let multiplier = match self.kind {
            ParamKind::Variance => factor,
            ParamKind::StdDev => factor.sqrt(),
            _ => return Ok(pos + k),
        };
        buffer.slice_mut(ndarray::s![pos..pos + k]).mapv_inplace(|v| v * multiplier);
        if self.fixed {
            self.values.mapv_inplace(|v| v * multiplier);
        }
        Ok(pos + k)
    }

    // ---- Helper methods ----

    fn to_model(&self, x: f64) -> f64 {
        match self.kind {
            ParamKind::Variance => x * x,
            _ => x,
        }
    }

    fn to_optimizer(&self, v: f64) -> f64 {
        match self.kind {
            ParamKind::Variance => v.max(0.0).sqrt(),
            _ => v,
        }
    }
}

fn check_room(buffer: &Array1<f64>, pos: usize, needed: usize) -> ParamResult<()> {
    if pos + needed > buffer.len() {
        return Err(ParamError::BufferOverflow { position: pos, needed, len: buffer.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Cursor bookkeeping of `ParamReader`.
    // - decode/encode for free and fixed blocks, including the variance
    //   square/sqrt mapping.
    // - Scale sensitivity, rescaling and deep copies.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // The reader advances by exactly the requested count and refuses to
    // overrun.
    //
    // Given
    // -----
    // - A 3-element buffer.
    //
    // Expect
    // ------
    // - next_n(2) then next() succeed; a further skip fails.
    fn reader_tracks_position_and_refuses_overrun() {
        let data = array![1.0, 2.0, 3.0];
        let mut reader = ParamReader::new(data.view());

        assert_eq!(reader.next_n(2).expect("two values").to_vec(), vec![1.0, 2.0]);
        assert_eq!(reader.next().expect("one value"), 3.0);
        assert_eq!(reader.position(), 3);
        assert_eq!(
            reader.skip(1),
            Err(ParamError::ReaderExhausted { requested: 1, remaining: 0 })
        );
    }

    #[test]
    // Purpose
    // -------
    // Variance blocks square on decode and take square roots on encode, so
    // encode∘decode is the identity on non-negative optimizer values.
    //
    // Given
    // -----
    // - A free variance block and optimizer value 0.7.
    //
    // Expect
    // ------
    // - Model value 0.49, encoded back to 0.7.
    fn variance_decode_encode_round_trip() {
        // Arrange
        let p = ParameterInterpreter::variance("v", 1.0, false).expect("valid");
        let theta = array![0.7];
        let mut model = Array1::zeros(1);
        let mut back = Array1::zeros(1);

        // Act
        let end = p.decode(&mut ParamReader::new(theta.view()), &mut model, 0).expect("decode");
        let end_back = p.encode(&mut ParamReader::new(model.view()), &mut back, 0).expect("encode");

        // Assert
        assert_eq!((end, end_back), (1, 1));
        assert_relative_eq!(model[0], 0.49, epsilon = 1e-15);
        assert_relative_eq!(back[0], 0.7, epsilon = 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // Fixed blocks read nothing on decode and write nothing on encode.
    //
    // Given
    // -----
    // - A fixed 2-dimensional plain block and an empty optimizer vector.
    //
    // Expect
    // ------
    // - decode writes the stored values; encode leaves `pos` unchanged but
    //   advances the reader by 2.
    fn fixed_block_is_transparent_to_optimizer_space() {
        // Arrange
        let p = ParameterInterpreter::plain("ar", array![0.3, -0.1]).expect("valid").fixed();
        let empty = Array1::<f64>::zeros(0);
        let mut model = Array1::zeros(2);

        // Act
        let end = p.decode(&mut ParamReader::new(empty.view()), &mut model, 0).expect("decode");
        let mut reader = ParamReader::new(model.view());
        let mut theta = Array1::zeros(0);
        let pos = p.encode(&mut reader, &mut theta, 0).expect("encode");

        // Assert
        assert_eq!(end, 2);
        assert_eq!(model, array![0.3, -0.1]);
        assert_eq!(pos, 0);
        assert_eq!(reader.position(), 2);
    }

    #[test]
    // Purpose
    // -------
    // fix_model_parameter stores exactly what it reads.
    //
    // Given
    // -----
    // - A free variance block and model value 2.25.
    //
    // Expect
    // ------
    // - Block fixed; decode reproduces 2.25 bit for bit.
    fn fix_model_parameter_reproduces_value() {
        let mut p = ParameterInterpreter::variance("v", 1.0, false).expect("valid");
        let full = array![2.25];
        p.fix_model_parameter(&mut ParamReader::new(full.view())).expect("fix");

        let mut out = Array1::zeros(1);
        let empty = Array1::<f64>::zeros(0);
        p.decode(&mut ParamReader::new(empty.view()), &mut out, 0).expect("decode");

        assert!(p.is_fixed());
        assert_eq!(out[0], 2.25);
    }

    #[test]
    // Purpose
    // -------
    // Scale sensitivity and rescaling follow the parameter kind.
    //
    // Given
    // -----
    // - Variance, std-dev, loading and plain blocks; factor 4.
    //
    // Expect
    // ------
    // - Sensitivity (true, true, !variance, false); variance ×4, std-dev ×2,
    //   loading untouched.
    fn scale_sensitivity_and_rescaling_follow_kind() {
        let var = ParameterInterpreter::variance("v", 1.0, true).expect("valid");
        let sd = ParameterInterpreter::std_dev("s", 1.0).expect("valid");
        let load = ParameterInterpreter::loading("l", 0.5).expect("valid");
        let plain = ParameterInterpreter::plain("p", array![0.0]).expect("valid");

        assert!(var.is_scale_sensitive(true) && var.is_scale_sensitive(false));
        assert!(sd.is_scale_sensitive(true));
        assert!(!load.is_scale_sensitive(true) && load.is_scale_sensitive(false));
        assert!(!plain.is_scale_sensitive(false));

        let mut buffer = array![3.0, 1.5, 0.5];
        let mut var = var;
        let mut sd = sd;
        let mut load = load;
        let pos = var.rescale_variances(4.0, &mut buffer, 0).expect("var");
        let pos = sd.rescale_variances(4.0, &mut buffer, pos).expect("sd");
        load.rescale_variances(4.0, &mut buffer, pos).expect("load");

        assert_eq!(buffer, array![12.0, 3.0, 0.5]);
        assert_eq!(var.values()[0], 4.0);
    }

    #[test]
    // Purpose
    // -------
    // Duplicates never alias the original.
    //
    // Given
    // -----
    // - A free block and its duplicate; the duplicate is then fixed.
    //
    // Expect
    // ------
    // - The original stays free.
    fn duplicate_is_a_deep_copy() {
        let original = ParameterInterpreter::loading("l", 1.2).expect("valid");
        let mut copy = original.duplicate();
        copy.fix();

        assert!(!original.is_fixed());
        assert!(copy.is_fixed());
    }

    #[test]
    // Purpose
    // -------
    // Invalid construction fails fast.
    //
    // Given
    // -----
    // - An empty block and a negative variance.
    //
    // Expect
    // ------
    // - `EmptyBlock` and `NegativeVariance`.
    fn constructors_reject_invalid_blocks() {
        assert!(matches!(
            ParameterInterpreter::plain("e", Array1::zeros(0)),
            Err(ParamError::EmptyBlock { .. })
        ));
        assert!(matches!(
            ParameterInterpreter::variance("v", -1.0, false),
            Err(ParamError::NegativeVariance { .. })
        ));
    }
}
