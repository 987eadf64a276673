//! Model assembler — free vector ↔ full vector ↔ concrete system.
//!
//! Purpose
//! -------
//! [`ModelMapping`] aggregates the parameter blocks and build steps of a
//! composite model into one optimizable function. It owns deep copies of
//! every [`ParameterInterpreter`] (the *blocks*, in registration order) and
//! the ordered list of [`ModelItem`] build steps, each of which consumes a
//! contiguous range of blocks.
//!
//! Key behaviors
//! -------------
//! - `default_parameters` / `model_parameters` / `function_parameters`
//!   move between optimizer space (free blocks only) and model space (all
//!   blocks) with the interpreters' `fill_default` / `decode` / `encode`.
//! - `map` resolves a free vector into a [`CompositeSsf`] by running every
//!   build step, in order, on its slice of the full vector.
//! - Degeneracy helpers for the monitor: `fix_model_parameters`,
//!   `fix_max_variance`, `small_variances`, `rescale_variances`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `dim()` is the sum of free block dimensions and `full_dim()` the sum
//!   over all blocks; both follow block order.
//! - `model_parameters ∘ function_parameters` is the identity on full
//!   vectors as long as no block changes status in between.
//! - `map` is deterministic: equal inputs give bit-identical systems.
//! - The mapping is never mutated while an optimization evaluates it; the
//!   monitor works on clones when probing.
use crate::structural::{
    core::{
        domain::ParamValidation,
        items::{ModelItem, Registration},
        params::{ParamReader, ParameterInterpreter},
        ssf::{CompositeSsf, SsfBuilder},
    },
    errors::{ModelError, ModelResult, ParamError, ParamResult},
};
use ndarray::{Array1, ArrayView1, s};
use std::ops::Range;

#[derive(Debug, Clone)]
struct BuildStep {
    item: ModelItem,
    blocks: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct ModelMapping {
    blocks: Vec<ParameterInterpreter>,
    steps: Vec<BuildStep>,
    scalable: bool,
}

impl Default for ModelMapping {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelMapping {
    pub fn new() -> Self {
        ModelMapping { blocks: Vec::new(), steps: Vec::new(), scalable: true }
    }

    /// Register a parameter block; returns its index.
    pub fn add(&mut self, block: ParameterInterpreter) -> usize {
        self.blocks.push(block);
        self.blocks.len() - 1
    }

    /// Register a build step consuming `blocks`.
    pub fn add_step(&mut self, item: ModelItem, blocks: Range<usize>) -> ModelResult<()> {
        if blocks.start > blocks.end || blocks.end > self.blocks.len() {
            return Err(ModelError::InvalidStepRange {
                start: blocks.start,
                end: blocks.end,
                len: self.blocks.len(),
            });
        }
        if !item.is_scalable() {
            self.set_non_scalable();
        }
        self.steps.push(BuildStep { item, blocks });
        Ok(())
    }

    /// Register deep copies of `item`'s parameters followed by its build
    /// step.
    pub fn add_item(&mut self, item: &ModelItem) -> ModelResult<()> {
        let start = self.blocks.len();
        for p in item.parameters() {
            self.add(p.duplicate());
        }
        self.add_step(item.clone(), start..self.blocks.len())
    }

    /// Permanently mark the mapping as not scale invariant.
    pub fn set_non_scalable(&mut self) {
        self.scalable = false;
    }

    pub fn is_scalable(&self) -> bool {
        self.scalable
    }

    pub fn dim(&self) -> usize {
        self.blocks.iter().filter(|p| !p.is_fixed()).map(ParameterInterpreter::dim).sum()
    }

    pub fn full_dim(&self) -> usize {
        self.blocks.iter().map(ParameterInterpreter::dim).sum()
    }

    pub fn parameters(&self) -> &[ParameterInterpreter] {
        &self.blocks
    }

    pub fn parameters_name(&self) -> Vec<String> {
        self.blocks.iter().map(|p| p.name().to_string()).collect()
    }

    /// Full-vector offset of block `index`.
    pub fn offset(&self, index: usize) -> ParamResult<usize> {
        self.check_index(index)?;
        Ok(self.blocks[..index].iter().map(ParameterInterpreter::dim).sum())
    }

    pub fn default_parameters(&self) -> ParamResult<Array1<f64>> {
        let mut buffer = Array1::zeros(self.dim());
        let mut pos = 0;
        for p in &self.blocks {
            pos = p.fill_default(&mut buffer, pos)?;
        }
        Ok(buffer)
    }

    /// Optimizer space → model space.
    pub fn model_parameters(&self, free: ArrayView1<f64>) -> ParamResult<Array1<f64>> {
        let mut reader = ParamReader::new(free);
        let mut buffer = Array1::zeros(self.full_dim());
        let mut pos = 0;
        for p in &self.blocks {
            pos = p.decode(&mut reader, &mut buffer, pos)?;
        }
        ensure_consumed(&reader)?;
        Ok(buffer)
    }

    /// Model space → optimizer space; fixed entries are dropped.
    pub fn function_parameters(&self, full: ArrayView1<f64>) -> ParamResult<Array1<f64>> {
        let mut reader = ParamReader::new(full);
        let mut buffer = Array1::zeros(self.dim());
        let mut pos = 0;
        for p in &self.blocks {
            pos = p.encode(&mut reader, &mut buffer, pos)?;
        }
        ensure_consumed(&reader)?;
        Ok(buffer)
    }

    /// Fix every block matching `predicate` at its slice of `full`.
    pub fn fix_model_parameters<P>(&mut self, predicate: P, full: ArrayView1<f64>) -> ParamResult<()>
    where
        P: Fn(&ParameterInterpreter) -> bool,
    {
        let mut reader = ParamReader::new(full);
        for p in self.blocks.iter_mut() {
            if predicate(p) {
                p.fix_model_parameter(&mut reader)?;
            } else {
                reader.skip(p.dim())?;
            }
        }
        ensure_consumed(&reader)
    }

    pub fn fix_parameter(&mut self, index: usize, values: ArrayView1<f64>) -> ParamResult<()> {
        self.check_index(index)?;
        self.blocks[index].fix_model_parameter(&mut ParamReader::new(values))
    }

    /// Free block `index`, restarting it from `values` (model space).
    pub fn free_parameter(&mut self, index: usize, values: ArrayView1<f64>) -> ParamResult<()> {
        self.check_index(index)?;
        let block = &mut self.blocks[index];
        block.set_values(values)?;
        block.free();
        Ok(())
    }

    /// Pin the free scalar variance with the largest value in `full` to
    /// `target`, rescaling every other variance of `full` (and stored fixed
    /// values) by the same factor. Returns the pinned block, or `None` when
    /// no free variance is positive.
    ///
    /// Errors
    /// ------
    /// - `ParamError::DimensionMismatch` when `full.len() != full_dim()`.
    pub fn fix_max_variance(&mut self, full: &mut Array1<f64>, target: f64) -> ParamResult<Option<usize>> {
        if full.len() != self.full_dim() {
            return Err(ParamError::DimensionMismatch {
                name: "full parameters".to_string(),
                expected: self.full_dim(),
                found: full.len(),
            });
        }
        let mut best: Option<(usize, f64)> = None;
        let mut pos = 0;
        for (i, p) in self.blocks.iter().enumerate() {
            if p.is_variance() && !p.is_fixed() && p.dim() == 1 {
                let v = full[pos];
                if v > 0.0 && best.map_or(true, |(_, b)| v > b) {
                    best = Some((i, v));
                }
            }
            pos += p.dim();
        }
        let Some((index, value)) = best else {
            return Ok(None);
        };
        self.rescale_variances(target / value, full)?;
        let offset = self.offset(index)?;
        full[offset] = target;
        self.fix_parameter(index, full.slice(s![offset..offset + 1]))?;
        Ok(Some(index))
    }

    /// Free variance blocks whose standard deviation in `full` is below
    /// `eps`.
    pub fn small_variances(&self, full: ArrayView1<f64>, eps: f64) -> Vec<usize> {
        let mut out = Vec::new();
        let mut pos = 0;
        for (i, p) in self.blocks.iter().enumerate() {
            let k = p.dim();
            if p.is_variance() && !p.is_fixed() && pos + k <= full.len() {
                let max = full.slice(s![pos..pos + k]).iter().fold(0.0_f64, |m, v| m.max(*v));
                if max.sqrt() < eps {
                    out.push(i);
                }
            }
            pos += k;
        }
        out
    }

    /// Multiply every variance in `full` by `factor`.
    pub fn rescale_variances(&mut self, factor: f64, full: &mut Array1<f64>) -> ParamResult<()> {
        let mut pos = 0;
        for p in self.blocks.iter_mut() {
            pos = p.rescale_variances(factor, full, pos)?;
        }
        Ok(())
    }

    /// Project a free vector onto the domains of the free blocks.
    pub fn validate(&self, free: &mut Array1<f64>) -> ParamResult<ParamValidation> {
        if free.len() != self.dim() {
            return Err(ParamError::DimensionMismatch {
                name: "free parameters".to_string(),
                expected: self.dim(),
                found: free.len(),
            });
        }
        let mut outcome = ParamValidation::Valid;
        let mut pos = 0;
        for p in self.blocks.iter().filter(|p| !p.is_fixed()) {
            let k = p.dim();
            outcome = outcome.merge(p.domain().validate(free.slice_mut(s![pos..pos + k])));
            pos += k;
        }
        Ok(outcome)
    }

    /// Resolve the system for a free vector.
    pub fn map(&self, free: ArrayView1<f64>) -> ModelResult<CompositeSsf> {
        let full = self.model_parameters(free)?;
        self.map_full(full.view())
    }

    /// Resolve the system for a full vector.
    pub fn map_full(&self, full: ArrayView1<f64>) -> ModelResult<CompositeSsf> {
        if full.len() != self.full_dim() {
            return Err(ModelError::DimensionMismatch {
                what: "full parameters".to_string(),
                expected: self.full_dim(),
                found: full.len(),
            });
        }
        let offsets = self.offsets();
        let mut builder = SsfBuilder::new();
        for step in &self.steps {
            let start = offsets[step.blocks.start];
            let end = offsets[step.blocks.end];
            step.item.build(full.slice(s![start..end]), &mut builder)?;
        }
        let ssf = builder.build()?;
        if ssf.n_series() == 0 {
            return Err(ModelError::NoEquations);
        }
        Ok(ssf)
    }

    /// Whether some fixed variance is non-zero, which already pins the
    /// likelihood scale.
    pub fn has_fixed_scale(&self) -> bool {
        self.blocks.iter().any(|p| p.is_variance() && p.is_fixed() && p.values().iter().any(|v| *v > 0.0))
    }

    // ---- Helper methods ----

    /// Cumulative offsets; `offsets[i]` is where block `i` starts and the
    /// last entry is `full_dim()`.
    fn offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.blocks.len() + 1);
        let mut pos = 0;
        offsets.push(0);
        for p in &self.blocks {
            pos += p.dim();
            offsets.push(pos);
        }
        offsets
    }

    fn check_index(&self, index: usize) -> ParamResult<()> {
        if index >= self.blocks.len() {
            return Err(ParamError::UnknownBlock { index, len: self.blocks.len() });
        }
        Ok(())
    }
}

fn ensure_consumed(reader: &ParamReader<'_>) -> ParamResult<()> {
    if reader.remaining() != 0 {
        return Err(ParamError::DimensionMismatch {
            name: "parameter vector".to_string(),
            expected: reader.position(),
            found: reader.position() + reader.remaining(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structural::core::items::{ModelEquation, StateItem};
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - dim / full_dim bookkeeping under fixing.
    // - Round trips between optimizer and model space.
    // - Anchoring of the largest variance and small-variance detection.
    // - Determinism of `map`.
    // -------------------------------------------------------------------------

    /// level (var 2) + AR(1) (coeff −0.5, var 0.5) observed with noise 1.
    fn mapping() -> ModelMapping {
        let level = StateItem::local_level("l", 2.0).expect("level");
        let ar = StateItem::ar("ar", array![-0.5], 0.5).expect("ar");
        let mut eq = ModelEquation::new("y", 1.0, false).expect("eq");
        eq.add_item(&level).expect("l").add_item(&ar).expect("ar");
        let mut m = ModelMapping::new();
        for item in [ModelItem::from(level), ar.into(), eq.into()] {
            m.add_item(&item).expect("add");
        }
        m
    }

    #[test]
    // Purpose
    // -------
    // dim counts free blocks only, full_dim all blocks.
    //
    // Given
    // -----
    // - Four scalar blocks; two then all fixed.
    //
    // Expect
    // ------
    // - (4, 4), then (2, 4), then (0, 4).
    fn dims_follow_fixed_status() {
        let mut m = mapping();
        assert_eq!((m.dim(), m.full_dim()), (4, 4));

        let full = m.model_parameters(m.default_parameters().expect("defaults").view()).expect("full");
        m.fix_model_parameters(|p| p.name().starts_with("ar"), full.view()).expect("fix");
        assert_eq!((m.dim(), m.full_dim()), (2, 4));

        m.fix_model_parameters(|_| true, full.view()).expect("fix all");
        assert_eq!((m.dim(), m.full_dim()), (0, 4));
    }

    #[test]
    // Purpose
    // -------
    // Free → full → free round-trips and fixing everything reproduces the
    // full vector exactly.
    //
    // Given
    // -----
    // - Default parameters of the test mapping.
    //
    // Expect
    // ------
    // - function_parameters(model_parameters(θ)) == θ and, after fixing
    //   all blocks, model_parameters(∅) == full.
    fn round_trips_and_fix_all_reproduce_values() {
        // Arrange
        let mut m = mapping();
        let theta = m.default_parameters().expect("defaults");

        // Act
        let full = m.model_parameters(theta.view()).expect("full");
        let back = m.function_parameters(full.view()).expect("free");
        m.fix_model_parameters(|_| true, full.view()).expect("fix");
        let replay = m.model_parameters(Array1::zeros(0).view()).expect("replay");

        // Assert
        assert_eq!(back, theta);
        assert_eq!(full, array![2.0, -0.5, 0.5, 1.0]);
        assert_eq!(replay, full);
    }

    #[test]
    // Purpose
    // -------
    // The largest free variance is pinned to the anchor and the others are
    // rescaled by the same factor.
    //
    // Given
    // -----
    // - Variances (2, 0.5, 1); anchor 1.
    //
    // Expect
    // ------
    // - Block 0 fixed at 1, other variances halved, exactly one fixed block.
    fn fix_max_variance_pins_largest_variance() {
        // Arrange
        let mut m = mapping();
        let mut full = m.model_parameters(m.default_parameters().expect("d").view()).expect("full");

        // Act
        let pinned = m.fix_max_variance(&mut full, 1.0).expect("fix");

        // Assert
        assert_eq!(pinned, Some(0));
        assert_eq!(m.parameters().iter().filter(|p| p.is_fixed()).count(), 1);
        assert_eq!(m.parameters()[0].values()[0], 1.0);
        assert_eq!(full, array![1.0, -0.5, 0.25, 0.5]);
    }

    #[test]
    // Purpose
    // -------
    // A full vector of the wrong length is rejected before anything moves.
    //
    // Given
    // -----
    // - The four-block mapping and vectors of lengths 3 and 5.
    //
    // Expect
    // ------
    // - `DimensionMismatch` with expected 4; no block fixed; input untouched.
    fn fix_max_variance_rejects_wrong_length() {
        let mut m = mapping();
        for mut full in [array![2.0, -0.5, 0.5], array![2.0, -0.5, 0.5, 1.0, 3.0]] {
            let before = full.clone();

            let err = m.fix_max_variance(&mut full, 1.0).expect_err("length mismatch");

            assert!(matches!(err, ParamError::DimensionMismatch { expected: 4, .. }));
            assert_eq!(full, before);
            assert!(m.parameters().iter().all(|p| !p.is_fixed()));
        }
    }

    #[test]
    // Purpose
    // -------
    // Small variances are detected on the standard-deviation scale and
    // projection reports changes.
    //
    // Given
    // -----
    // - Full vector with AR variance 1e-8 and explosive AR coefficient 1.5.
    //
    // Expect
    // ------
    // - small_variances(eps = 1e-3) == [2]; validate reflects 1.5 → 1/1.5.
    fn small_variances_and_validation() {
        let m = mapping();
        let full = array![2.0, -0.5, 1e-8, 1.0];
        assert_eq!(m.small_variances(full.view(), 1e-3), vec![2]);

        let mut free = array![1.0, 1.5, 0.3, 1.0];
        assert!(m.validate(&mut free).expect("validate").is_changed());
        assert_eq!(free[1], 1.0 / 1.5);
    }

    #[test]
    // Purpose
    // -------
    // `map` is deterministic.
    //
    // Given
    // -----
    // - The same free vector mapped twice.
    //
    // Expect
    // ------
    // - Identical systems with state dimension 2 and one series.
    fn map_is_deterministic() {
        let m = mapping();
        let theta = m.default_parameters().expect("d");
        let a = m.map(theta.view()).expect("a");
        let b = m.map(theta.view()).expect("b");
        assert_eq!(a, b);
        assert_eq!(a.state_dim(), 2);
        assert_eq!(a.n_series(), 1);
    }
}
