use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::div::FixedDivider;
use super::exp::ExpEngine;
use super::gelu::GeluEngine;
use super::tanh::{clamp_argument, clamp_unit, ratio_operands, TanhEngine};
use super::{Constants, FixedPoint};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;

/// Source of independent engine instances sharing one set of constants.
///
/// Each worker gets its own engines, so independent inputs never queue
/// behind one another.
#[derive(Debug, Clone)]
pub struct EnginePool {
    constants: Arc<Constants>,
}

impl EnginePool {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            constants: Arc::new(Constants::derive(config)?),
        })
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn exp_engine(&self) -> ExpEngine {
        ExpEngine::with_constants(Arc::clone(&self.constants))
    }

    pub fn tanh_engine(&self) -> TanhEngine {
        TanhEngine::with_constants(Arc::clone(&self.constants))
    }

    pub fn gelu_engine(&self) -> GeluEngine {
        GeluEngine::with_constants(Arc::clone(&self.constants))
    }

    /// tanh of every input, output order matching input order.
    /// Parallelized version using Rayon
    #[cfg(feature = "parallel")]
    pub fn tanh_batch(&self, xs: &[FixedPoint]) -> Result<Vec<FixedPoint>> {
        xs.par_iter()
            .map_init(|| self.tanh_engine(), |engine, &x| engine.run(x))
            .collect()
    }

    /// tanh of every input, output order matching input order.
    /// Sequential version for when parallel feature is not enabled
    #[cfg(not(feature = "parallel"))]
    pub fn tanh_batch(&self, xs: &[FixedPoint]) -> Result<Vec<FixedPoint>> {
        let mut engine = self.tanh_engine();
        xs.iter().map(|&x| engine.run(x)).collect()
    }

    /// GELU of every input, output order matching input order.
    /// Parallelized version using Rayon
    #[cfg(feature = "parallel")]
    pub fn gelu_batch(&self, xs: &[FixedPoint]) -> Result<Vec<FixedPoint>> {
        xs.par_iter()
            .map_init(|| self.gelu_engine(), |engine, &x| engine.run(x))
            .collect()
    }

    /// GELU of every input, output order matching input order.
    /// Sequential version for when parallel feature is not enabled
    #[cfg(not(feature = "parallel"))]
    pub fn gelu_batch(&self, xs: &[FixedPoint]) -> Result<Vec<FixedPoint>> {
        let mut engine = self.gelu_engine();
        xs.iter().map(|&x| engine.run(x)).collect()
    }

    /// tanh(x) with e^x and e^-x evaluated on two separate exp engines.
    /// Bit-identical to `TanhEngine::run`.
    pub fn tanh_split(&self, x: FixedPoint) -> Result<FixedPoint> {
        let x = clamp_argument(x, &self.constants);
        let (exp_pos, exp_neg) = self.exp_pair(x);
        let operands = ratio_operands(exp_pos?, exp_neg?, &self.constants);

        let wide = self.constants.wide;
        let raw = FixedDivider::with_operand(Arc::clone(&self.constants), wide).run(operands)?;
        Ok(clamp_unit(raw, &self.constants))
    }

    #[cfg(feature = "parallel")]
    fn exp_pair(&self, x: FixedPoint) -> (Result<FixedPoint>, Result<FixedPoint>) {
        rayon::join(|| self.exp_engine().run(x), || self.exp_engine().run(-x))
    }

    #[cfg(not(feature = "parallel"))]
    fn exp_pair(&self, x: FixedPoint) -> (Result<FixedPoint>, Result<FixedPoint>) {
        (self.exp_engine().run(x), self.exp_engine().run(-x))
    }
}
