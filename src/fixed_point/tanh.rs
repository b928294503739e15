use std::sync::Arc;

use tracing::{debug, trace};

use super::div::FixedDivider;
use super::exp::ExpEngine;
use super::{add, saturate, sub, Constants, FixedPoint};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TanhState {
    Idle,
    ComputeExpPos { x: FixedPoint },
    ComputeExpNeg { exp_pos: FixedPoint },
    Divide,
    Saturate { raw: FixedPoint },
    Done(FixedPoint),
}

/// tanh(x) = (e^x - e^-x) / (e^x + e^-x).
///
/// Both exponentials go through the same `ExpEngine`, one after the other,
/// then a wide-operand divider forms the ratio and the result is clamped to
/// [-1, 1].
#[derive(Debug, Clone)]
pub struct TanhEngine {
    constants: Arc<Constants>,
    exp: ExpEngine,
    divider: FixedDivider,
    state: TanhState,
    ticks: u64,
}

/// Clamp `x` to where both e^x and e^-x can be range-reduced. tanh is
/// within one ulp of ±1 long before that bound.
pub(crate) fn clamp_argument(x: FixedPoint, constants: &Constants) -> FixedPoint {
    let (_, limit) = constants.exp_domain();
    let clamped = saturate(x, -limit, limit);
    if clamped != x {
        debug!(x, clamped, "tanh argument clamped to exponential domain");
    }
    clamped
}

/// (e^x - e^-x, e^x + e^-x) in the wide format.
pub(crate) fn ratio_operands(
    exp_pos: FixedPoint,
    exp_neg: FixedPoint,
    constants: &Constants,
) -> (FixedPoint, FixedPoint) {
    (
        sub(exp_pos, exp_neg, &constants.wide),
        add(exp_pos, exp_neg, &constants.wide),
    )
}

pub(crate) fn clamp_unit(raw: FixedPoint, constants: &Constants) -> FixedPoint {
    saturate(raw, -constants.one, constants.one)
}

impl TanhEngine {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_constants(Arc::new(Constants::derive(config)?)))
    }

    pub fn with_constants(constants: Arc<Constants>) -> Self {
        let wide = constants.wide;
        Self {
            exp: ExpEngine::with_constants(Arc::clone(&constants)),
            divider: FixedDivider::with_operand(Arc::clone(&constants), wide),
            constants,
            state: TanhState::Idle,
            ticks: 0,
        }
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub(crate) fn reset(&mut self) {
        self.state = TanhState::Idle;
        self.exp.reset();
        self.divider.reset();
    }

    fn advance(&mut self) -> Result<TanhState> {
        let next = match self.state {
            TanhState::ComputeExpPos { x } => {
                self.exp.tick()?;
                match self.exp.take_result() {
                    Some(exp_pos) => {
                        self.exp.start(-x)?;
                        TanhState::ComputeExpNeg { exp_pos }
                    }
                    None => self.state,
                }
            }
            TanhState::ComputeExpNeg { exp_pos } => {
                self.exp.tick()?;
                match self.exp.take_result() {
                    Some(exp_neg) => {
                        let operands = ratio_operands(exp_pos, exp_neg, &self.constants);
                        self.divider.start(operands)?;
                        TanhState::Divide
                    }
                    None => self.state,
                }
            }
            TanhState::Divide => {
                self.divider.tick()?;
                match self.divider.take_result() {
                    Some(raw) => TanhState::Saturate { raw },
                    None => self.state,
                }
            }
            TanhState::Saturate { raw } => TanhState::Done(clamp_unit(raw, &self.constants)),
            other => other,
        };
        Ok(next)
    }
}

impl Engine for TanhEngine {
    type Input = FixedPoint;

    const NAME: &'static str = "tanh";

    fn start(&mut self, x: FixedPoint) -> Result<()> {
        if self.state != TanhState::Idle {
            return Err(Error::Busy { engine: Self::NAME });
        }

        let x = clamp_argument(x, &self.constants);
        self.exp.start(x)?;
        self.state = TanhState::ComputeExpPos { x };
        self.ticks = 0;
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        if !self.is_busy() {
            return Ok(());
        }

        self.ticks += 1;
        match self.advance() {
            Ok(next) => {
                if next != self.state {
                    trace!(from = ?self.state, to = ?next, "tanh transition");
                }
                self.state = next;
            }
            Err(err) => {
                self.reset();
                return Err(err);
            }
        }

        if let TanhState::Done(result) = self.state {
            debug!(result, ticks = self.ticks, "tanh complete");
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        !matches!(self.state, TanhState::Idle | TanhState::Done(_))
    }

    fn take_result(&mut self) -> Option<FixedPoint> {
        match self.state {
            TanhState::Done(result) => {
                self.state = TanhState::Idle;
                Some(result)
            }
            _ => None,
        }
    }

    fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// tanh(x) on a fresh engine.
pub fn tanh(x: FixedPoint, config: &Config) -> Result<FixedPoint> {
    TanhEngine::new(config)?.run(x)
}
