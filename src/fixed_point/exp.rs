use std::sync::Arc;

use tracing::{debug, trace};

use super::cordic::{shift_schedule, stage_count, stage_rotates, Triple};
use super::{shift, Constants, FixedPoint};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpState {
    Idle,
    Reduce { z: FixedPoint, k: i32 },
    Rotate { stage: u32, triple: Triple, k: i32 },
    Done(FixedPoint),
}

/// Computes e^z with range reduction followed by hyperbolic CORDIC.
///
/// One tick performs either one ln2 reduction step or one rotation stage.
/// Results are carried in the double-width format of the configuration.
#[derive(Debug, Clone)]
pub struct ExpEngine {
    constants: Arc<Constants>,
    state: ExpState,
    ticks: u64,
}

impl ExpEngine {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_constants(Arc::new(Constants::derive(config)?)))
    }

    pub fn with_constants(constants: Arc<Constants>) -> Self {
        Self {
            constants,
            state: ExpState::Idle,
            ticks: 0,
        }
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub(crate) fn reset(&mut self) {
        self.state = ExpState::Idle;
    }

    fn advance(&self, state: ExpState) -> ExpState {
        let c = &self.constants;
        match state {
            ExpState::Reduce { z, k } if z > c.ln2 => {
                debug_assert!(k < c.k_max);
                ExpState::Reduce { z: z - c.ln2, k: k + 1 }
            }
            ExpState::Reduce { z, k } if z < -c.ln2 => {
                debug_assert!(k > c.k_min);
                ExpState::Reduce { z: z + c.ln2, k: k - 1 }
            }
            ExpState::Reduce { z, k } => ExpState::Rotate {
                stage: 0,
                triple: Triple { x: c.gain_inv, y: 0, z },
                k,
            },
            ExpState::Rotate { stage, triple, k } => {
                let s = shift_schedule(stage);
                let triple = if stage_rotates(s, c.format.frac) {
                    triple.rotate(s, c.atanh.get(s))
                } else {
                    triple
                };
                if stage + 1 < stage_count(c.iterations) {
                    ExpState::Rotate { stage: stage + 1, triple, k }
                } else {
                    // gain is pre-compensated, so x + y is e^z directly
                    ExpState::Done(shift(triple.x + triple.y, k, &c.wide))
                }
            }
            other => other,
        }
    }
}

impl Engine for ExpEngine {
    type Input = FixedPoint;

    const NAME: &'static str = "exp";

    fn start(&mut self, z: FixedPoint) -> Result<()> {
        if self.state != ExpState::Idle {
            return Err(Error::Busy { engine: Self::NAME });
        }

        let (lo, hi) = self.constants.exp_domain();
        if z < lo || z > hi {
            return Err(Error::DomainOverflow { z, lo, hi });
        }

        self.state = ExpState::Reduce { z, k: 0 };
        self.ticks = 0;
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        if !self.is_busy() {
            return Ok(());
        }

        self.ticks += 1;
        self.state = self.advance(self.state);
        trace!(state = ?self.state, "exp tick");

        if let ExpState::Done(result) = self.state {
            debug!(result, ticks = self.ticks, "exp complete");
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        matches!(self.state, ExpState::Reduce { .. } | ExpState::Rotate { .. })
    }

    fn take_result(&mut self) -> Option<FixedPoint> {
        match self.state {
            ExpState::Done(result) => {
                self.state = ExpState::Idle;
                Some(result)
            }
            _ => None,
        }
    }

    fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// e^z on a fresh engine.
pub fn compute_exp(z: FixedPoint, config: &Config) -> Result<FixedPoint> {
    ExpEngine::new(config)?.run(z)
}
