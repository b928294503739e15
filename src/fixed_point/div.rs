use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::{Constants, FixedPoint, Format};
use crate::config::{Config, DivByZeroPolicy};
use crate::engine::Engine;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DivState {
    Idle,
    Iterate {
        remainder: u128,
        quotient: u128,
        divisor: u128,
        negative: bool,
        remaining: u32,
    },
    Done(FixedPoint),
}

/// Signed fixed-point division by shift-and-subtract on magnitudes.
///
/// The dividend `|n| << F` sits in the low `operand.width + F` bits of a
/// `[remainder : quotient]` accumulator. Each tick shifts the accumulator left
/// by one and subtracts the divisor from the remainder slice when it fits,
/// appending one quotient bit. The quotient keeps the low `W` bits of its
/// magnitude, so quotients outside the format wrap.
#[derive(Debug, Clone)]
pub struct FixedDivider {
    constants: Arc<Constants>,
    operand: Format,
    state: DivState,
    ticks: u64,
}

impl FixedDivider {
    pub fn new(config: &Config) -> Result<Self> {
        let constants = Arc::new(Constants::derive(config)?);
        let operand = constants.format;
        Ok(Self::with_operand(constants, operand))
    }

    /// Divider accepting operands of `operand` width. The quotient is always
    /// in the base format.
    pub fn with_operand(constants: Arc<Constants>, operand: Format) -> Self {
        debug_assert!(operand.width + constants.format.frac < 128);
        Self {
            constants,
            operand,
            state: DivState::Idle,
            ticks: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.state = DivState::Idle;
    }

    fn iterations(&self) -> u32 {
        self.operand.width + self.constants.format.frac
    }

    fn finish(&self, magnitude: u128, negative: bool) -> FixedPoint {
        let format = &self.constants.format;
        let low = (magnitude & ((1u128 << format.width) - 1)) as i128;
        format.wrap(if negative { -low } else { low })
    }
}

impl Engine for FixedDivider {
    type Input = (FixedPoint, FixedPoint);

    const NAME: &'static str = "divider";

    fn start(&mut self, (numerator, denominator): (FixedPoint, FixedPoint)) -> Result<()> {
        if self.state != DivState::Idle {
            return Err(Error::Busy { engine: Self::NAME });
        }
        self.operand.check(numerator)?;
        self.operand.check(denominator)?;

        let frac = self.constants.format.frac;
        let dividend = (numerator.unsigned_abs() as u128) << frac;
        self.ticks = 0;

        if denominator == 0 {
            return match self.constants.div_by_zero {
                DivByZeroPolicy::Error => Err(Error::DivisionByZero { numerator }),
                DivByZeroPolicy::Passthrough => {
                    warn!(numerator, "division by zero, returning scaled numerator");
                    self.state = DivState::Done(self.finish(dividend, false));
                    Ok(())
                }
            };
        }

        self.state = DivState::Iterate {
            remainder: 0,
            quotient: dividend,
            divisor: denominator.unsigned_abs() as u128,
            negative: (numerator < 0) != (denominator < 0),
            remaining: self.iterations(),
        };
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        let DivState::Iterate {
            remainder,
            quotient,
            divisor,
            negative,
            remaining,
        } = self.state
        else {
            return Ok(());
        };

        self.ticks += 1;
        let iterations = self.iterations();
        let mask = (1u128 << iterations) - 1;

        let mut remainder = (remainder << 1) | ((quotient >> (iterations - 1)) & 1);
        let mut quotient = (quotient << 1) & mask;
        if remainder >= divisor {
            remainder -= divisor;
            quotient |= 1;
        }

        self.state = if remaining > 1 {
            DivState::Iterate {
                remainder,
                quotient,
                divisor,
                negative,
                remaining: remaining - 1,
            }
        } else {
            let result = self.finish(quotient, negative);
            debug!(result, ticks = self.ticks, "divide complete");
            DivState::Done(result)
        };
        trace!(state = ?self.state, "divider tick");
        Ok(())
    }

    fn is_busy(&self) -> bool {
        matches!(self.state, DivState::Iterate { .. })
    }

    fn take_result(&mut self) -> Option<FixedPoint> {
        match self.state {
            DivState::Done(result) => {
                self.state = DivState::Idle;
                Some(result)
            }
            _ => None,
        }
    }

    fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// numerator / denominator on a fresh engine.
pub fn divide(numerator: FixedPoint, denominator: FixedPoint, config: &Config) -> Result<FixedPoint> {
    FixedDivider::new(config)?.run((numerator, denominator))
}
