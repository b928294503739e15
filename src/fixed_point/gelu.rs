use std::sync::Arc;

use tracing::{debug, trace};

use super::tanh::TanhEngine;
use super::{add, multiply, Constants, FixedPoint};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeluState {
    Idle,
    Square { x: FixedPoint },
    Cube { x: FixedPoint, x2: FixedPoint },
    ScaleCubic { x: FixedPoint, x3: FixedPoint },
    AddLinear { x: FixedPoint, term1: FixedPoint },
    ScaleArg { x: FixedPoint, term2: FixedPoint },
    Tanh { x: FixedPoint },
    AddOne { x: FixedPoint, tanh: FixedPoint },
    MultiplyX { x: FixedPoint, sum: FixedPoint },
    Halve { product: FixedPoint },
    Done(FixedPoint),
}

/// GELU(x) ~= 0.5 x (1 + tanh(sqrt(2/pi) (x + 0.044715 x^3))).
///
/// Every multiply or add is its own stage and rescales with the truncating
/// `multiply`, so results match a stage-by-stage evaluation bit for bit.
#[derive(Debug, Clone)]
pub struct GeluEngine {
    constants: Arc<Constants>,
    tanh: TanhEngine,
    state: GeluState,
    ticks: u64,
}

impl GeluEngine {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_constants(Arc::new(Constants::derive(config)?)))
    }

    pub fn with_constants(constants: Arc<Constants>) -> Self {
        Self {
            tanh: TanhEngine::with_constants(Arc::clone(&constants)),
            constants,
            state: GeluState::Idle,
            ticks: 0,
        }
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    fn advance(&mut self) -> Result<GeluState> {
        let c = &self.constants;
        let f = &c.format;
        let next = match self.state {
            GeluState::Square { x } => GeluState::Cube { x, x2: multiply(x, x, f) },
            GeluState::Cube { x, x2 } => GeluState::ScaleCubic { x, x3: multiply(x2, x, f) },
            GeluState::ScaleCubic { x, x3 } => GeluState::AddLinear {
                x,
                term1: multiply(x3, c.gelu_c1, f),
            },
            GeluState::AddLinear { x, term1 } => GeluState::ScaleArg {
                x,
                term2: add(x, term1, f),
            },
            GeluState::ScaleArg { x, term2 } => {
                self.tanh.start(multiply(term2, c.gelu_c2, f))?;
                GeluState::Tanh { x }
            }
            GeluState::Tanh { x } => {
                self.tanh.tick()?;
                match self.tanh.take_result() {
                    Some(tanh) => GeluState::AddOne { x, tanh },
                    None => self.state,
                }
            }
            GeluState::AddOne { x, tanh } => GeluState::MultiplyX {
                x,
                sum: add(c.one, tanh, f),
            },
            GeluState::MultiplyX { x, sum } => GeluState::Halve {
                product: multiply(sum, x, f),
            },
            // 0.5 is a power of two, so the halving is an exact shift
            GeluState::Halve { product } => GeluState::Done(product >> 1),
            other => other,
        };
        Ok(next)
    }
}

impl Engine for GeluEngine {
    type Input = FixedPoint;

    const NAME: &'static str = "gelu";

    fn start(&mut self, x: FixedPoint) -> Result<()> {
        if self.state != GeluState::Idle {
            return Err(Error::Busy { engine: Self::NAME });
        }
        self.constants.format.check(x)?;

        self.state = GeluState::Square { x };
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
                    trace!(from = ?self.state, to = ?next, "gelu transition");
                }
                self.state = next;
            }
            Err(err) => {
                self.state = GeluState::Idle;
                self.tanh.reset();
                return Err(err);
            }
        }

        if let GeluState::Done(result) = self.state {
            debug!(result, ticks = self.ticks, "gelu complete");
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        !matches!(self.state, GeluState::Idle | GeluState::Done(_))
    }

    fn take_result(&mut self) -> Option<FixedPoint> {
        match self.state {
            GeluState::Done(result) => {
                self.state = GeluState::Idle;
                Some(result)
            }
            _ => None,
        }
    }

    fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// GELU(x) on a fresh engine.
pub fn gelu(x: FixedPoint, config: &Config) -> Result<FixedPoint> {
    GeluEngine::new(config)?.run(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::{decode_fixed, encode_fixed, FixedPointExt};
    use crate::utils::gelu_ref;

    const ONE: FixedPoint = 33_554_432;

    fn engine() -> GeluEngine {
        GeluEngine::new(&Config::default()).unwrap()
    }

    #[test]
    fn test_gelu_known_values() {
        let mut engine = engine();
        assert_eq!(engine.run(0), Ok(0));
        // GELU(1) * 2^25 = 28225719.8
        assert_eq!(engine.run(ONE), Ok(28_225_719));
        assert_eq!(engine.run(-ONE), Ok(-5_328_713));
        assert_eq!(engine.run(2 * ONE), Ok(65_585_414));
    }

    #[test]
    fn test_gelu_matches_stagewise_formula() {
        let mut engine = engine();
        let c = engine.constants().clone();
        let f = c.format;
        let x = encode_fixed(0.8125, &f);

        let x3 = multiply(multiply(x, x, &f), x, &f);
        let arg = multiply(add(x, multiply(x3, c.gelu_c1, &f), &f), c.gelu_c2, &f);
        let t = tanh_of(arg);
        let expected = multiply(add(c.one, t, &f), x, &f) >> 1;

        assert_eq!(engine.run(x), Ok(expected));
    }

    fn tanh_of(x: FixedPoint) -> FixedPoint {
        crate::fixed_point::tanh(x, &Config::default()).unwrap()
    }

    #[test]
    fn test_gelu_fixed_against_f64() {
        let mut engine = engine();
        let format = engine.constants().format;

        let mut x = -6.0;
        while x <= 6.0 {
            let x_fixed = encode_fixed(x, &format);
            let result = decode_fixed(engine.run(x_fixed).unwrap(), &format);
            let expected = gelu_ref(decode_fixed(x_fixed, &format));

            println!(
                "Testing gelu({:.4}): Expected = {:.9}, Got = {:.9}",
                x, expected, result
            );
            assert!(
                (result - expected).abs() < 1e-4,
                "Mismatch in gelu({:.4}): Expected {:.9}, Got {:.9}",
                x,
                expected,
                result
            );
            x += 0.25 + 0.0071;
        }
    }

    #[test]
    fn test_gelu_tails() {
        let mut engine = engine();
        let format = engine.constants().format;

        // x^3 saturates, tanh is already at ±1
        let ten = FixedPoint::normalize(10, &format);
        let pos = engine.run(ten).unwrap();
        let neg = engine.run(-ten).unwrap();
        assert!((pos - ten).abs() <= 8, "gelu(10) = {}", pos);
        assert!(neg.abs() <= 8, "gelu(-10) = {}", neg);
    }

    #[test]
    fn test_gelu_is_deterministic() {
        let mut engine = engine();
        let x = encode_fixed(-1.37, &engine.constants().format);
        let first = engine.run(x).unwrap();
        for _ in 0..5 {
            assert_eq!(engine.run(x), Ok(first));
        }
        assert_eq!(gelu(x, &Config::default()), Ok(first));
    }

    #[test]
    fn test_input_outside_format_is_rejected() {
        let mut engine = engine();
        let format = engine.constants().format;

        assert_eq!(
            engine.run(format.max_value() + 1),
            Err(Error::OperandOutOfRange {
                value: format.max_value() + 1,
                lo: format.min_value(),
                hi: format.max_value(),
            })
        );
        assert!(engine.run(format.min_value()).is_ok());
        assert_eq!(engine.run(ONE), Ok(28_225_719));
    }

    #[test]
    fn test_start_while_busy_is_rejected() {
        let mut engine = engine();
        engine.start(ONE).unwrap();
        for _ in 0..10 {
            engine.tick().unwrap();
        }
        assert_eq!(engine.start(ONE), Err(Error::Busy { engine: "gelu" }));

        while engine.is_busy() {
            engine.tick().unwrap();
        }
        assert_eq!(engine.take_result(), Some(28_225_719));
        // four arithmetic stages, the tanh launch, 146 tanh ticks, three tail stages
        assert_eq!(engine.ticks(), 4 + 1 + 146 + 3);
    }
}
