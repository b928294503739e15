use thiserror::Error;

use crate::fixed_point::FixedPoint;

/// Failures surfaced by the fixed-point engines.
///
/// Saturation of intermediate values is never reported here; it is resolved
/// inside the arithmetic. Only caller contract violations and the
/// boundary conditions of the exponential and the divider are errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// `start` was called while a request was still outstanding.
    ///
    /// The in-flight request is left untouched.
    #[error("{engine} engine is busy with an outstanding request")]
    Busy { engine: &'static str },

    /// The engine went idle without producing a result.
    #[error("{engine} engine is idle, no result available")]
    Idle { engine: &'static str },

    /// Range reduction would need more ln2 steps than the counter can hold.
    #[error("exponent {z} is outside the reducible domain [{lo}, {hi}]")]
    DomainOverflow {
        z: FixedPoint,
        lo: FixedPoint,
        hi: FixedPoint,
    },

    /// An operand does not fit the engine's input format.
    #[error("operand {value} is outside the input format [{lo}, {hi}]")]
    OperandOutOfRange {
        value: FixedPoint,
        lo: FixedPoint,
        hi: FixedPoint,
    },

    /// Denominator was zero and the divider is configured to reject it.
    #[error("division of {numerator} by zero")]
    DivisionByZero { numerator: FixedPoint },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
