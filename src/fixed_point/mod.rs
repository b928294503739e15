pub mod batch;
pub mod cordic;
pub mod div;
pub mod exp;
pub mod gelu;
pub mod tanh;

pub use batch::EnginePool;
pub use cordic::{hyperbolic_gain, shift_schedule, stage_rotates, AtanhTable, Triple};
pub use div::{divide, FixedDivider};
pub use exp::{compute_exp, ExpEngine};
pub use gelu::{gelu, GeluEngine};
pub use tanh::{tanh, TanhEngine};

use tracing::debug;

use crate::config::{Config, DivByZeroPolicy};
use crate::error::{Error, Result};

/// Raw two's-complement word. Only the low `Format::width` bits are meaningful.
pub type FixedPoint = i64;

/// Q(width-1-frac).frac layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    pub width: u32,
    pub frac: u32,
}

impl Format {
    pub fn new(width: u32, frac: u32) -> Self {
        debug_assert!(width <= 64 && frac < width);
        Self { width, frac }
    }

    pub fn min_value(&self) -> FixedPoint {
        FixedPoint::MIN >> (64 - self.width)
    }

    pub fn max_value(&self) -> FixedPoint {
        FixedPoint::MAX >> (64 - self.width)
    }

    pub fn one(&self) -> FixedPoint {
        1 << self.frac
    }

    /// Same fraction, twice the width. Used for exponentials, which leave the
    /// base range long before tanh stops needing them.
    pub fn widened(&self) -> Self {
        Self::new(self.width * 2, self.frac)
    }

    pub fn contains(&self, value: FixedPoint) -> bool {
        (self.min_value()..=self.max_value()).contains(&value)
    }

    /// Reject values that do not fit, rather than silently dropping high bits.
    pub fn check(&self, value: FixedPoint) -> Result<FixedPoint> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(Error::OperandOutOfRange {
                value,
                lo: self.min_value(),
                hi: self.max_value(),
            })
        }
    }

    /// Clamp a double-width intermediate into this format.
    pub fn clamp_wide(&self, value: i128) -> FixedPoint {
        value.clamp(self.min_value() as i128, self.max_value() as i128) as FixedPoint
    }

    /// Keep the low `width` bits and sign-extend, as a register of this width would.
    pub fn wrap(&self, value: i128) -> FixedPoint {
        let unused = 64 - self.width;
        ((value as FixedPoint) << unused) >> unused
    }
}

pub trait FixedPointExt {
    fn one(format: &Format) -> Self;
    fn normalize(n: i64, format: &Format) -> Self;
}

impl FixedPointExt for FixedPoint {
    fn one(format: &Format) -> Self {
        format.one()
    }

    fn normalize(n: i64, format: &Format) -> Self {
        format.clamp_wide((n as i128) << format.frac)
    }
}

/// Truncating fixed-point product: the exact double-width product is
/// arithmetically shifted right by `frac` (rounds toward negative infinity),
/// then saturated to the format.
pub fn multiply(a: FixedPoint, b: FixedPoint, format: &Format) -> FixedPoint {
    format.clamp_wide((a as i128 * b as i128) >> format.frac)
}

/// Saturating sum.
pub fn add(a: FixedPoint, b: FixedPoint, format: &Format) -> FixedPoint {
    format.clamp_wide(a as i128 + b as i128)
}

/// Saturating difference.
pub fn sub(a: FixedPoint, b: FixedPoint, format: &Format) -> FixedPoint {
    format.clamp_wide(a as i128 - b as i128)
}

pub fn saturate(value: FixedPoint, lo: FixedPoint, hi: FixedPoint) -> FixedPoint {
    debug_assert!(lo <= hi);
    value.max(lo).min(hi)
}

/// Multiply by `2^k`: left shift saturating to the format for `k > 0`,
/// sign-preserving arithmetic right shift otherwise.
pub fn shift(value: FixedPoint, k: i32, format: &Format) -> FixedPoint {
    if k >= 0 {
        if value == 0 {
            0
        } else if k >= 64 {
            if value > 0 {
                format.max_value()
            } else {
                format.min_value()
            }
        } else {
            format.clamp_wide((value as i128) << k)
        }
    } else {
        value >> k.unsigned_abs().min(63)
    }
}

/// Helper function to convert `f64` to `FixedPoint` fixed-point (truncating).
pub fn encode_fixed(value: f64, format: &Format) -> FixedPoint {
    let scale = (1u64 << format.frac) as f64;
    format.clamp_wide((value * scale) as i128)
}

/// Helper function to convert `FixedPoint` fixed-point back to `f64`.
pub fn decode_fixed(value: FixedPoint, format: &Format) -> f64 {
    value as f64 / (1u64 << format.frac) as f64
}

/// Every numeric constant the engines use, derived from a `Config`.
#[derive(Debug, Clone)]
pub struct Constants {
    pub format: Format,
    pub wide: Format,
    pub iterations: u32,
    pub one: FixedPoint,
    pub ln2: FixedPoint,
    pub gain_inv: FixedPoint, // round(2^F / K_h)
    pub gelu_c1: FixedPoint,  // 0.044715
    pub gelu_c2: FixedPoint,  // sqrt(2/pi)
    pub atanh: AtanhTable,
    pub k_min: i32,
    pub k_max: i32,
    pub div_by_zero: DivByZeroPolicy,
}

impl Constants {
    pub fn derive(config: &Config) -> Result<Self> {
        config.validate()?;

        let format = Format::new(config.total_width, config.frac_width);
        let scale = (1u64 << config.frac_width) as f64;
        let quantize = |value: f64| (value * scale).round() as FixedPoint;

        let gain = hyperbolic_gain(config.cordic_iterations, config.frac_width);
        let half_range = 1i32 << (config.range_counter_bits - 1);

        let constants = Self {
            format,
            wide: format.widened(),
            iterations: config.cordic_iterations,
            one: FixedPoint::one(&format),
            ln2: quantize(std::f64::consts::LN_2),
            gain_inv: quantize(1.0 / gain),
            gelu_c1: quantize(0.044715),
            gelu_c2: quantize((2.0 / std::f64::consts::PI).sqrt()),
            atanh: AtanhTable::new(config.cordic_iterations, config.frac_width),
            k_min: -half_range,
            k_max: half_range - 1,
            div_by_zero: config.div_by_zero,
        };

        debug!(
            width = format.width,
            frac = format.frac,
            iterations = constants.iterations,
            ln2 = constants.ln2,
            gain_inv = constants.gain_inv,
            "derived fixed-point constants"
        );

        Ok(constants)
    }

    /// Inputs the exponential can range-reduce without overflowing the
    /// signed reduction counter.
    pub fn exp_domain(&self) -> (FixedPoint, FixedPoint) {
        (
            (self.k_min as FixedPoint - 1) * self.ln2,
            (self.k_max as FixedPoint + 1) * self.ln2,
        )
    }
}
