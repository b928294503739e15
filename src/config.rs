use std::str::FromStr;

use crate::error::{Error, Result};

/// What the divider does when asked to divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DivByZeroPolicy {
    /// Report `Error::DivisionByZero`.
    #[default]
    Error,
    /// Skip the iterations and hand back the pre-scaled accumulator, i.e. the
    /// low `total_width` bits of `|numerator| << frac_width`.
    Passthrough,
}

impl FromStr for DivByZeroPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(Self::Error),
            "passthrough" => Ok(Self::Passthrough),
            other => Err(Error::InvalidConfig(format!(
                "unknown division-by-zero policy `{}` (expected error|passthrough)",
                other
            ))),
        }
    }
}

// Configuration for the fixed-point engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub total_width: u32,        // W: bits per value, sign included
    pub frac_width: u32,         // F: fractional bits
    pub cordic_iterations: u32,  // N: rotation stages run N + 2 times
    pub range_counter_bits: u32, // signed width of the ln2 reduction counter
    pub div_by_zero: DivByZeroPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_width: 32,
            frac_width: 25,
            cordic_iterations: 24,
            range_counter_bits: 6,
            div_by_zero: DivByZeroPolicy::Error,
        }
    }
}

impl Config {
    /// Check that every derived quantity is representable.
    ///
    /// Exponentials are carried at twice `total_width`, so `total_width` is
    /// capped at 32 to keep them inside an `i64`.
    pub fn validate(&self) -> Result<()> {
        if !(8..=32).contains(&self.total_width) {
            return Err(Error::InvalidConfig(format!(
                "total_width must be in 8..=32, got {}",
                self.total_width
            )));
        }
        if self.frac_width == 0 || self.frac_width > self.total_width - 2 {
            return Err(Error::InvalidConfig(format!(
                "frac_width must be in 1..={} for total_width {}, got {}",
                self.total_width - 2,
                self.total_width,
                self.frac_width
            )));
        }
        if !(4..=62).contains(&self.cordic_iterations) {
            return Err(Error::InvalidConfig(format!(
                "cordic_iterations must be in 4..=62, got {}",
                self.cordic_iterations
            )));
        }
        if !(2..=8).contains(&self.range_counter_bits) {
            return Err(Error::InvalidConfig(format!(
                "range_counter_bits must be in 2..=8, got {}",
                self.range_counter_bits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.total_width, 32);
        assert_eq!(config.frac_width, 25);
        assert_eq!(config.cordic_iterations, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_fields() {
        let cases = vec![
            Config { total_width: 64, ..Config::default() },
            Config { total_width: 4, frac_width: 1, ..Config::default() },
            Config { frac_width: 0, ..Config::default() },
            Config { frac_width: 31, ..Config::default() },
            Config { cordic_iterations: 2, ..Config::default() },
            Config { range_counter_bits: 12, ..Config::default() },
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(Error::InvalidConfig(_))),
                "expected {:?} to be rejected",
                config
            );
        }
    }

    #[test]
    fn test_widest_fraction_is_accepted() {
        let config = Config { frac_width: 30, ..Config::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("error".parse::<DivByZeroPolicy>(), Ok(DivByZeroPolicy::Error));
        assert_eq!(
            "passthrough".parse::<DivByZeroPolicy>(),
            Ok(DivByZeroPolicy::Passthrough)
        );
        assert!("saturate".parse::<DivByZeroPolicy>().is_err());
    }
}
