//! Hyperbolic CORDIC building blocks: the shift schedule, its gain, the
//! atanh lookup table and a single rotation stage.

use super::FixedPoint;

/// Shift amount used by rotation stage `stage`.
///
/// Shifts 4 and 13 are each issued twice; hyperbolic rotations do not
/// converge without those repeats.
pub fn shift_schedule(stage: u32) -> u32 {
    match stage {
        0..=3 => stage + 1,
        4..=12 => stage,
        13 => 13,
        _ => stage - 1,
    }
}

/// Number of rotation stages for `iterations`.
pub fn stage_count(iterations: u32) -> u32 {
    iterations + 2
}

/// Whether a stage shifting by `shift` can still move a value with `frac`
/// fractional bits. Beyond that, `y >> shift` of a negative operand is -1
/// rather than 0, so such stages hold their inputs instead of rotating.
pub fn stage_rotates(shift: u32, frac: u32) -> bool {
    shift <= frac
}

/// K_h = prod sqrt(1 - 2^(-2 k(i))) over the stages that rotate.
pub fn hyperbolic_gain(iterations: u32, frac: u32) -> f64 {
    (0..stage_count(iterations))
        .map(shift_schedule)
        .filter(|&k| stage_rotates(k, frac))
        .map(|k| (1.0 - 2f64.powi(-2 * k as i32)).sqrt())
        .product()
}

/// round(atanh(2^-k) * 2^F) for k in 1..=iterations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtanhTable {
    entries: Vec<FixedPoint>,
}

impl AtanhTable {
    pub fn new(iterations: u32, frac: u32) -> Self {
        let scale = (1u64 << frac) as f64;
        let entries = (1..=iterations as i32)
            .map(|k| (2f64.powi(-k).atanh() * scale).round() as FixedPoint)
            .collect();
        Self { entries }
    }

    /// Angle for shift `k`. Shifts outside the table contribute nothing.
    pub fn get(&self, k: u32) -> FixedPoint {
        if k == 0 {
            return 0;
        }
        self.entries.get(k as usize - 1).copied().unwrap_or(0)
    }
}

/// The (x, y, z) state carried between rotation stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triple {
    pub x: FixedPoint,
    pub y: FixedPoint,
    pub z: FixedPoint,
}

impl Triple {
    /// One hyperbolic rotation by `±atanh(2^-shift)` towards z = 0.
    ///
    /// Both x and y are updated from this stage's inputs.
    pub fn rotate(self, shift: u32, angle: FixedPoint) -> Self {
        let dx = self.y >> shift;
        let dy = self.x >> shift;
        if self.z < 0 {
            Self {
                x: self.x - dx,
                y: self.y - dy,
                z: self.z + angle,
            }
        } else {
            Self {
                x: self.x + dx,
                y: self.y + dy,
                z: self.z - angle,
            }
        }
    }
}
