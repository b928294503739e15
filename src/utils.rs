//! Double-precision reference versions of the fixed-point engines.
//! Used as oracles in tests and by the command-line harness.

/// e^z
pub fn exp_ref(z: f64) -> f64 {
    z.exp()
}

/// Plain real division
pub fn div_ref(numerator: f64, denominator: f64) -> f64 {
    numerator / denominator
}

/// Hyperbolic tangent
pub fn tanh_ref(x: f64) -> f64 {
    x.tanh()
}

/// GELU with the same tanh approximation the fixed-point engine evaluates
pub fn gelu_ref(x: f64) -> f64 {
    let inner = (2.0 / std::f64::consts::PI).sqrt() * (x + 0.044715 * x * x * x);
    0.5 * x * (1.0 + inner.tanh())
}
