//! Fixed-point tanh and GELU built only from shifts, adds and compares.
//!
//! e^z comes from a range-reduced hyperbolic CORDIC engine, quotients from a
//! shift-and-subtract divider, and tanh/GELU are small state machines stacked
//! on top of them. Every engine accepts one request at a time and can be
//! driven tick by tick or run to completion.

pub mod config;
pub mod engine;
pub mod error;
pub mod fixed_point;
pub mod utils;

pub use config::{Config, DivByZeroPolicy};
pub use engine::Engine;
pub use error::{Error, Result};
pub use fixed_point::{
    compute_exp, decode_fixed, divide, encode_fixed, gelu, tanh, EnginePool, ExpEngine,
    FixedDivider, FixedPoint, Format, GeluEngine, TanhEngine,
};
