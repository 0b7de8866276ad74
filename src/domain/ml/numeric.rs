//! Log-space helpers shared by training targets and forecast reconstruction.
//!
//! The same clamps apply at train and inference time.

use tracing::debug;

/// Floor applied before taking a logarithm.
pub const EPSILON: f64 = 1e-6;

fn clamp_positive(value: f64) -> f64 {
    if value < EPSILON {
        debug!(value, floor = EPSILON, "Clamping non-positive value before log");
        EPSILON
    } else {
        value
    }
}

/// ln(max(next, ε)) - ln(max(prev, ε)). Always finite for finite inputs.
pub fn log_delta(prev: f64, next: f64) -> f64 {
    clamp_positive(next).ln() - clamp_positive(prev).ln()
}

/// Inverse of `log_delta`: exp(ln(max(last, ε)) + delta), floored at 0.
pub fn reconstruct(last: f64, delta: f64) -> f64 {
    let base = clamp_positive(last);
    if delta == 0.0 {
        return base;
    }
    (base.ln() + delta).exp().max(0.0)
}
