pub mod point;

/// Geometric precision
pub(crate) const EPS: f64 = 1e-13;
