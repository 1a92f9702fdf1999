//! Numerical building blocks for series reconciliation: interpolation,
//! shape fitting and the two-dimensional array helpers used to keep
//! `(independent, value)` pairs together.

pub mod arrays;
pub mod fit;
pub mod spline;

pub use arrays::{sort_mutually, stick_together};
pub use fit::{ReferenceShape, ShapeFit};
pub use spline::CubicSpline;
