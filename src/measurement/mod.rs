//! Transmittance measurements.
//!
//! [`RatioMeasurement`] holds already point-wise compatible data of any
//! dimensionality. [`AlignedSeriesMeasurement`] specializes it for 1-D scans
//! and knows how to get there from ragged scans.

pub mod aligned;
pub mod ratio;

pub use aligned::AlignedSeriesMeasurement;
pub use ratio::{Offsets, RatioMeasurement};
