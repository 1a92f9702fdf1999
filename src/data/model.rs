use std::fmt;

use ndarray::{Array1, ArrayView1};

use crate::measurement::{AlignedSeriesMeasurement, RatioMeasurement};
use crate::numerics::{CubicSpline, ShapeFit};

// ---------------------------------------------------------------------------
// ReferenceModel – how a reference value is guessed at any wavelength
// ---------------------------------------------------------------------------

/// Continuous stand-in for a reference scan, used to evaluate the reference
/// at positions where it was never sampled.
#[derive(Debug, Clone)]
pub enum ReferenceModel {
    /// Cubic spline through the reference samples.
    Spline(CubicSpline),
    /// `scale · (offset + shape(x))` fitted to the reference samples.
    Fitted(ShapeFit),
}

impl ReferenceModel {
    pub fn evaluate(&self, x: f64) -> f64 {
        match self {
            ReferenceModel::Spline(spline) => spline.evaluate(x),
            ReferenceModel::Fitted(fit) => fit.evaluate(x),
        }
    }

    pub fn evaluate_many(&self, xs: ArrayView1<f64>) -> Array1<f64> {
        xs.mapv(|x| self.evaluate(x))
    }
}

// ---------------------------------------------------------------------------
// Measurement – what a collection can hold
// ---------------------------------------------------------------------------

/// Closed set of measurement variants stored in collections.
#[derive(Debug, Clone)]
pub enum Measurement {
    Ratio(RatioMeasurement),
    AlignedSeries(AlignedSeriesMeasurement),
}

/// Variant tag of a [`Measurement`], used for membership restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeasurementKind {
    Ratio,
    AlignedSeries,
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementKind::Ratio => write!(f, "ratio"),
            MeasurementKind::AlignedSeries => write!(f, "aligned series"),
        }
    }
}

impl Measurement {
    pub fn kind(&self) -> MeasurementKind {
        match self {
            Measurement::Ratio(_) => MeasurementKind::Ratio,
            Measurement::AlignedSeries(_) => MeasurementKind::AlignedSeries,
        }
    }

    pub fn as_aligned(&self) -> Option<&AlignedSeriesMeasurement> {
        match self {
            Measurement::AlignedSeries(series) => Some(series),
            Measurement::Ratio(_) => None,
        }
    }
}

impl From<RatioMeasurement> for Measurement {
    fn from(m: RatioMeasurement) -> Self {
        Measurement::Ratio(m)
    }
}

impl From<AlignedSeriesMeasurement> for Measurement {
    fn from(m: AlignedSeriesMeasurement) -> Self {
        Measurement::AlignedSeries(m)
    }
}
