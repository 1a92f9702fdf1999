use std::path::{Path, PathBuf};

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MeasurementError>;

// ---------------------------------------------------------------------------
// MeasurementError – everything the measurement engine can refuse to do
// ---------------------------------------------------------------------------

/// Failures raised while building measurements, reconciling series or
/// parsing instrument logs.
#[derive(Error, Debug)]
pub enum MeasurementError {
    /// Two arrays that must share a shape do not.
    #[error("incompatible shapes: {left} is {left_shape:?} but {right} is {right_shape:?}")]
    ShapeMismatch {
        left: &'static str,
        left_shape: Vec<usize>,
        right: &'static str,
        right_shape: Vec<usize>,
    },

    /// An array has the wrong number of dimensions.
    #[error("{name} must have {expected} dimension(s), got {found}")]
    Dimensionality {
        name: &'static str,
        expected: String,
        found: usize,
    },

    /// Optional data was requested but never set.
    #[error("{0} is not available")]
    Unavailable(&'static str),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("cannot build interpolant: {0}")]
    Interpolation(String),

    #[error("reference fit failed: {0}")]
    Fit(String),

    #[error("{}:{line}: {reason}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A file could not be opened or read.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MeasurementError {
    /// Shorthand for a [`MeasurementError::ShapeMismatch`] between two named arrays.
    pub(crate) fn shape_mismatch(
        left: &'static str,
        left_shape: &[usize],
        right: &'static str,
        right_shape: &[usize],
    ) -> Self {
        MeasurementError::ShapeMismatch {
            left,
            left_shape: left_shape.to_vec(),
            right,
            right_shape: right_shape.to_vec(),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        MeasurementError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// CollectionError – membership policy violations
// ---------------------------------------------------------------------------

/// Non-fatal refusals reported by the typed collections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("collection '{collection}' does not accept members of kind {tag}")]
    Rejected { collection: String, tag: String },

    #[error("restriction of collection '{0}' is locked")]
    RestrictionLocked(String),
}
