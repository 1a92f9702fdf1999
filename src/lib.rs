//! Transmittance from reference and filtered scans.
//!
//! A reference scan (no filter) and a filtered scan are turned into the
//! point-wise ratio `filtered / reference`. When both scans were sampled at
//! the same wavelengths the ratio is taken directly; when they were not, the
//! reference is interpolated (or fitted to a known lamp shape) at the
//! filtered wavelengths first, and the raw scans are kept for audit.
//!
//! ```no_run
//! use std::path::Path;
//! use rusty_transmittance::{AlignedSeriesMeasurement, ParseOptions};
//!
//! let series = AlignedSeriesMeasurement::from_files(
//!     Path::new("reference.tsv"),
//!     Path::new("filtered.tsv"),
//!     None,
//!     &ParseOptions::default(),
//! )?;
//! let transmittance = series.transmittance()?;
//! # Ok::<(), rusty_transmittance::MeasurementError>(())
//! ```

pub mod data;
pub mod error;
pub mod measurement;
pub mod numerics;

pub use data::collection::{unzip_columns, IdGenerator, ObjectCollection, SeriesCollection, Tagged};
pub use data::loader::{load_instrument_log, read_instrument_log, ParseOptions};
pub use data::model::{Measurement, MeasurementKind, ReferenceModel};
pub use error::{CollectionError, MeasurementError, Result};
pub use measurement::{AlignedSeriesMeasurement, Offsets, RatioMeasurement};
