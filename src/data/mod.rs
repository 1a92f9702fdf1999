//! Data layer: instrument-log loading, model types and collections.
//!
//! Architecture:
//! ```text
//!  reference.tsv   filtered.tsv   (shape.tsv)
//!        │              │              │
//!        ▼              ▼              ▼
//!   ┌──────────┐
//!   │  loader   │  parse, subtract dark current, sort → (x, y)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────────────────┐
//!   │ AlignedSeriesMeasurement │  direct or reconciled via ReferenceModel
//!   └──────────────────────────┘
//!        │
//!        ▼
//!   ┌────────────┐
//!   │ collection │  SeriesCollection, projections across members
//!   └────────────┘
//! ```

pub mod collection;
pub mod loader;
pub mod model;
