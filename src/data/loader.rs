use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{MeasurementError, Result};
use crate::numerics::sort_mutually;

// ---------------------------------------------------------------------------
// Parse options
// ---------------------------------------------------------------------------

/// Column layout of an instrument log.
///
/// The defaults match the picoammeter logger export: timestamp, mean, std,
/// wavelength, separated by tabs.
///
/// ```json
/// { "x_column": 3, "y_column": 1, "delimiter": "\t" }
/// ```
///
/// Every field is optional when deserializing; missing ones keep their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Column holding the independent variable (wavelength).
    pub x_column: usize,
    /// Column holding the measured value.
    pub y_column: usize,
    pub delimiter: char,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            x_column: 3,
            y_column: 1,
            delimiter: '\t',
        }
    }
}

impl ParseOptions {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let options: ParseOptions = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MeasurementError::io(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.delimiter.is_ascii() {
            return Err(MeasurementError::InvalidParameter(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            )));
        }
        if self.x_column == self.y_column {
            return Err(MeasurementError::InvalidParameter(format!(
                "x and y must be different columns, both are {}",
                self.x_column
            )));
        }
        Ok(())
    }

    fn min_fields(&self) -> usize {
        self.x_column.max(self.y_column) + 1
    }
}

// ---------------------------------------------------------------------------
// Instrument log loader
// ---------------------------------------------------------------------------

/// Load an instrument log from disk.
///
/// Layout:
/// * line 1: header, ignored;
/// * line 2: dark-current reading; its value is subtracted from every data
///   row and its x field (usually `DC`) is ignored;
/// * remaining lines: data rows.
///
/// Returns `(x, y)` sorted by ascending `x`, pairs kept together.
pub fn load_instrument_log(path: &Path, options: &ParseOptions) -> Result<(Array1<f64>, Array1<f64>)> {
    let file = File::open(path).map_err(|e| MeasurementError::io(path, e))?;
    let (x, y) = read_instrument_log(file, path, options)?;
    log::info!("Loaded {} samples from {}", x.len(), path.display());
    Ok((x, y))
}

/// Same as [`load_instrument_log`] for any reader; `source` is only used in
/// error messages.
pub fn read_instrument_log<R: Read>(
    reader: R,
    source: &Path,
    options: &ParseOptions,
) -> Result<(Array1<f64>, Array1<f64>)> {
    options.validate()?;

    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut records = reader.records();

    let dark = records.next().ok_or_else(|| MeasurementError::Parse {
        path: source.to_path_buf(),
        line: 2,
        reason: "missing dark-current row".into(),
    })??;
    let dark_current = parse_field(&dark, options.y_column, source)?;

    let mut samples: Vec<[f64; 2]> = Vec::new();
    for result in records {
        let record = result?;
        if record.len() < options.min_fields() {
            return Err(MeasurementError::Parse {
                path: source.to_path_buf(),
                line: line_of(&record),
                reason: format!(
                    "expected at least {} fields, found {}",
                    options.min_fields(),
                    record.len()
                ),
            });
        }
        let x = parse_field(&record, options.x_column, source)?;
        let y = parse_field(&record, options.y_column, source)?;
        samples.push([x, y - dark_current]);
    }

    if samples.is_empty() {
        return Err(MeasurementError::Parse {
            path: source.to_path_buf(),
            line: line_of(&dark) + 1,
            reason: "no data rows after the dark-current row".into(),
        });
    }

    let sorted = sort_mutually(Array2::from(samples).view(), 0, 0)?;
    Ok((sorted.column(0).to_owned(), sorted.column(1).to_owned()))
}

fn parse_field(record: &StringRecord, column: usize, source: &Path) -> Result<f64> {
    let field = record.get(column).ok_or_else(|| MeasurementError::Parse {
        path: source.to_path_buf(),
        line: line_of(record),
        reason: format!("missing column {column}"),
    })?;
    field.parse::<f64>().map_err(|_| MeasurementError::Parse {
        path: source.to_path_buf(),
        line: line_of(record),
        reason: format!("column {column}: '{field}' is not a number"),
    })
}

fn line_of(record: &StringRecord) -> usize {
    record.position().map_or(0, |p| p.line() as usize)
}
