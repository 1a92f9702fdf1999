use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Ix1};

use super::ratio::{Offsets, RatioMeasurement};
use crate::data::loader::{load_instrument_log, ParseOptions};
use crate::data::model::ReferenceModel;
use crate::error::{MeasurementError, Result};
use crate::numerics::{stick_together, CubicSpline, ReferenceShape, ShapeFit};

/// Raw `(independent, value)` pairs kept when a series had to be reconciled.
#[derive(Debug, Clone, PartialEq)]
struct RawPairs {
    reference: Array2<f64>,
    filtered: Array2<f64>,
}

// ---------------------------------------------------------------------------
// AlignedSeriesMeasurement
// ---------------------------------------------------------------------------

/// One-dimensional transmittance measurement, typically as a function of
/// wavelength.
///
/// Whatever route built it, an instance always exposes a point-wise aligned
/// view (`reference()[i]` and `filtered()[i]` belong to the same wavelength).
/// Instances built from ragged scans additionally keep the untouched scans
/// (`raw_reference`, `raw_filtered`, two columns: independent variable, value)
/// and the [`ReferenceModel`] that bridged them.
#[derive(Debug, Clone)]
pub struct AlignedSeriesMeasurement {
    ratio: RatioMeasurement<Ix1>,
    raw: Option<RawPairs>,
    reference_model: Option<ReferenceModel>,
    extrapolated: usize,
}

impl AlignedSeriesMeasurement {
    /// Build from point-wise compatible scans.
    ///
    /// When `independent` is given, a cubic spline over
    /// `(independent, reference + offsets.reference)` becomes the reference
    /// model, so the construction fails if `independent` is not strictly
    /// increasing.
    pub fn new(
        reference: Array1<f64>,
        filtered: Array1<f64>,
        offsets: Offsets,
        independent: Option<Array1<f64>>,
    ) -> Result<Self> {
        Self::assemble(reference, filtered, offsets, independent, None, None)
    }

    /// Like [`AlignedSeriesMeasurement::new`] for arrays of dynamic
    /// dimensionality; fails unless every array is one-dimensional.
    pub fn from_dyn(
        reference: ArrayD<f64>,
        filtered: ArrayD<f64>,
        offsets: Offsets,
        independent: Option<ArrayD<f64>>,
    ) -> Result<Self> {
        let reference = into_series("reference", reference)?;
        let filtered = into_series("filtered", filtered)?;
        let independent = independent
            .map(|dep| into_series("independent", dep))
            .transpose()?;
        Self::new(reference, filtered, offsets, independent)
    }

    /// Reconcile ragged scans.
    ///
    /// The offset-corrected reference samples are turned into a
    /// [`ReferenceModel`] (a cubic spline, or a fit of
    /// `scale · (offset + reference_shape(x))` when a shape is given), which
    /// is evaluated at every `dep_filtered` to synthesize an aligned reference.
    ///
    /// Filtered positions outside the reference range are extrapolated, not
    /// rejected; [`extrapolated_samples`](Self::extrapolated_samples) reports
    /// how many there were.
    pub fn from_ragged(
        dep_reference: &Array1<f64>,
        reference: &Array1<f64>,
        dep_filtered: &Array1<f64>,
        filtered: &Array1<f64>,
        offsets: Offsets,
        reference_shape: Option<Arc<dyn ReferenceShape>>,
    ) -> Result<Self> {
        if dep_reference.len() != reference.len() {
            return Err(MeasurementError::shape_mismatch(
                "dep_reference",
                dep_reference.shape(),
                "reference",
                reference.shape(),
            ));
        }
        if dep_filtered.len() != filtered.len() {
            return Err(MeasurementError::shape_mismatch(
                "dep_filtered",
                dep_filtered.shape(),
                "filtered",
                filtered.shape(),
            ));
        }

        log::debug!(
            "reconciling {} reference samples with {} filtered samples",
            reference.len(),
            filtered.len()
        );

        let reference = reference.mapv(|v| v + offsets.reference);
        let model = match reference_shape {
            None => ReferenceModel::Spline(CubicSpline::new(
                dep_reference.view(),
                reference.view(),
            )?),
            Some(shape) => ReferenceModel::Fitted(ShapeFit::fit(
                shape,
                dep_reference.view(),
                reference.view(),
            )?),
        };
        let filtered = filtered.mapv(|v| v + offsets.filtered);
        let synthetic = model.evaluate_many(dep_filtered.view());

        let (lo, hi) = dep_reference
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        let extrapolated = dep_filtered.iter().filter(|&&x| x < lo || x > hi).count();
        if extrapolated > 0 {
            log::warn!(
                "{extrapolated} of {} filtered samples lie outside the reference range [{lo}, {hi}]; \
                 their reference values are extrapolated",
                dep_filtered.len()
            );
        }

        let raw = RawPairs {
            reference: stick_together(
                dep_reference.view().into_dyn(),
                reference.view().into_dyn(),
                1,
            )?,
            filtered: stick_together(
                dep_filtered.view().into_dyn(),
                filtered.view().into_dyn(),
                1,
            )?,
        };

        let mut series = Self::assemble(
            synthetic,
            filtered,
            Offsets::default(),
            Some(dep_filtered.clone()),
            Some(raw),
            Some(model),
        )?;
        series.extrapolated = extrapolated;
        Ok(series)
    }

    /// Parse a reference log and a filtered log and build the measurement.
    ///
    /// If both logs were sampled at exactly the same positions the direct
    /// route is taken; otherwise the scans are reconciled, fitting the shape
    /// read from `shape_path` when one is given.
    pub fn from_files(
        reference_path: &Path,
        filtered_path: &Path,
        shape_path: Option<&Path>,
        options: &ParseOptions,
    ) -> Result<Self> {
        let (dep_reference, reference) = load_instrument_log(reference_path, options)?;
        let (dep_filtered, filtered) = load_instrument_log(filtered_path, options)?;

        if dep_reference == dep_filtered {
            log::debug!(
                "{} and {} share their sampling; no reconciliation needed",
                reference_path.display(),
                filtered_path.display()
            );
            return Self::new(reference, filtered, Offsets::default(), Some(dep_reference));
        }

        let reference_shape = match shape_path {
            Some(path) => {
                let (dep_shape, shape) = load_instrument_log(path, options)?;
                let spline = CubicSpline::new(dep_shape.view(), shape.view())?;
                Some(Arc::new(spline) as Arc<dyn ReferenceShape>)
            }
            None => None,
        };

        Self::from_ragged(
            &dep_reference,
            &reference,
            &dep_filtered,
            &filtered,
            Offsets::default(),
            reference_shape,
        )
    }

    /// Shared tail of every construction route. Factories pass the raw pairs
    /// and model they built together with zero offsets, because they have
    /// already applied the offsets themselves.
    fn assemble(
        reference: Array1<f64>,
        filtered: Array1<f64>,
        offsets: Offsets,
        independent: Option<Array1<f64>>,
        raw: Option<RawPairs>,
        reference_model: Option<ReferenceModel>,
    ) -> Result<Self> {
        let ratio = RatioMeasurement::new(reference, filtered, offsets, independent)?;

        let reference_model = match (reference_model, ratio.independent().ok()) {
            (Some(model), _) => Some(model),
            (None, Some(dep)) => Some(ReferenceModel::Spline(CubicSpline::new(
                dep.view(),
                ratio.reference().view(),
            )?)),
            (None, None) => None,
        };

        Ok(Self {
            ratio,
            raw,
            reference_model,
            extrapolated: 0,
        })
    }

    pub fn reference(&self) -> &Array1<f64> {
        self.ratio.reference()
    }

    pub fn filtered(&self) -> &Array1<f64> {
        self.ratio.filtered()
    }

    pub fn independent(&self) -> Result<&Array1<f64>> {
        self.ratio.independent()
    }

    pub fn has_independent(&self) -> bool {
        self.ratio.has_independent()
    }

    pub fn raw_reference(&self) -> Result<&Array2<f64>> {
        self.raw
            .as_ref()
            .map(|raw| &raw.reference)
            .ok_or(MeasurementError::Unavailable("raw reference data"))
    }

    pub fn raw_filtered(&self) -> Result<&Array2<f64>> {
        self.raw
            .as_ref()
            .map(|raw| &raw.filtered)
            .ok_or(MeasurementError::Unavailable("raw filtered data"))
    }

    /// The raw two-column reference scan if one was kept, else the aligned
    /// reference array.
    pub fn rawest_reference(&self) -> ArrayViewD<'_, f64> {
        match &self.raw {
            Some(raw) => raw.reference.view().into_dyn(),
            None => self.reference().view().into_dyn(),
        }
    }

    /// The raw two-column filtered scan if one was kept, else the aligned
    /// filtered array.
    pub fn rawest_filtered(&self) -> ArrayViewD<'_, f64> {
        match &self.raw {
            Some(raw) => raw.filtered.view().into_dyn(),
            None => self.filtered().view().into_dyn(),
        }
    }

    pub fn reference_model(&self) -> Result<&ReferenceModel> {
        self.reference_model
            .as_ref()
            .ok_or(MeasurementError::Unavailable("reference model"))
    }

    /// Number of filtered positions whose reference value was extrapolated.
    pub fn extrapolated_samples(&self) -> usize {
        self.extrapolated
    }

    pub fn correct_reference(&mut self, offset: f64) {
        self.ratio.correct_reference(offset);
    }

    pub fn correct_filtered(&mut self, offset: f64) {
        self.ratio.correct_filtered(offset);
    }

    pub fn check_compatibility(&self) -> bool {
        self.ratio.check_compatibility()
    }

    pub fn transmittance(&self) -> Result<Array1<f64>> {
        self.ratio.transmittance()
    }

    pub fn len(&self) -> usize {
        self.reference().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference().is_empty()
    }
}

fn into_series(name: &'static str, array: ArrayD<f64>) -> Result<Array1<f64>> {
    let found = array.ndim();
    array
        .into_dimensionality::<Ix1>()
        .map_err(|_| MeasurementError::Dimensionality {
            name,
            expected: "1".into(),
            found,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn direct_route_builds_exact_spline() {
        let series = AlignedSeriesMeasurement::new(
            array![10.0, 20.0, 30.0],
            array![5.0, 5.0, 6.0],
            Offsets::default(),
            Some(array![1.0, 2.0, 3.0]),
        )
        .unwrap();

        let model = series.reference_model().unwrap();
        assert_abs_diff_eq!(model.evaluate(1.0), 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.evaluate(2.0), 20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.evaluate(3.0), 30.0, epsilon = 1e-12);
        assert!(series.raw_reference().is_err());
        assert_eq!(series.transmittance().unwrap(), array![0.5, 0.25, 0.2]);
    }

    #[test]
    fn direct_route_without_independent_has_no_model() {
        let series =
            AlignedSeriesMeasurement::new(array![1.0, 2.0], array![1.0, 1.0], Offsets::default(), None)
                .unwrap();
        assert!(matches!(
            series.reference_model(),
            Err(MeasurementError::Unavailable(_))
        ));
        assert!(matches!(
            series.independent(),
            Err(MeasurementError::Unavailable(_))
        ));
        assert_eq!(series.rawest_reference().ndim(), 1);
    }

    #[test]
    fn dynamic_input_must_be_one_dimensional() {
        let flat = Array2::<f64>::ones((2, 2)).into_dyn();
        let err = AlignedSeriesMeasurement::from_dyn(
            flat.clone(),
            flat,
            Offsets::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MeasurementError::Dimensionality { found: 2, .. }
        ));

        let ok = AlignedSeriesMeasurement::from_dyn(
            array![1.0, 2.0].into_dyn(),
            array![0.5, 0.5].into_dyn(),
            Offsets::default(),
            Some(array![1.0, 2.0].into_dyn()),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn mismatched_filtered_is_rejected() {
        let result = AlignedSeriesMeasurement::new(
            array![1.0, 2.0, 3.0],
            array![1.0, 2.0],
            Offsets::default(),
            None,
        );
        assert!(matches!(result, Err(MeasurementError::ShapeMismatch { .. })));
    }

    #[test]
    fn ragged_route_resamples_reference() {
        let dep_reference = array![0.0, 1.0, 2.0, 3.0];
        let reference = array![1.0, 2.0, 3.0, 4.0];
        let dep_filtered = array![0.5, 1.5, 2.5];
        let filtered = array![1.0, 1.0, 1.0];

        let series = AlignedSeriesMeasurement::from_ragged(
            &dep_reference,
            &reference,
            &dep_filtered,
            &filtered,
            Offsets::default(),
            None,
        )
        .unwrap();

        let spline = CubicSpline::new(dep_reference.view(), reference.view()).unwrap();
        for (i, &x) in dep_filtered.iter().enumerate() {
            assert_abs_diff_eq!(series.reference()[i], spline.evaluate(x), epsilon = 1e-12);
        }
        assert_abs_diff_eq!(series.reference()[0], 1.5, epsilon = 1e-12);
        assert_eq!(series.independent().unwrap(), &dep_filtered);
        assert_eq!(series.extrapolated_samples(), 0);

        let raw_reference = series.raw_reference().unwrap();
        assert_eq!(raw_reference.column(0), dep_reference);
        assert_eq!(raw_reference.column(1), reference);
        let raw_filtered = series.raw_filtered().unwrap();
        assert_eq!(raw_filtered.column(0), dep_filtered);
        assert_eq!(raw_filtered.column(1), filtered);
        assert_eq!(series.rawest_reference().shape(), &[4, 2]);
        assert!(series.reference_model().is_ok());
    }

    #[test]
    fn ragged_route_applies_offsets_once() {
        let series = AlignedSeriesMeasurement::from_ragged(
            &array![0.0, 1.0, 2.0],
            &array![1.0, 1.0, 1.0],
            &array![0.0, 2.0],
            &array![0.5, 0.5],
            Offsets::new(1.0, 0.5),
            None,
        )
        .unwrap();

        assert_abs_diff_eq!(series.reference()[0], 2.0, epsilon = 1e-12);
        assert_eq!(series.filtered(), &array![1.0, 1.0]);
        assert_eq!(series.raw_reference().unwrap().column(1), array![2.0, 2.0, 2.0]);
        let t = series.transmittance().unwrap();
        assert_abs_diff_eq!(t[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn ragged_route_with_shape_fits_scale_and_offset() {
        let shape: Arc<dyn ReferenceShape> = Arc::new(|x: f64| x * x);
        let dep_reference = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let reference = dep_reference.mapv(|x| 3.0 * (2.0 + x * x));

        let series = AlignedSeriesMeasurement::from_ragged(
            &dep_reference,
            &reference,
            &array![1.5, 6.0],
            &array![1.0, 1.0],
            Offsets::default(),
            Some(shape),
        )
        .unwrap();

        match series.reference_model().unwrap() {
            ReferenceModel::Fitted(fit) => {
                assert_abs_diff_eq!(fit.scale, 3.0, epsilon = 1e-9);
                assert_abs_diff_eq!(fit.offset, 2.0, epsilon = 1e-9);
            }
            other => panic!("expected a fitted model, got {other:?}"),
        }
        assert_abs_diff_eq!(series.reference()[1], 3.0 * 38.0, epsilon = 1e-6);
        assert_eq!(series.extrapolated_samples(), 1);
    }

    #[test]
    fn ragged_pairs_must_agree_in_length() {
        let result = AlignedSeriesMeasurement::from_ragged(
            &array![0.0, 1.0, 2.0],
            &array![1.0, 2.0],
            &array![0.5],
            &array![1.0],
            Offsets::default(),
            None,
        );
        assert!(matches!(result, Err(MeasurementError::ShapeMismatch { .. })));

        let result = AlignedSeriesMeasurement::from_ragged(
            &array![0.0, 1.0],
            &array![1.0, 2.0],
            &array![0.5, 0.7],
            &array![1.0],
            Offsets::default(),
            None,
        );
        assert!(matches!(result, Err(MeasurementError::ShapeMismatch { .. })));
    }

    #[test]
    fn corrections_feed_into_transmittance() {
        let mut series = AlignedSeriesMeasurement::new(
            array![2.0, 4.0],
            array![1.0, 1.0],
            Offsets::default(),
            None,
        )
        .unwrap();
        series.correct_filtered(1.0);
        series.correct_reference(-1.0);
        assert!(series.check_compatibility());
        assert_eq!(series.transmittance().unwrap(), array![2.0, 2.0 / 3.0]);
    }
}
