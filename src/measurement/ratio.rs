use ndarray::{Array, Dimension, IxDyn, Zip};

use crate::error::{MeasurementError, Result};

/// Scalars added to the reference and filtered arrays when a measurement is
/// built, e.g. to remove a known instrument baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offsets {
    pub reference: f64,
    pub filtered: f64,
}

impl Offsets {
    pub fn new(reference: f64, filtered: f64) -> Self {
        Self {
            reference,
            filtered,
        }
    }
}

// ---------------------------------------------------------------------------
// RatioMeasurement
// ---------------------------------------------------------------------------

/// A pair of point-wise compatible measurements: `reference[pos]` (no
/// filter) and `filtered[pos]` (with filter) were taken under the same
/// conditions, so their ratio is a transmittance.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioMeasurement<D: Dimension = IxDyn> {
    reference: Array<f64, D>,
    filtered: Array<f64, D>,
    /// Independent variable (e.g. wavelength) for each entry.
    independent: Option<Array<f64, D>>,
}

impl<D: Dimension> RatioMeasurement<D> {
    /// Build a measurement from equally shaped arrays, folding `offsets` in.
    pub fn new(
        reference: Array<f64, D>,
        filtered: Array<f64, D>,
        offsets: Offsets,
        independent: Option<Array<f64, D>>,
    ) -> Result<Self> {
        if reference.shape() != filtered.shape() {
            return Err(MeasurementError::shape_mismatch(
                "reference",
                reference.shape(),
                "filtered",
                filtered.shape(),
            ));
        }
        if let Some(dep) = &independent {
            if dep.shape() != reference.shape() {
                return Err(MeasurementError::shape_mismatch(
                    "reference",
                    reference.shape(),
                    "independent",
                    dep.shape(),
                ));
            }
        }

        let mut measurement = Self {
            reference,
            filtered,
            independent,
        };
        measurement.correct_reference(offsets.reference);
        measurement.correct_filtered(offsets.filtered);
        Ok(measurement)
    }

    pub fn reference(&self) -> &Array<f64, D> {
        &self.reference
    }

    pub fn filtered(&self) -> &Array<f64, D> {
        &self.filtered
    }

    pub fn has_independent(&self) -> bool {
        self.independent.is_some()
    }

    pub fn independent(&self) -> Result<&Array<f64, D>> {
        self.independent
            .as_ref()
            .ok_or(MeasurementError::Unavailable("independent variable data"))
    }

    /// Add `offset` to every reference entry.
    pub fn correct_reference(&mut self, offset: f64) {
        self.reference.mapv_inplace(|v| v + offset);
    }

    /// Add `offset` to every filtered entry.
    pub fn correct_filtered(&mut self, offset: f64) {
        self.filtered.mapv_inplace(|v| v + offset);
    }

    /// Whether reference, filtered and (if present) independent data share a shape.
    pub fn check_compatibility(&self) -> bool {
        let shape = self.reference.shape();
        shape == self.filtered.shape()
            && self
                .independent
                .as_ref()
                .map_or(true, |dep| dep.shape() == shape)
    }

    /// Entrywise `filtered / reference`.
    ///
    /// A zero reference entry yields an infinite or NaN transmittance at that
    /// position; the arrays are not screened for it.
    pub fn transmittance(&self) -> Result<Array<f64, D>> {
        if !self.check_compatibility() {
            return Err(self.incompatibility());
        }
        Ok(Zip::from(&self.filtered)
            .and(&self.reference)
            .map_collect(|&f, &r| f / r))
    }

    fn incompatibility(&self) -> MeasurementError {
        match &self.independent {
            Some(dep) if self.reference.shape() == self.filtered.shape() => {
                MeasurementError::shape_mismatch(
                    "reference",
                    self.reference.shape(),
                    "independent",
                    dep.shape(),
                )
            }
            _ => MeasurementError::shape_mismatch(
                "reference",
                self.reference.shape(),
                "filtered",
                self.filtered.shape(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, ArrayD, IxDyn};

    #[test]
    fn ratio_of_equal_shapes() {
        let reference = array![[2.0, 4.0], [5.0, 10.0]];
        let filtered = array![[1.0, 1.0], [4.0, 2.5]];
        let m = RatioMeasurement::new(reference, filtered, Offsets::default(), None).unwrap();

        assert!(m.check_compatibility());
        let t = m.transmittance().unwrap();
        assert_eq!(t, array![[0.5, 0.25], [0.8, 0.25]]);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let reference = ArrayD::<f64>::ones(IxDyn(&[5]));
        let filtered = ArrayD::<f64>::ones(IxDyn(&[4]));
        let err = RatioMeasurement::new(reference, filtered, Offsets::default(), None).unwrap_err();
        match err {
            MeasurementError::ShapeMismatch {
                left_shape,
                right_shape,
                ..
            } => {
                assert_eq!(left_shape, vec![5]);
                assert_eq!(right_shape, vec![4]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mismatched_independent_is_rejected() {
        let result = RatioMeasurement::new(
            array![1.0, 2.0, 3.0],
            array![1.0, 1.0, 1.0],
            Offsets::default(),
            Some(array![400.0, 500.0]),
        );
        assert!(matches!(result, Err(MeasurementError::ShapeMismatch { .. })));
    }

    #[test]
    fn offsets_are_applied_and_corrections_accumulate() {
        let mut m = RatioMeasurement::new(
            array![1.0, 3.0],
            array![0.5, 0.5],
            Offsets::new(1.0, 0.5),
            None,
        )
        .unwrap();
        assert_eq!(m.reference(), &array![2.0, 4.0]);
        assert_eq!(m.filtered(), &array![1.0, 1.0]);

        m.correct_reference(-1.0);
        m.correct_filtered(0.5);
        let t = m.transmittance().unwrap();
        assert_abs_diff_eq!(t[0], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(t[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn missing_independent_is_unavailable_not_mismatch() {
        let m = RatioMeasurement::new(array![1.0], array![1.0], Offsets::default(), None).unwrap();
        assert!(!m.has_independent());
        assert!(matches!(
            m.independent(),
            Err(MeasurementError::Unavailable(_))
        ));
    }
}
