use std::fmt;
use std::sync::Arc;

use ndarray::ArrayView1;

use super::spline::CubicSpline;
use crate::error::{MeasurementError, Result};

// ---------------------------------------------------------------------------
// ReferenceShape – template for how a light source varies with wavelength
// ---------------------------------------------------------------------------

/// A known spectral shape `x -> s(x)` that a reference scan is expected to
/// follow up to a vertical offset and an overall scale.
pub trait ReferenceShape: Send + Sync {
    fn value_at(&self, x: f64) -> f64;
}

impl<F> ReferenceShape for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn value_at(&self, x: f64) -> f64 {
        self(x)
    }
}

impl ReferenceShape for CubicSpline {
    fn value_at(&self, x: f64) -> f64 {
        self.evaluate(x)
    }
}

// ---------------------------------------------------------------------------
// ShapeFit – scale · (offset + s(x))
// ---------------------------------------------------------------------------

/// Least-squares fit of `scale · (offset + s(x))` to reference samples.
#[derive(Clone)]
pub struct ShapeFit {
    pub scale: f64,
    pub offset: f64,
    shape: Arc<dyn ReferenceShape>,
}

impl fmt::Debug for ShapeFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeFit")
            .field("scale", &self.scale)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl ShapeFit {
    /// Fit `shape` to the samples `(xs, ys)`.
    ///
    /// The model is linear in `(scale · offset, scale)`, so the least-squares
    /// optimum is the ordinary regression of `ys` on `s(xs)`; no iterative
    /// solver is involved. Fails when the shape is flat over `xs` or the fitted
    /// scale is zero, since the offset is then undetermined.
    pub fn fit(
        shape: Arc<dyn ReferenceShape>,
        xs: ArrayView1<f64>,
        ys: ArrayView1<f64>,
    ) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(MeasurementError::shape_mismatch(
                "dep_reference",
                xs.shape(),
                "reference",
                ys.shape(),
            ));
        }
        if xs.len() < 2 {
            return Err(MeasurementError::Fit(format!(
                "need at least 2 samples, got {}",
                xs.len()
            )));
        }

        let s = xs.mapv(|x| shape.value_at(x));
        let n = s.len() as f64;
        let s_mean = s.sum() / n;
        let y_mean = ys.sum() / n;

        let mut s_var = 0.0;
        let mut cov = 0.0;
        for (si, yi) in s.iter().zip(ys.iter()) {
            s_var += (si - s_mean) * (si - s_mean);
            cov += (si - s_mean) * (yi - y_mean);
        }

        // Relative to the shape's own magnitude, so the units of the readings
        // do not matter.
        let s_sq: f64 = s.iter().map(|v| v * v).sum();
        if !s_var.is_finite() || s_var <= f64::EPSILON * s_sq {
            return Err(MeasurementError::Fit(
                "shape is constant over the reference samples".into(),
            ));
        }

        let scale = cov / s_var;
        if scale == 0.0 || !scale.is_finite() {
            return Err(MeasurementError::Fit(format!("degenerate scale {scale}")));
        }
        let intercept = y_mean - scale * s_mean;
        let offset = intercept / scale;

        log::debug!("shape fit: scale = {scale:.6e}, offset = {offset:.6e}");
        Ok(Self {
            scale,
            offset,
            shape,
        })
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.scale * (self.offset + self.shape.value_at(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};

    #[test]
    fn recovers_scale_and_offset() {
        let shape: Arc<dyn ReferenceShape> = Arc::new(|x: f64| (x / 100.0).sin());
        let xs = Array1::linspace(400.0_f64, 800.0, 41);
        let ys = xs.mapv(|x| 2.5 * (0.3 + (x / 100.0).sin()));

        let fit = ShapeFit::fit(shape, xs.view(), ys.view()).unwrap();
        assert_abs_diff_eq!(fit.scale, 2.5, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.offset, 0.3, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.evaluate(555.0), 2.5 * (0.3 + 5.55_f64.sin()), epsilon = 1e-9);
    }

    #[test]
    fn spline_can_serve_as_shape() {
        let knots = array![0.0, 1.0, 2.0, 3.0, 4.0];
        let values = array![1.0, 3.0, 2.0, 5.0, 4.0];
        let spline = CubicSpline::new(knots.view(), values.view()).unwrap();
        let ys = values.mapv(|v| 4.0 * (v - 1.0));

        let fit = ShapeFit::fit(Arc::new(spline), knots.view(), ys.view()).unwrap();
        assert_abs_diff_eq!(fit.scale, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.offset, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn fits_shapes_in_amperes() {
        let shape: Arc<dyn ReferenceShape> = Arc::new(|x: f64| 1e-9 * (1.0 + 0.01 * x));
        let xs = Array1::linspace(400.0_f64, 600.0, 21);
        let ys = xs.mapv(|x| 0.8 * (2e-11 + 1e-9 * (1.0 + 0.01 * x)));

        let fit = ShapeFit::fit(shape, xs.view(), ys.view()).unwrap();
        assert_abs_diff_eq!(fit.scale, 0.8, epsilon = 1e-6);
        assert_abs_diff_eq!(fit.offset, 2e-11, epsilon = 1e-15);
        assert_abs_diff_eq!(fit.evaluate(500.0), 0.8 * (2e-11 + 6e-9), epsilon = 1e-18);
    }

    #[test]
    fn flat_shape_is_rejected_at_any_magnitude() {
        let xs = array![0.0, 1.0, 2.0];
        let ys = array![1.0, 2.0, 3.0];
        for level in [1e-9, 1.0, 1e6] {
            let shape: Arc<dyn ReferenceShape> = Arc::new(move |_x: f64| level);
            assert!(matches!(
                ShapeFit::fit(shape, xs.view(), ys.view()),
                Err(MeasurementError::Fit(_))
            ));
        }
    }

    #[test]
    fn flat_shape_is_rejected() {
        let shape: Arc<dyn ReferenceShape> = Arc::new(|_x: f64| 1.0);
        let xs = array![0.0, 1.0, 2.0];
        let ys = array![1.0, 2.0, 3.0];
        assert!(matches!(
            ShapeFit::fit(shape, xs.view(), ys.view()),
            Err(MeasurementError::Fit(_))
        ));
    }
}
