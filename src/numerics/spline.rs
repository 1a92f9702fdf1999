use ndarray::{Array1, ArrayView1};

use crate::error::{MeasurementError, Result};

// ---------------------------------------------------------------------------
// CubicSpline – not-a-knot cubic interpolation
// ---------------------------------------------------------------------------

/// Piecewise cubic interpolant through `(x_i, y_i)` with continuous first and
/// second derivatives and "not-a-knot" end conditions (the third derivative is
/// also continuous at the second and second-to-last knots).
///
/// With two knots the spline is the straight line through them, with three it
/// is the parabola through them. Outside `[x_0, x_{n-1}]` the end polynomials
/// are extended, so evaluation never fails but far-away values are guesses.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at each knot.
    y2s: Vec<f64>,
}

impl CubicSpline {
    /// Build the spline from knots `xs` (strictly increasing) and values `ys`.
    pub fn new(xs: ArrayView1<f64>, ys: ArrayView1<f64>) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(MeasurementError::shape_mismatch(
                "knots",
                xs.shape(),
                "values",
                ys.shape(),
            ));
        }
        let n = xs.len();
        if n < 2 {
            return Err(MeasurementError::Interpolation(format!(
                "need at least 2 samples, got {n}"
            )));
        }
        let xs: Vec<f64> = xs.iter().copied().collect();
        let ys: Vec<f64> = ys.iter().copied().collect();
        if let Some(i) = (1..n).find(|&i| !(xs[i] > xs[i - 1])) {
            return Err(MeasurementError::Interpolation(format!(
                "knots must be strictly increasing (x[{}] = {}, x[{i}] = {})",
                i - 1,
                xs[i - 1],
                xs[i]
            )));
        }

        let y2s = match n {
            2 => vec![0.0; 2],
            3 => {
                let curvature = 2.0 * second_divided_difference(&xs, &ys, 0);
                vec![curvature; 3]
            }
            _ => not_a_knot_second_derivatives(&xs, &ys),
        };

        Ok(Self { xs, ys, y2s })
    }

    /// Evaluate the spline at `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.xs.len();

        // Binary search for the enclosing interval; out-of-range x lands on
        // the first or last interval.
        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.xs[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let h = self.xs[hi] - self.xs[lo];
        let a = (self.xs[hi] - x) / h;
        let b = (x - self.xs[lo]) / h;

        a * self.ys[lo]
            + b * self.ys[hi]
            + ((a * a * a - a) * self.y2s[lo] + (b * b * b - b) * self.y2s[hi]) * h * h / 6.0
    }

    /// Evaluate the spline at every position in `xs`.
    pub fn evaluate_many(&self, xs: ArrayView1<f64>) -> Array1<f64> {
        xs.mapv(|x| self.evaluate(x))
    }

    /// `(first knot, last knot)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    pub fn knots(&self) -> &[f64] {
        &self.xs
    }
}

fn second_divided_difference(xs: &[f64], ys: &[f64], i: usize) -> f64 {
    let d0 = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]);
    let d1 = (ys[i + 2] - ys[i + 1]) / (xs[i + 2] - xs[i + 1]);
    (d1 - d0) / (xs[i + 2] - xs[i])
}

/// Second derivatives for `n >= 4` knots.
///
/// The interior continuity equations
/// `h[i-1] M[i-1] + 2 (h[i-1] + h[i]) M[i] + h[i] M[i+1] = 6 (d[i] - d[i-1])`
/// form a tridiagonal system once `M[0]` and `M[n-1]` are eliminated with the
/// not-a-knot conditions. The reduced system stays diagonally dominant, so the
/// Thomas algorithm needs no pivoting.
fn not_a_knot_second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    let d: Vec<f64> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();

    // Unknowns M[1..=n-2]; row k corresponds to knot k + 1.
    let m = n - 2;
    let mut sub = vec![0.0; m];
    let mut diag = vec![0.0; m];
    let mut sup = vec![0.0; m];
    let mut rhs = vec![0.0; m];

    for k in 0..m {
        let i = k + 1;
        sub[k] = h[i - 1];
        diag[k] = 2.0 * (h[i - 1] + h[i]);
        sup[k] = h[i];
        rhs[k] = 6.0 * (d[i] - d[i - 1]);
    }

    // M[0] = ((h0 + h1) M[1] - h0 M[2]) / h1
    let (h0, h1) = (h[0], h[1]);
    diag[0] = h0 + 2.0 * h1;
    sup[0] = h1 - h0;
    rhs[0] *= h1 / (h0 + h1);
    sub[0] = 0.0;

    // M[n-1] = ((a + b) M[n-2] - b M[n-3]) / a
    let (a, b) = (h[n - 3], h[n - 2]);
    let last = m - 1;
    sub[last] = a - b;
    diag[last] = 2.0 * a + b;
    rhs[last] *= a / (a + b);
    sup[last] = 0.0;

    let interior = solve_tridiagonal(&sub, &diag, &sup, &rhs);

    let mut y2s = vec![0.0; n];
    y2s[1..n - 1].copy_from_slice(&interior);
    y2s[0] = ((h0 + h1) * y2s[1] - h0 * y2s[2]) / h1;
    y2s[n - 1] = ((a + b) * y2s[n - 2] - b * y2s[n - 3]) / a;
    y2s
}

/// Thomas algorithm; `sub[0]` and `sup[last]` are ignored.
fn solve_tridiagonal(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Vec<f64> {
    let m = diag.len();
    let mut c = vec![0.0; m];
    let mut r = vec![0.0; m];

    c[0] = sup[0] / diag[0];
    r[0] = rhs[0] / diag[0];
    for k in 1..m {
        let denom = diag[k] - sub[k] * c[k - 1];
        c[k] = if k + 1 < m { sup[k] / denom } else { 0.0 };
        r[k] = (rhs[k] - sub[k] * r[k - 1]) / denom;
    }

    let mut x = vec![0.0; m];
    x[m - 1] = r[m - 1];
    for k in (0..m - 1).rev() {
        x[k] = r[k] - c[k] * x[k + 1];
    }
    x
}
