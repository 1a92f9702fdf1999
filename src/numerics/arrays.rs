use ndarray::{concatenate, Array2, ArrayView2, ArrayViewD, Axis, Ix1, Ix2};

use crate::error::{MeasurementError, Result};

// ---------------------------------------------------------------------------
// Mutual sorting
// ---------------------------------------------------------------------------

/// Return a copy of `array` sorted by one of its lines.
///
/// * `axis == 0`: rows are reordered so that column `key` is ascending.
/// * `axis == 1`: columns are reordered so that row `key` is ascending.
///
/// Rows (columns) move as indivisible units, so every value stays paired with
/// the values it was recorded alongside. The sort is stable; NaN keys of
/// either sign sort last.
pub fn sort_mutually(array: ArrayView2<f64>, axis: usize, key: usize) -> Result<Array2<f64>> {
    if axis > 1 {
        return Err(MeasurementError::InvalidParameter(format!(
            "axis must be 0 or 1, got {axis}"
        )));
    }
    // axis 0 reads the key from a column, axis 1 from a row.
    let key_axis = Axis(1 - axis);
    let lines = array.len_of(key_axis);
    if key >= lines {
        return Err(MeasurementError::InvalidParameter(format!(
            "key {key} out of range for {lines} line(s) along axis {}",
            1 - axis
        )));
    }

    let keys = array.index_axis(key_axis, key);
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| {
        let (ka, kb) = (keys[a], keys[b]);
        match (ka.is_nan(), kb.is_nan()) {
            (false, false) => ka.total_cmp(&kb),
            (nan_a, nan_b) => nan_a.cmp(&nan_b),
        }
    });

    Ok(array.select(Axis(axis), &order))
}

// ---------------------------------------------------------------------------
// Stacking
// ---------------------------------------------------------------------------

/// Concatenate two 1-D or 2-D arrays along `axis`, in operand order.
///
/// A 1-D operand of length `n` is first promoted to 2-D by inserting a new
/// axis at `axis` (`1 x n` for axis 0, `n x 1` for axis 1). Two length-`n`
/// vectors therefore stack into `2 x n` on axis 0 and `n x 2` on axis 1.
pub fn stick_together<'a>(
    first: ArrayViewD<'a, f64>,
    second: ArrayViewD<'a, f64>,
    axis: usize,
) -> Result<Array2<f64>> {
    if axis > 1 {
        return Err(MeasurementError::InvalidParameter(format!(
            "axis must be 0 or 1, got {axis}"
        )));
    }
    let first = promote(first, axis, "first operand")?;
    let second = promote(second, axis, "second operand")?;

    let other = Axis(1 - axis);
    if first.len_of(other) != second.len_of(other) {
        return Err(MeasurementError::shape_mismatch(
            "first operand",
            first.shape(),
            "second operand",
            second.shape(),
        ));
    }

    concatenate(Axis(axis), &[first, second]).map_err(|e| {
        MeasurementError::InvalidParameter(format!("cannot concatenate along axis {axis}: {e}"))
    })
}

fn promote<'a>(
    array: ArrayViewD<'a, f64>,
    axis: usize,
    name: &'static str,
) -> Result<ArrayView2<'a, f64>> {
    let found = array.ndim();
    match found {
        1 => Ok(array
            .into_dimensionality::<Ix1>()
            .map_err(|_| dimensionality(name, found))?
            .insert_axis(Axis(axis))),
        2 => array
            .into_dimensionality::<Ix2>()
            .map_err(|_| dimensionality(name, found)),
        _ => Err(dimensionality(name, found)),
    }
}

fn dimensionality(name: &'static str, found: usize) -> MeasurementError {
    MeasurementError::Dimensionality {
        name,
        expected: "1 or 2".into(),
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn sorts_rows_by_column_keeping_pairs() {
        let data = array![[3.0, 30.0, 0.3], [1.0, 10.0, 0.1], [2.0, 20.0, 0.2], [0.5, 5.0, 0.05]];
        let sorted = sort_mutually(data.view(), 0, 0).unwrap();

        let key = sorted.column(0);
        assert!(key.windows(2).into_iter().all(|w| w[0] <= w[1]));
        for row in sorted.rows() {
            assert_eq!(row[1], row[0] * 10.0);
            assert_eq!(row[2], row[0] / 10.0);
        }
        // input untouched
        assert_eq!(data[[0, 0]], 3.0);
    }

    #[test]
    fn nan_keys_sort_last_whatever_their_sign() {
        let data = array![[f64::NAN, 1.0], [2.0, 2.0], [-f64::NAN, 3.0], [f64::NEG_INFINITY, 4.0]];
        let sorted = sort_mutually(data.view(), 0, 0).unwrap();

        assert_eq!(sorted[[0, 0]], f64::NEG_INFINITY);
        assert_eq!(sorted[[1, 0]], 2.0);
        assert!(sorted[[2, 0]].is_nan() && sorted[[3, 0]].is_nan());
        // stable among the NaN rows
        assert_eq!(sorted.column(1).to_vec(), vec![4.0, 2.0, 1.0, 3.0]);
    }

    #[test]
    fn sorts_columns_by_row() {
        let data = array![[9.0, 7.0, 8.0], [0.9, 0.7, 0.8]];
        let sorted = sort_mutually(data.view(), 1, 1).unwrap();
        assert_eq!(sorted, array![[7.0, 8.0, 9.0], [0.7, 0.8, 0.9]]);
    }

    #[test]
    fn sort_rejects_bad_axis_and_key() {
        let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        assert!(matches!(
            sort_mutually(data.view(), 2, 0),
            Err(MeasurementError::InvalidParameter(_))
        ));
        assert!(matches!(
            sort_mutually(data.view(), 0, 2),
            Err(MeasurementError::InvalidParameter(_))
        ));
        // three rows, so row key 2 is fine for axis 1
        assert!(sort_mutually(data.view(), 1, 2).is_ok());
    }

    #[test]
    fn stacks_vectors_into_rows_or_columns() {
        let a = array![1.0, 2.0, 3.0].into_dyn();
        let b = array![4.0, 5.0, 6.0].into_dyn();

        let rows = stick_together(a.view(), b.view(), 0).unwrap();
        assert_eq!(rows, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

        let columns = stick_together(a.view(), b.view(), 1).unwrap();
        assert_eq!(columns, array![[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]]);
    }

    #[test]
    fn stacks_vector_onto_matrix_in_operand_order() {
        let m = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let v = array![9.0, 8.0].into_dyn();

        let below = stick_together(m.view(), v.view(), 0).unwrap();
        assert_eq!(below, array![[1.0, 2.0], [3.0, 4.0], [9.0, 8.0]]);

        let left = stick_together(v.view(), m.view(), 1).unwrap();
        assert_eq!(left, array![[9.0, 1.0, 2.0], [8.0, 3.0, 4.0]]);
    }

    fn pair_up<'a>(dep: ArrayViewD<'a, f64>, values: ArrayViewD<'a, f64>) -> Array2<f64> {
        stick_together(dep, values, 1).unwrap()
    }

    #[test]
    fn stacks_views_borrowed_from_separate_owners() {
        let dep = array![400.0, 500.0].into_dyn();
        let pairs = {
            let values = array![3.0, 6.0].into_dyn();
            pair_up(dep.view(), values.view())
        };
        assert_eq!(pairs, array![[400.0, 3.0], [500.0, 6.0]]);
    }

    #[test]
    fn stack_rejects_mismatch_and_high_rank() {
        let a = array![1.0, 2.0, 3.0].into_dyn();
        let b = array![1.0, 2.0].into_dyn();
        assert!(matches!(
            stick_together(a.view(), b.view(), 0),
            Err(MeasurementError::ShapeMismatch { .. })
        ));

        let cube = Array3::<f64>::zeros((2, 2, 2)).into_dyn();
        assert!(matches!(
            stick_together(cube.view(), b.view(), 0),
            Err(MeasurementError::Dimensionality { found: 3, .. })
        ));
    }
}
