//! Batch matrices and the few shape-checked helpers ndarray does not provide.
//!
//! One row per sample. ndarray's arithmetic panics on incompatible shapes, so
//! every binary operation on caller-supplied matrices goes through
//! [`ensure_same_shape`] first.

use ndarray::{Array2, ArrayView1, Axis};

use crate::error::MlError;

/// Row-per-sample `f64` matrix.
pub type Matrix = Array2<f64>;

/// Build from rows that must all have the same width.
pub fn from_rows<'a, I>(rows: I) -> Result<Matrix, MlError>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut data = Vec::new();
    let mut n_rows = 0;
    let mut cols = None;
    for row in rows {
        match cols {
            None => cols = Some(row.len()),
            Some(c) if c != row.len() => {
                return Err(MlError::model(format!(
                    "ragged rows: expected width {c}, got {}",
                    row.len()
                )));
            }
            Some(_) => {}
        }
        data.extend_from_slice(row);
        n_rows += 1;
    }
    Ok(Matrix::from_shape_vec((n_rows, cols.unwrap_or(0)), data)?)
}

pub fn ensure_same_shape(a: &Matrix, b: &Matrix) -> Result<(), MlError> {
    if a.dim() != b.dim() {
        return Err(MlError::model(format!(
            "shape mismatch: {:?} vs {:?}",
            a.dim(),
            b.dim()
        )));
    }
    Ok(())
}

/// `a - b` for equally shaped matrices.
pub fn difference(a: &Matrix, b: &Matrix) -> Result<Matrix, MlError> {
    ensure_same_shape(a, b)?;
    Ok(a - b)
}

/// `a + b` for equally shaped matrices.
pub fn sum(a: &Matrix, b: &Matrix) -> Result<Matrix, MlError> {
    ensure_same_shape(a, b)?;
    Ok(a + b)
}

/// Mean squared difference over all elements.
pub fn mse(a: &Matrix, b: &Matrix) -> Result<f64, MlError> {
    Ok(difference(a, b)?.mapv(|v| v * v).mean().unwrap_or(0.0))
}

/// Mean squared difference per row.
pub fn row_mse(a: &Matrix, b: &Matrix) -> Result<Vec<f64>, MlError> {
    let squared = difference(a, b)?.mapv(|v| v * v);
    if squared.ncols() == 0 {
        return Ok(vec![0.0; squared.nrows()]);
    }
    Ok(squared
        .mean_axis(Axis(1))
        .map_or_else(Vec::new, |means| means.to_vec()))
}

/// Euclidean norm of a row or vector view.
pub fn l2_norm(v: ArrayView1<'_, f64>) -> f64 {
    v.dot(&v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_rows() {
        let rows = [vec![1.0, 2.0], vec![3.0, 4.0]];
        let mat = from_rows(rows.iter().map(Vec::as_slice)).unwrap();
        assert_eq!(mat, array![[1.0, 2.0], [3.0, 4.0]]);

        let ragged = [vec![1.0, 2.0], vec![3.0]];
        assert!(from_rows(ragged.iter().map(Vec::as_slice)).is_err());
        assert_eq!(from_rows(std::iter::empty()).unwrap().dim(), (0, 0));
    }

    #[test]
    fn test_shape_checks() {
        let a = Matrix::zeros((2, 3));
        let b = Matrix::zeros((3, 2));
        assert!(sum(&a, &b).is_err());
        assert!(mse(&a, &b).is_err());
        assert!(Matrix::from_shape_vec((2, 2), vec![1.0]).is_err());
    }

    #[test]
    fn test_errors() {
        let a = array![[0.0, 0.0], [1.0, 1.0]];
        let b = array![[0.0, 1.0], [1.0, 1.0]];
        assert_eq!(mse(&a, &b).unwrap(), 0.25);
        assert_eq!(row_mse(&a, &b).unwrap(), vec![0.5, 0.0]);
        assert_eq!(difference(&b, &a).unwrap(), array![[0.0, 1.0], [0.0, 0.0]]);
        assert_eq!(l2_norm(array![3.0, 4.0].view()), 5.0);
    }
}
