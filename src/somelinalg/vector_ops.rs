//! elementary vector and matrix arithmetic shared by the solvers and the drivers
use crate::somelinalg::linsys_error::{LinSysError, LinSysResult};
use nalgebra::{DMatrix, DVector};

fn check_len(what: &str, expected: usize, got: usize) -> LinSysResult<()> {
    if expected != got {
        return Err(LinSysError::DimensionMismatch(format!(
            "{}: expected {}, got {}",
            what, expected, got
        )));
    }
    Ok(())
}

/// a + b
pub fn vector_add(a: &DVector<f64>, b: &DVector<f64>) -> LinSysResult<DVector<f64>> {
    check_len("vector_add", a.len(), b.len())?;
    Ok(a + b)
}

/// a^T b
pub fn inner_product(a: &DVector<f64>, b: &DVector<f64>) -> LinSysResult<f64> {
    check_len("inner_product", a.len(), b.len())?;
    Ok(a.dot(b))
}

/// sum of absolute values, the norm used by the CG stopping test
pub fn vector_norm1(a: &DVector<f64>) -> f64 {
    a.lp_norm(1)
}

/// c = A b for a (possibly rectangular) N x M matrix and a vector of length M
pub fn matrix_vector_product(a: &DMatrix<f64>, b: &DVector<f64>) -> LinSysResult<DVector<f64>> {
    check_len("matrix_vector_product (columns of A vs length of b)", a.ncols(), b.len())?;
    Ok(a * b)
}

/// AB for A of size N x K and B of size K x M
pub fn matrix_product(a: &DMatrix<f64>, b: &DMatrix<f64>) -> LinSysResult<DMatrix<f64>> {
    check_len("matrix_product (columns of A vs rows of B)", a.ncols(), b.nrows())?;
    Ok(a * b)
}

/// a^T (A B): row vector of length M for a of length N, A of size N x N and B of size N x M
pub fn bilinear_row_product(
    a: &DVector<f64>,
    mat_a: &DMatrix<f64>,
    mat_b: &DMatrix<f64>,
) -> LinSysResult<DVector<f64>> {
    let ab = matrix_product(mat_a, mat_b)?;
    check_len("bilinear_row_product (length of a vs rows of AB)", ab.nrows(), a.len())?;
    Ok((a.transpose() * ab).transpose())
}

/// r = b - A x
pub fn residual(a: &DMatrix<f64>, x: &DVector<f64>, b: &DVector<f64>) -> LinSysResult<DVector<f64>> {
    let ax = matrix_vector_product(a, x)?;
    check_len("residual (rows of A vs length of b)", ax.len(), b.len())?;
    Ok(b - ax)
}

/// ||b - A x||_2 / ||b||_2, or the absolute norm when b is the zero vector
pub fn relative_residual_norm(
    a: &DMatrix<f64>,
    x: &DVector<f64>,
    b: &DVector<f64>,
) -> LinSysResult<f64> {
    let r = residual(a, x, b)?;
    let b_norm = b.norm();
    if b_norm == 0.0 {
        Ok(r.norm())
    } else {
        Ok(r.norm() / b_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vector_add_and_inner_product() {
        let a = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let b = DVector::from_vec(vec![4.0, -5.0, 6.0]);
        let sum = vector_add(&a, &b).unwrap();
        assert_eq!(sum, DVector::from_vec(vec![5.0, -3.0, 9.0]));
        assert_relative_eq!(inner_product(&a, &b).unwrap(), 12.0);
        assert_relative_eq!(vector_norm1(&b), 15.0);
        assert_relative_eq!(vector_norm1(&DVector::zeros(0)), 0.0);
    }

    #[test]
    fn test_length_mismatch_is_reported() {
        let a = DVector::from_vec(vec![1.0, 2.0]);
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            inner_product(&a, &b),
            Err(LinSysError::DimensionMismatch(_))
        ));
        let m = DMatrix::<f64>::identity(3, 3);
        assert!(matches!(
            matrix_vector_product(&m, &a),
            Err(LinSysError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_matrix_vector_product_rectangular() {
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 2.0, -1.0, 3.0, 1.0]);
        let b = DVector::from_vec(vec![3.0, 2.0, 1.0]);
        let c = matrix_vector_product(&a, &b).unwrap();
        assert_eq!(c, DVector::from_vec(vec![5.0, 4.0]));
        assert_eq!(c, &a * &b);
    }

    #[test]
    fn test_matrix_product_and_bilinear() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 1.0, 0.0, 1.0, 2.0]);
        let ab = matrix_product(&a, &b).unwrap();
        assert_eq!(ab, &a * &b);
        let v = DVector::from_vec(vec![1.0, -1.0]);
        let row = bilinear_row_product(&v, &a, &b).unwrap();
        // a^T A B = [1, -1] * [[1, 2, 5], [3, 4, 11]]
        assert_eq!(row, DVector::from_vec(vec![-2.0, -2.0, -6.0]));
        assert_eq!(row.len(), b.ncols());
    }

    #[test]
    fn test_product_shape_mismatch() {
        let a = DMatrix::<f64>::zeros(2, 3);
        let b = DMatrix::<f64>::zeros(2, 2);
        assert!(matches!(
            matrix_product(&a, &b),
            Err(LinSysError::DimensionMismatch(_))
        ));
        let ok = DMatrix::<f64>::zeros(3, 2);
        let v = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            bilinear_row_product(&v, &a, &ok),
            Err(LinSysError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_relative_residual_of_exact_solution() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let b = &a * &x;
        assert_relative_eq!(relative_residual_norm(&a, &x, &b).unwrap(), 0.0);
    }
}
