//! Gaussian elimination: forward elimination followed by back substitution.
//!
//! * dense matrix with partial (row) pivoting
//! * dense matrix without pivoting
//! * symmetric matrix kept in packed or banded storage, without pivoting
//!
//! The non-pivoting variants rely on the matrix being diagonally dominant or otherwise well
//! conditioned. A diagonal that is exactly zero gives `DivisionByZero`, a diagonal whose
//! magnitude is below `pivot_tolerance` gives `SingularMatrix`. The pivoting variant only
//! uses the tolerance test.
use crate::somelinalg::linsys_error::{LinSysError, LinSysResult};
use crate::somelinalg::matrix_storage::{
    BandedStorage, DEFAULT_SYMMETRY_TOLERANCE, MatrixStorage, SymmetricPacked, SymmetricStorage,
};
use log::{debug, info};
use nalgebra::{DMatrix, DVector};

/// 2^-50, the smallest pivot magnitude accepted by the elimination
pub const DEFAULT_PIVOT_TOLERANCE: f64 = 8.881784197001252e-16;

/// numerical settings shared by the direct solvers
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub pivot_tolerance: f64,
    /// relative tolerance of the lower/upper comparison when symmetric input is loaded
    pub symmetry_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            pivot_tolerance: DEFAULT_PIVOT_TOLERANCE,
            symmetry_tolerance: DEFAULT_SYMMETRY_TOLERANCE,
        }
    }
}

fn check_system(n_rows: usize, n_cols: usize, b_len: usize) -> LinSysResult<()> {
    if n_rows != n_cols {
        return Err(LinSysError::DimensionMismatch(format!(
            "coefficient matrix must be square, got {}x{}",
            n_rows, n_cols
        )));
    }
    if n_rows != b_len {
        return Err(LinSysError::DimensionMismatch(format!(
            "matrix has {} rows but right-hand side has {} elements",
            n_rows, b_len
        )));
    }
    Ok(())
}

/// the diagonal test of the non-pivoting variants
fn check_diagonal(diag: f64, step: usize, tolerance: f64) -> LinSysResult<()> {
    if diag == 0.0 {
        return Err(LinSysError::DivisionByZero { step });
    }
    if diag.abs() < tolerance {
        return Err(LinSysError::SingularMatrix { step, pivot: diag });
    }
    Ok(())
}

/// Back substitution for an upper triangular dense matrix stored in the upper part of `a`.
fn back_substitution_dense(a: &DMatrix<f64>, b: &DVector<f64>) -> DVector<f64> {
    let n = b.len();
    let mut x = DVector::zeros(n);
    for k in (0..n).rev() {
        let mut tmp = b[k];
        for j in k + 1..n {
            tmp -= a[(k, j)] * x[j];
        }
        x[k] = tmp / a[(k, k)];
    }
    x
}

/// Gaussian elimination with partial pivoting. `a` and `b` are overwritten: on return `a`
/// holds the upper triangular factor in its upper part and `b` the transformed right-hand side.
pub fn gauss_partial_pivoting(
    a: &mut DMatrix<f64>,
    b: &mut DVector<f64>,
    config: &SolverConfig,
) -> LinSysResult<DVector<f64>> {
    check_system(a.nrows(), a.ncols(), b.len())?;
    let n = b.len();
    if n == 0 {
        return Ok(DVector::zeros(0));
    }
    let mut swaps = 0;
    for k in 0..n - 1 {
        // pivot search in column k
        let mut amax = a[(k, k)].abs();
        let mut ip = k;
        for i in k + 1..n {
            if a[(i, k)].abs() > amax {
                amax = a[(i, k)].abs();
                ip = i;
            }
        }
        if amax < config.pivot_tolerance {
            return Err(LinSysError::SingularMatrix {
                step: k,
                pivot: a[(ip, k)],
            });
        }
        if ip != k {
            for j in k..n {
                a.swap((k, j), (ip, j));
            }
            b.swap_rows(k, ip);
            swaps += 1;
        }
        for i in k + 1..n {
            let alpha = a[(i, k)] / a[(k, k)];
            for j in k + 1..n {
                a[(i, j)] -= alpha * a[(k, j)];
            }
            b[i] -= alpha * b[k];
        }
    }
    let last = a[(n - 1, n - 1)];
    if last.abs() < config.pivot_tolerance {
        return Err(LinSysError::SingularMatrix {
            step: n - 1,
            pivot: last,
        });
    }
    debug!("partial pivoting: {} row exchanges", swaps);
    Ok(back_substitution_dense(a, b))
}

/// Gaussian elimination in the natural row order.
pub fn gauss_no_pivoting(
    a: &mut DMatrix<f64>,
    b: &mut DVector<f64>,
    config: &SolverConfig,
) -> LinSysResult<DVector<f64>> {
    check_system(a.nrows(), a.ncols(), b.len())?;
    let n = b.len();
    for k in 0..n {
        check_diagonal(a[(k, k)], k, config.pivot_tolerance)?;
        for i in k + 1..n {
            let factor = a[(i, k)] / a[(k, k)];
            for j in k..n {
                a[(i, j)] -= factor * a[(k, j)];
            }
            b[i] -= factor * b[k];
        }
    }
    Ok(back_substitution_dense(a, b))
}

/// Elimination without pivoting on the upper triangle of a symmetric matrix.
/// Row i of the reduced matrix equals column i, so a(i, k) is read as a(k, i) and only the
/// entries with j >= i are updated. Storage with a limited row extent (banded) restricts both
/// loops to the band of the pivot row.
pub fn gauss_symmetric<S: SymmetricStorage>(
    a: &mut S,
    b: &mut DVector<f64>,
    config: &SolverConfig,
) -> LinSysResult<DVector<f64>> {
    check_system(a.dim(), a.dim(), b.len())?;
    let n = b.len();
    if n == 0 {
        return Ok(DVector::zeros(0));
    }
    for k in 0..n - 1 {
        let diag = a.values()[a.upper_offset(k, k)];
        check_diagonal(diag, k, config.pivot_tolerance)?;
        let end = a.upper_row_end(k);
        for i in k + 1..end {
            let alpha = a.values()[a.upper_offset(k, i)] / diag;
            for j in i..end {
                let kj = a.upper_offset(k, j);
                let ij = a.upper_offset(i, j);
                let values = a.values_mut();
                values[ij] -= alpha * values[kj];
            }
            b[i] -= alpha * b[k];
        }
    }
    let last = a.values()[a.upper_offset(n - 1, n - 1)];
    check_diagonal(last, n - 1, config.pivot_tolerance)?;

    let mut x = DVector::zeros(n);
    for i in (0..n).rev() {
        let mut tmp = b[i];
        for j in i + 1..a.upper_row_end(i) {
            tmp -= a.values()[a.upper_offset(i, j)] * x[j];
        }
        x[i] = tmp / a.values()[a.upper_offset(i, i)];
    }
    Ok(x)
}

/// elimination on a symmetric matrix stored as its packed upper triangle
pub fn gauss_symmetric_packed(
    a: &mut SymmetricPacked,
    b: &mut DVector<f64>,
    config: &SolverConfig,
) -> LinSysResult<DVector<f64>> {
    info!(
        "symmetric packed elimination: n = {}, stored elements = {}",
        a.dim(),
        a.stored_elements()
    );
    gauss_symmetric(a, b, config)
}

/// elimination on a symmetric banded matrix, touching only the band
pub fn gauss_banded(
    a: &mut BandedStorage,
    b: &mut DVector<f64>,
    config: &SolverConfig,
) -> LinSysResult<DVector<f64>> {
    info!(
        "banded elimination: n = {}, bandwidth = {}",
        a.dim(),
        a.bandwidth()
    );
    gauss_symmetric(a, b, config)
}
