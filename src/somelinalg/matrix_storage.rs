//! Physical layouts of the coefficient matrix: dense (nalgebra column-major), symmetric
//! upper-triangular packed, and banded (upper band of a symmetric matrix, row-major).
//!
//! All positions are 0-indexed. The packed layout stores row i of the upper triangle right
//! after row i-1, so the 1-indexed textbook mapping
//! `idx(i,j) = (i-1)*N - (i-1)*(i-2)/2 + (j-i)` becomes `i*N - i*(i+1)/2 + j` here.
use crate::somelinalg::linsys_error::{LinSysError, LinSysResult};
use itertools::iproduct;
use log::{debug, info};
use nalgebra::DMatrix;

/// default relative tolerance used when a lower-triangle input is compared with its mirror
pub const DEFAULT_SYMMETRY_TOLERANCE: f64 = 1e-12;

/// common interface of the matrix layouts
pub trait MatrixStorage {
    /// number of rows (= number of columns)
    fn dim(&self) -> usize;
    /// physical offset of the logical position, None when the position is an implicit zero
    fn index(&self, i: usize, j: usize) -> Option<usize>;
    fn get(&self, i: usize, j: usize) -> f64;
    fn set(&mut self, i: usize, j: usize, value: f64) -> LinSysResult<()>;
    /// number of values physically stored
    fn stored_elements(&self) -> usize;
}

/// Layouts that keep only the upper triangle of a symmetric matrix. Elimination without
/// pivoting works on the upper triangle alone, because the reduced matrix stays symmetric.
pub trait SymmetricStorage: MatrixStorage {
    /// exclusive bound of the columns of row i that may hold nonzeros (j >= i)
    fn upper_row_end(&self, i: usize) -> usize;
    /// offset of (i, j) for i <= j < upper_row_end(i)
    fn upper_offset(&self, i: usize, j: usize) -> usize;
    fn values(&self) -> &[f64];
    fn values_mut(&mut self) -> &mut [f64];
}

fn allocate_zeros(elements: usize) -> LinSysResult<Vec<f64>> {
    let mut data: Vec<f64> = Vec::new();
    data.try_reserve_exact(elements)
        .map_err(|_| LinSysError::AllocationFailure { elements })?;
    data.resize(elements, 0.0);
    Ok(data)
}

// element count of a rows x cols block; an overflowing count can never be allocated
fn element_count(rows: usize, cols: usize) -> LinSysResult<usize> {
    rows.checked_mul(cols)
        .ok_or(LinSysError::AllocationFailure { elements: usize::MAX })
}

fn check_position(n: usize, i: usize, j: usize) -> LinSysResult<()> {
    if i >= n || j >= n {
        return Err(LinSysError::DimensionMismatch(format!(
            "position ({}, {}) outside of a {}x{} matrix",
            i, j, n, n
        )));
    }
    Ok(())
}

fn mirrors_agree(lower: f64, upper: f64, tolerance: f64) -> bool {
    let scale = 1.0_f64.max(lower.abs()).max(upper.abs());
    (lower - upper).abs() <= tolerance * scale
}

impl MatrixStorage for DMatrix<f64> {
    fn dim(&self) -> usize {
        self.nrows()
    }
    fn index(&self, i: usize, j: usize) -> Option<usize> {
        if i < self.nrows() && j < self.ncols() {
            Some(j * self.nrows() + i)
        } else {
            None
        }
    }
    fn get(&self, i: usize, j: usize) -> f64 {
        self[(i, j)]
    }
    fn set(&mut self, i: usize, j: usize, value: f64) -> LinSysResult<()> {
        if i >= self.nrows() || j >= self.ncols() {
            return Err(LinSysError::DimensionMismatch(format!(
                "position ({}, {}) outside of a {}x{} matrix",
                i,
                j,
                self.nrows(),
                self.ncols()
            )));
        }
        self[(i, j)] = value;
        Ok(())
    }
    fn stored_elements(&self) -> usize {
        self.len()
    }
}

/// offset of (i, j), i <= j, inside the packed upper triangle of an n x n matrix
pub fn packed_index(n: usize, i: usize, j: usize) -> usize {
    let (i, j) = if i <= j { (i, j) } else { (j, i) };
    i * n - i * (i + 1) / 2 + j
}

////////////////////////////////////////////////////////////////////////////////////////
//                         SYMMETRIC PACKED
////////////////////////////////////////////////////////////////////////////////////////
/// symmetric matrix stored as its upper triangle, n(n+1)/2 values
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricPacked {
    n: usize,
    data: Vec<f64>,
    symmetry_tolerance: f64,
}

impl SymmetricPacked {
    pub fn allocate(n: usize) -> LinSysResult<Self> {
        let elements = match n.checked_add(1) {
            Some(m) => element_count(n, m)? / 2,
            None => return Err(LinSysError::AllocationFailure { elements: usize::MAX }),
        };
        let data = allocate_zeros(elements)?;
        Ok(SymmetricPacked {
            n,
            data,
            symmetry_tolerance: DEFAULT_SYMMETRY_TOLERANCE,
        })
    }

    pub fn with_symmetry_tolerance(mut self, tolerance: f64) -> Self {
        self.symmetry_tolerance = tolerance;
        self
    }

    /// Streams a full square matrix row by row: upper entries are stored, lower entries are
    /// checked against the already stored mirror.
    pub fn from_dense(a: &DMatrix<f64>, symmetry_tolerance: f64) -> LinSysResult<Self> {
        if !a.is_square() {
            return Err(LinSysError::DimensionMismatch(format!(
                "symmetric matrix must be square, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        let mut packed = Self::allocate(a.nrows())?.with_symmetry_tolerance(symmetry_tolerance);
        for (i, j) in iproduct!(0..a.nrows(), 0..a.ncols()) {
            packed.set(i, j, a[(i, j)])?;
        }
        Ok(packed)
    }

    /// builds the matrix from its upper triangle listed row by row (a(0,0), a(0,1), ..., a(n-1,n-1))
    pub fn from_upper_triangle(n: usize, upper: &[f64]) -> LinSysResult<Self> {
        let expected = n * (n + 1) / 2;
        if upper.len() != expected {
            return Err(LinSysError::MalformedInput(format!(
                "upper triangle of a {}x{} matrix needs {} values, got {}",
                n,
                n,
                expected,
                upper.len()
            )));
        }
        let mut packed = Self::allocate(n)?;
        packed.data.copy_from_slice(upper);
        Ok(packed)
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n, self.n, |i, j| self.get(i, j))
    }
}

impl MatrixStorage for SymmetricPacked {
    fn dim(&self) -> usize {
        self.n
    }
    fn index(&self, i: usize, j: usize) -> Option<usize> {
        if i < self.n && j < self.n {
            Some(packed_index(self.n, i, j))
        } else {
            None
        }
    }
    fn get(&self, i: usize, j: usize) -> f64 {
        self.data[packed_index(self.n, i, j)]
    }
    fn set(&mut self, i: usize, j: usize, value: f64) -> LinSysResult<()> {
        check_position(self.n, i, j)?;
        let idx = packed_index(self.n, i, j);
        if i <= j {
            self.data[idx] = value;
        } else if !mirrors_agree(value, self.data[idx], self.symmetry_tolerance) {
            return Err(LinSysError::MatrixNotSymmetric {
                row: i,
                col: j,
                lower: value,
                upper: self.data[idx],
            });
        }
        Ok(())
    }
    fn stored_elements(&self) -> usize {
        self.data.len()
    }
}

impl SymmetricStorage for SymmetricPacked {
    fn upper_row_end(&self, _i: usize) -> usize {
        self.n
    }
    fn upper_offset(&self, i: usize, j: usize) -> usize {
        packed_index(self.n, i, j)
    }
    fn values(&self) -> &[f64] {
        &self.data
    }
    fn values_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

////////////////////////////////////////////////////////////////////////////////////////
//                         BANDED
////////////////////////////////////////////////////////////////////////////////////////
/// Maximum of (col - row + 1) over the nonzero entries of the upper triangle.
/// A diagonal (or zero) matrix has bandwidth 1.
pub fn find_bandwidth(a: &DMatrix<f64>) -> usize {
    let n = a.nrows().min(a.ncols());
    if n == 0 {
        return 0;
    }
    let mut bandwidth = 1;
    for (i, j) in iproduct!(0..a.nrows(), 0..a.ncols()) {
        if j >= i && a[(i, j)] != 0.0 && j - i + 1 > bandwidth {
            bandwidth = j - i + 1;
        }
    }
    debug!("bandwidth of {}x{} matrix = {}", a.nrows(), a.ncols(), bandwidth);
    bandwidth
}

/// Symmetric banded matrix: row i keeps columns i..i+bandwidth-1 (offset 0 is the diagonal).
#[derive(Debug, Clone, PartialEq)]
pub struct BandedStorage {
    n: usize,
    bandwidth: usize,
    data: Vec<f64>,
    symmetry_tolerance: f64,
}

impl BandedStorage {
    pub fn allocate(n: usize, bandwidth: usize) -> LinSysResult<Self> {
        if n > 0 && (bandwidth == 0 || bandwidth > n) {
            return Err(LinSysError::DimensionMismatch(format!(
                "bandwidth {} is not valid for a {}x{} matrix",
                bandwidth, n, n
            )));
        }
        let data = allocate_zeros(element_count(n, bandwidth)?)?;
        Ok(BandedStorage {
            n,
            bandwidth,
            data,
            symmetry_tolerance: DEFAULT_SYMMETRY_TOLERANCE,
        })
    }

    pub fn with_symmetry_tolerance(mut self, tolerance: f64) -> Self {
        self.symmetry_tolerance = tolerance;
        self
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    /// detects the bandwidth of `a` and copies its band, validating symmetry
    pub fn from_dense(a: &DMatrix<f64>, symmetry_tolerance: f64) -> LinSysResult<Self> {
        if !a.is_square() {
            return Err(LinSysError::DimensionMismatch(format!(
                "banded matrix must be square, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        let bandwidth = find_bandwidth(a);
        info!("bandwidth: {}", bandwidth);
        let mut banded =
            Self::allocate(a.nrows(), bandwidth)?.with_symmetry_tolerance(symmetry_tolerance);
        for (i, j) in iproduct!(0..a.nrows(), 0..a.ncols()) {
            banded.set(i, j, a[(i, j)])?;
        }
        Ok(banded)
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n, self.n, |i, j| self.get(i, j))
    }

    fn in_band(&self, i: usize, j: usize) -> bool {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        j - i < self.bandwidth
    }
}

impl MatrixStorage for BandedStorage {
    fn dim(&self) -> usize {
        self.n
    }
    fn index(&self, i: usize, j: usize) -> Option<usize> {
        if i >= self.n || j >= self.n || !self.in_band(i, j) {
            return None;
        }
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        Some(i * self.bandwidth + (j - i))
    }
    fn get(&self, i: usize, j: usize) -> f64 {
        match self.index(i, j) {
            Some(idx) => self.data[idx],
            None => 0.0,
        }
    }
    fn set(&mut self, i: usize, j: usize, value: f64) -> LinSysResult<()> {
        check_position(self.n, i, j)?;
        let stored = self.get(i, j);
        if i <= j {
            match self.index(i, j) {
                Some(idx) => self.data[idx] = value,
                None if value == 0.0 => {}
                None => {
                    return Err(LinSysError::BandViolation {
                        row: i,
                        col: j,
                        bandwidth: self.bandwidth,
                    });
                }
            }
        } else if !mirrors_agree(value, stored, self.symmetry_tolerance) {
            return Err(LinSysError::MatrixNotSymmetric {
                row: i,
                col: j,
                lower: value,
                upper: stored,
            });
        }
        Ok(())
    }
    fn stored_elements(&self) -> usize {
        self.data.len()
    }
}

impl SymmetricStorage for BandedStorage {
    fn upper_row_end(&self, i: usize) -> usize {
        self.n.min(i + self.bandwidth)
    }
    fn upper_offset(&self, i: usize, j: usize) -> usize {
        i * self.bandwidth + (j - i)
    }
    fn values(&self) -> &[f64] {
        &self.data
    }
    fn values_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn symmetric_tridiagonal(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                4.0
            } else if i.abs_diff(j) == 1 {
                -1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_packed_index_is_bijection() {
        for n in 1..8 {
            let mut seen = HashSet::new();
            for i in 0..n {
                for j in i..n {
                    let idx = packed_index(n, i, j);
                    assert!(idx < n * (n + 1) / 2);
                    assert!(seen.insert(idx), "duplicate index {} for n = {}", idx, n);
                    assert_eq!(idx, packed_index(n, j, i));
                }
            }
            assert_eq!(seen.len(), n * (n + 1) / 2);
        }
    }

    #[test]
    fn test_packed_index_matches_one_based_formula() {
        let n = 6;
        for i in 1..=n {
            for j in i..=n {
                let one_based = (i - 1) * n - (i - 1) * (i.max(2) - 2) / 2 + (j - i);
                assert_eq!(packed_index(n, i - 1, j - 1), one_based);
            }
        }
    }

    #[test]
    fn test_packed_roundtrip_and_storage_size() {
        let a = symmetric_tridiagonal(5);
        let packed = SymmetricPacked::from_dense(&a, DEFAULT_SYMMETRY_TOLERANCE).unwrap();
        assert_eq!(packed.stored_elements(), 15);
        assert_eq!(packed.to_dense(), a);
        assert_eq!(packed.get(3, 2), packed.get(2, 3));
    }

    #[test]
    fn test_packed_rejects_asymmetric_input() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.5, 1.0]);
        let res = SymmetricPacked::from_dense(&a, DEFAULT_SYMMETRY_TOLERANCE);
        match res {
            Err(LinSysError::MatrixNotSymmetric { row, col, .. }) => {
                assert_eq!((row, col), (1, 0));
            }
            other => panic!("expected MatrixNotSymmetric, got {:?}", other),
        }
    }

    #[test]
    fn test_packed_tolerates_rounding_in_mirror() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.1 + 0.2, 0.3, 1.0]);
        assert!(SymmetricPacked::from_dense(&a, DEFAULT_SYMMETRY_TOLERANCE).is_ok());
    }

    #[test]
    fn test_packed_from_upper_triangle() {
        let packed = SymmetricPacked::from_upper_triangle(3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let expected = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 5.0, 3.0, 5.0, 6.0]);
        assert_eq!(packed.to_dense(), expected);
        assert!(matches!(
            SymmetricPacked::from_upper_triangle(3, &[1.0, 2.0]),
            Err(LinSysError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_bandwidth_detection() {
        let diagonal = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![1.0, 2.0, 3.0]));
        assert_eq!(find_bandwidth(&diagonal), 1);
        assert_eq!(find_bandwidth(&symmetric_tridiagonal(6)), 2);

        let n = 5;
        let mut corner = DMatrix::<f64>::identity(n, n);
        corner[(0, n - 1)] = 1.0;
        assert_eq!(find_bandwidth(&corner), n);
        assert_eq!(find_bandwidth(&DMatrix::<f64>::zeros(3, 3)), 1);
    }

    #[test]
    fn test_banded_layout() {
        let a = symmetric_tridiagonal(4);
        let banded = BandedStorage::from_dense(&a, DEFAULT_SYMMETRY_TOLERANCE).unwrap();
        assert_eq!(banded.bandwidth(), 2);
        assert_eq!(banded.stored_elements(), 8);
        assert_eq!(banded.index(1, 2), Some(3));
        assert_eq!(banded.index(2, 1), Some(3));
        assert_eq!(banded.index(0, 3), None);
        assert_eq!(banded.get(0, 3), 0.0);
        assert_eq!(banded.to_dense(), a);
    }

    #[test]
    fn test_banded_rejects_values_outside_band() {
        let mut banded = BandedStorage::allocate(4, 2).unwrap();
        assert!(banded.set(0, 3, 0.0).is_ok());
        assert!(matches!(
            banded.set(0, 3, 1.0),
            Err(LinSysError::BandViolation { row: 0, col: 3, bandwidth: 2 })
        ));
        // lower entry outside of the band mirrors an implicit zero
        assert!(matches!(
            banded.set(3, 0, 1.0),
            Err(LinSysError::MatrixNotSymmetric { .. })
        ));
    }

    #[test]
    fn test_banded_rejects_asymmetric_input() {
        let mut a = symmetric_tridiagonal(4);
        a[(2, 1)] = -2.0;
        assert!(matches!(
            BandedStorage::from_dense(&a, DEFAULT_SYMMETRY_TOLERANCE),
            Err(LinSysError::MatrixNotSymmetric { row: 2, col: 1, .. })
        ));
    }

    #[test]
    fn test_oversized_storage_is_allocation_failure() {
        assert!(matches!(
            SymmetricPacked::allocate(1usize << 33),
            Err(LinSysError::AllocationFailure { .. })
        ));
        assert!(matches!(
            SymmetricPacked::allocate(usize::MAX),
            Err(LinSysError::AllocationFailure { .. })
        ));
        assert!(matches!(
            BandedStorage::allocate(1usize << 40, 1usize << 30),
            Err(LinSysError::AllocationFailure { .. })
        ));
        match BandedStorage::allocate(1usize << 40, 4) {
            Err(LinSysError::AllocationFailure { elements }) => assert_eq!(elements, 1usize << 42),
            other => panic!("expected allocation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_dense_storage_trait() {
        let mut a = DMatrix::<f64>::zeros(3, 3);
        MatrixStorage::set(&mut a, 2, 1, 7.0).unwrap();
        assert_eq!(MatrixStorage::get(&a, 2, 1), 7.0);
        assert_eq!(MatrixStorage::index(&a, 2, 1), Some(5));
        assert_eq!(a.stored_elements(), 9);
        assert!(MatrixStorage::set(&mut a, 3, 0, 1.0).is_err());
    }
}
