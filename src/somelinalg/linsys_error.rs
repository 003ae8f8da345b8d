use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::distributed::communicator::CommError;

/// Error types for loading and solving linear systems. Every variant is fatal for the
/// program: nothing in the solver family retries or switches strategy.
#[derive(Debug)]
pub enum LinSysError {
    FileNotFound(PathBuf),
    /// unparseable token, wrong token count or wrong line-count parity
    MalformedInput(String),
    AllocationFailure { elements: usize },
    /// pivot (or diagonal) magnitude below the tolerance
    SingularMatrix { step: usize, pivot: f64 },
    /// diagonal exactly zero on a non-pivoting path
    DivisionByZero { step: usize },
    MatrixNotSymmetric {
        row: usize,
        col: usize,
        lower: f64,
        upper: f64,
    },
    /// nonzero value placed outside of the band of a banded matrix
    BandViolation { row: usize, col: usize, bandwidth: usize },
    DidNotConverge { iterations: usize, residual: f64 },
    NotPositiveDefinite { iteration: usize, curvature: f64 },
    DimensionMismatch(String),
    Config(String),
    Io(io::Error),
    Comm(CommError),
}

impl fmt::Display for LinSysError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinSysError::FileNotFound(path) => write!(f, "file not found: {}", path.display()),
            LinSysError::MalformedInput(msg) => write!(f, "malformed input: {}", msg),
            LinSysError::AllocationFailure { elements } => {
                write!(f, "cannot allocate storage for {} elements", elements)
            }
            LinSysError::SingularMatrix { step, pivot } => write!(
                f,
                "coefficient matrix is singular: pivot {:e} at step {}",
                pivot, step
            ),
            LinSysError::DivisionByZero { step } => {
                write!(f, "division by zero: diagonal element {} is zero", step)
            }
            LinSysError::MatrixNotSymmetric {
                row,
                col,
                lower,
                upper,
            } => write!(
                f,
                "matrix is not symmetric at ({}, {}): {} != {}",
                row, col, lower, upper
            ),
            LinSysError::BandViolation {
                row,
                col,
                bandwidth,
            } => write!(
                f,
                "element ({}, {}) lies outside of the band (bandwidth {})",
                row, col, bandwidth
            ),
            LinSysError::DidNotConverge {
                iterations,
                residual,
            } => write!(
                f,
                "solution not found after {} iterations (residual 1-norm {:e})",
                iterations, residual
            ),
            LinSysError::NotPositiveDefinite {
                iteration,
                curvature,
            } => write!(
                f,
                "matrix is not positive definite: p^T A p = {:e} at iteration {}",
                curvature, iteration
            ),
            LinSysError::DimensionMismatch(msg) => write!(f, "dimension mismatch: {}", msg),
            LinSysError::Config(msg) => write!(f, "task file error: {}", msg),
            LinSysError::Io(e) => write!(f, "i/o error: {}", e),
            LinSysError::Comm(e) => write!(f, "message passing error: {}", e),
        }
    }
}

impl std::error::Error for LinSysError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinSysError::Io(e) => Some(e),
            LinSysError::Comm(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LinSysError {
    fn from(e: io::Error) -> Self {
        LinSysError::Io(e)
    }
}

impl From<CommError> for LinSysError {
    fn from(e: CommError) -> Self {
        LinSysError::Comm(e)
    }
}

impl From<csv::Error> for LinSysError {
    fn from(e: csv::Error) -> Self {
        LinSysError::Io(io::Error::other(e))
    }
}

pub type LinSysResult<T> = Result<T, LinSysError>;
