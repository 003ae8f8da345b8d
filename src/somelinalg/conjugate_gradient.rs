//! Conjugate gradient method for Ax = b with a dense symmetric positive definite A.
//!
//! # Example
//! ```rust
//! use nalgebra::{DMatrix, DVector};
//! use RustedLinSolve::somelinalg::conjugate_gradient::{CgSettings, ConjugateGradient};
//!
//! let a = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
//! let b = DVector::from_vec(vec![1.0, 2.0]);
//! let solution = ConjugateGradient::solve(&a, &b, &CgSettings::default()).unwrap();
//! assert!(solution.iterations <= 2);
//! ```
//!
//! The stopping test is the 1-norm of the recursively updated residual. Running out of
//! iterations is an error; there is no restart and no preconditioning.
use crate::somelinalg::linsys_error::{LinSysError, LinSysResult};
use crate::somelinalg::vector_ops::{inner_product, matrix_vector_product, vector_norm1};
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};

/// convergence threshold on the residual 1-norm
pub const DEFAULT_EPS: f64 = 1e-8;
/// maximal number of iterations
pub const DEFAULT_KMAX: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct CgSettings {
    pub eps: f64,
    pub kmax: usize,
}

impl Default for CgSettings {
    fn default() -> Self {
        CgSettings {
            eps: DEFAULT_EPS,
            kmax: DEFAULT_KMAX,
        }
    }
}

/// result of a converged solve
#[derive(Debug, Clone)]
pub struct CgSolution {
    pub x: DVector<f64>,
    pub iterations: usize,
    /// residual 1-norm after every iteration
    pub residual_history: Vec<f64>,
}

impl CgSolution {
    pub fn final_residual(&self) -> f64 {
        self.residual_history.last().copied().unwrap_or(0.0)
    }
}

/// solver state; lives for a single solve
#[derive(Debug)]
pub struct ConjugateGradient<'a> {
    a: &'a DMatrix<f64>,
    x: DVector<f64>,
    r: DVector<f64>,
    p: DVector<f64>,
    // r^T r of the current residual
    rho: f64,
    iteration_count: usize,
    err: f64,
    residual_history: Vec<f64>,
}

impl<'a> ConjugateGradient<'a> {
    /// r_0 = p_0 = b - A x_0
    pub fn new(a: &'a DMatrix<f64>, b: &DVector<f64>, x0: DVector<f64>) -> LinSysResult<Self> {
        if !a.is_square() {
            return Err(LinSysError::DimensionMismatch(format!(
                "CG needs a square matrix, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        if b.len() != a.nrows() || x0.len() != a.nrows() {
            return Err(LinSysError::DimensionMismatch(format!(
                "matrix is {}x{}, b has {} elements, x0 has {}",
                a.nrows(),
                a.ncols(),
                b.len(),
                x0.len()
            )));
        }
        let ax = matrix_vector_product(a, &x0)?;
        let r = b - ax;
        let p = r.clone();
        let rho = inner_product(&r, &r)?;
        let err = vector_norm1(&r);
        Ok(ConjugateGradient {
            a,
            x: x0,
            r,
            p,
            rho,
            iteration_count: 0,
            err,
            residual_history: Vec::new(),
        })
    }

    /// residual 1-norm of the current iterate
    pub fn err(&self) -> f64 {
        self.err
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn x(&self) -> &DVector<f64> {
        &self.x
    }

    /// One CG iteration: updates x and r along p, then the search direction.
    /// Returns the residual 1-norm after the update.
    pub fn step(&mut self) -> LinSysResult<f64> {
        self.iteration_count += 1;
        let ap = matrix_vector_product(self.a, &self.p)?;
        let curvature = inner_product(&self.p, &ap)?;
        if curvature <= 0.0 || !curvature.is_finite() {
            return Err(LinSysError::NotPositiveDefinite {
                iteration: self.iteration_count,
                curvature,
            });
        }
        let alpha = self.rho / curvature;
        self.x.axpy(alpha, &self.p, 1.0);
        self.r.axpy(-alpha, &ap, 1.0);
        self.err = vector_norm1(&self.r);
        self.residual_history.push(self.err);
        debug!(
            "CG iteration {}: alpha = {:e}, residual = {:e}",
            self.iteration_count, alpha, self.err
        );

        // p_{k+1} = r_{k+1} + beta p_k
        let rho_new = inner_product(&self.r, &self.r)?;
        let beta = rho_new / self.rho;
        self.p *= beta;
        self.p += &self.r;
        self.rho = rho_new;
        Ok(self.err)
    }

    /// Iterates until the residual 1-norm drops below `eps`, failing with `DidNotConverge`
    /// when `kmax` iterations were not enough.
    pub fn run(mut self, settings: &CgSettings) -> LinSysResult<CgSolution> {
        if self.err < settings.eps {
            info!("initial guess already satisfies the tolerance");
            return Ok(self.into_solution());
        }
        while self.iteration_count < settings.kmax {
            if self.step()? < settings.eps {
                info!("CG converged after {} iterations", self.iteration_count);
                return Ok(self.into_solution());
            }
        }
        warn!(
            "CG did not converge in {} iterations, residual = {:e}",
            self.iteration_count, self.err
        );
        Err(LinSysError::DidNotConverge {
            iterations: self.iteration_count,
            residual: self.err,
        })
    }

    fn into_solution(self) -> CgSolution {
        CgSolution {
            x: self.x,
            iterations: self.iteration_count,
            residual_history: self.residual_history,
        }
    }

    /// solve from the zero initial guess
    pub fn solve(
        a: &'a DMatrix<f64>,
        b: &DVector<f64>,
        settings: &CgSettings,
    ) -> LinSysResult<CgSolution> {
        let x0 = DVector::zeros(b.len());
        Self::new(a, b, x0)?.run(settings)
    }
}
