//! linear algebra: storage layouts, direct and iterative solvers for Ax = b
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// vector and matrix arithmetic
pub mod vector_ops;
/// dense, symmetric packed and banded layouts of the coefficient matrix
pub mod matrix_storage;
/// Gaussian elimination with and without pivoting
pub mod gauss_elimination;
/// conjugate gradient method for symmetric positive definite systems
pub mod conjugate_gradient;
/// error type shared by the loaders, solvers and the distributed layer
pub mod linsys_error;
/// task-level interface: method + data files -> solution and reports
pub mod linear_solver_api;
