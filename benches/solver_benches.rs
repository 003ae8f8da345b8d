use RustedLinSolve::somelinalg::conjugate_gradient::{CgSettings, ConjugateGradient};
use RustedLinSolve::somelinalg::gauss_elimination::{
    SolverConfig, gauss_banded, gauss_partial_pivoting, gauss_symmetric_packed,
};
use RustedLinSolve::somelinalg::matrix_storage::{BandedStorage, SymmetricPacked};
use criterion::{Criterion, criterion_group, criterion_main};
use nalgebra::{DMatrix, DVector};
use std::hint::black_box;

const N: usize = 200;

// symmetric, diagonally dominant, bandwidth 3
fn test_matrix(n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| match i.abs_diff(j) {
        0 => 6.0,
        1 => -1.5,
        2 => 0.5,
        _ => 0.0,
    })
}

fn bench_direct_solvers(c: &mut Criterion) {
    let a = test_matrix(N);
    let b = DVector::from_element(N, 1.0);
    let config = SolverConfig::default();
    let packed = SymmetricPacked::from_dense(&a, config.symmetry_tolerance).unwrap();
    let banded = BandedStorage::from_dense(&a, config.symmetry_tolerance).unwrap();

    let mut group = c.benchmark_group("gauss");
    group.bench_function("dense partial pivoting", |bench| {
        bench.iter(|| {
            gauss_partial_pivoting(&mut a.clone(), &mut b.clone(), black_box(&config)).unwrap()
        })
    });
    group.bench_function("symmetric packed", |bench| {
        bench.iter(|| {
            gauss_symmetric_packed(&mut packed.clone(), &mut b.clone(), black_box(&config))
                .unwrap()
        })
    });
    group.bench_function("banded", |bench| {
        bench.iter(|| gauss_banded(&mut banded.clone(), &mut b.clone(), black_box(&config)).unwrap())
    });
    group.finish();
}

fn bench_cg(c: &mut Criterion) {
    let a = test_matrix(N);
    let b = DVector::from_element(N, 1.0);
    let settings = CgSettings::default();
    c.bench_function("conjugate gradient", |bench| {
        bench.iter(|| ConjugateGradient::solve(&a, black_box(&b), &settings).unwrap())
    });
}

criterion_group!(benches, bench_direct_solvers, bench_cg);
criterion_main!(benches);
