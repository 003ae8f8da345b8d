//! file -> solver -> report, through the public API only
use RustedLinSolve::Utils::data_files::{
    read_banded_file, read_combined_system_file, read_matrix_file, read_rectangular_matrix_file,
    read_symmetric_packed_file, read_vector_file,
};
use RustedLinSolve::distributed::roundtrip::vector_round_trip;
use RustedLinSolve::distributed::row_matvec::distributed_matvec;
use RustedLinSolve::somelinalg::conjugate_gradient::{CgSettings, ConjugateGradient};
use RustedLinSolve::somelinalg::gauss_elimination::{
    SolverConfig, gauss_banded, gauss_no_pivoting, gauss_partial_pivoting, gauss_symmetric_packed,
};
use RustedLinSolve::somelinalg::linear_solver_api::{LinearSystemTask, SolverMethod};
use RustedLinSolve::somelinalg::linsys_error::LinSysError;
use RustedLinSolve::somelinalg::vector_ops::relative_residual_norm;
use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_matrix(path: &Path, a: &DMatrix<f64>) {
    let mut file = File::create(path).unwrap();
    for row in a.row_iter() {
        let line: Vec<String> = row.iter().map(|v| format!("{:.17e}", v)).collect();
        writeln!(file, "{}", line.join(" ")).unwrap();
    }
}

fn write_vector(path: &Path, v: &DVector<f64>) {
    let mut file = File::create(path).unwrap();
    for x in v.iter() {
        writeln!(file, "{:.17e}", x).unwrap();
    }
}

/// symmetric positive definite, bandwidth 3
fn spd(n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| match i.abs_diff(j) {
        0 => 5.0 + (i % 3) as f64,
        1 => -1.0,
        2 => 0.25,
        _ => 0.0,
    })
}

fn fixture(dir: &Path, n: usize) -> (PathBuf, PathBuf, DMatrix<f64>, DVector<f64>) {
    let a = spd(n);
    let b = DVector::from_iterator(n, (0..n).map(|i| (i as f64).sin() + 2.0));
    let a_path = dir.join("A.txt");
    let b_path = dir.join("b.txt");
    write_matrix(&a_path, &a);
    write_vector(&b_path, &b);
    (a_path, b_path, a, b)
}

#[test]
fn all_solvers_agree_on_file_input() {
    let dir = tempdir().unwrap();
    let n = 10;
    let (a_path, b_path, a, b) = fixture(dir.path(), n);
    let config = SolverConfig::default();

    let a_read = read_matrix_file(&a_path).unwrap();
    let b_read = read_vector_file(&b_path, Some(n)).unwrap();
    assert_eq!(a_read, a);
    assert_eq!(b_read, b);

    let x_pivot = gauss_partial_pivoting(&mut a_read.clone(), &mut b_read.clone(), &config).unwrap();
    assert!(relative_residual_norm(&a, &x_pivot, &b).unwrap() <= 1e-9);

    let x_naive = gauss_no_pivoting(&mut a_read.clone(), &mut b_read.clone(), &config).unwrap();
    let mut packed = read_symmetric_packed_file(&a_path, config.symmetry_tolerance).unwrap();
    let x_packed = gauss_symmetric_packed(&mut packed, &mut b_read.clone(), &config).unwrap();
    let mut banded = read_banded_file(&a_path, config.symmetry_tolerance).unwrap();
    assert_eq!(banded.bandwidth(), 3);
    let x_banded = gauss_banded(&mut banded, &mut b_read.clone(), &config).unwrap();
    let x_cg = ConjugateGradient::solve(&a, &b, &CgSettings::default()).unwrap().x;

    for i in 0..n {
        assert_relative_eq!(x_naive[i], x_pivot[i], epsilon = 1e-10);
        assert_relative_eq!(x_packed[i], x_pivot[i], epsilon = 1e-10);
        assert_relative_eq!(x_banded[i], x_pivot[i], epsilon = 1e-10);
        assert_relative_eq!(x_cg[i], x_pivot[i], epsilon = 1e-8);
    }
}

#[test]
fn combined_file_and_singular_system() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("system.txt");
    fs::write(&path, "1 2\n2 4\n3\n6\n").unwrap();
    let (mut a, mut b) = read_combined_system_file(&path).unwrap();
    assert!(matches!(
        gauss_partial_pivoting(&mut a, &mut b, &SolverConfig::default()),
        Err(LinSysError::SingularMatrix { step: 1, .. })
    ));
}

#[test]
fn task_writes_reports() {
    let dir = tempdir().unwrap();
    let (a_path, b_path, _, _) = fixture(dir.path(), 6);
    let output = dir.path().join("out.txt");
    let csv_path = dir.path().join("out.csv");
    let mut task = LinearSystemTask::new();
    task.set_method(SolverMethod::GaussNaive);
    task.set_files(Some(a_path), Some(b_path), None);
    task.set_outputs(Some(output.clone()), Some(csv_path.clone()));
    let x = task.run().unwrap();
    let report = fs::read_to_string(&output).unwrap();
    assert!(report.contains("b (6 x 1):"));
    assert_eq!(report.lines().filter(|l| l.starts_with("x[")).count(), 6);
    let csv_rows = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv_rows.lines().count(), x.len() + 1);
}

#[test]
fn distributed_demos() {
    let report = vector_round_trip(&[1.0, 2.0, 3.0], 2).unwrap();
    assert_eq!(report.returned, vec![2.0, 4.0, 6.0]);

    let dir = tempdir().unwrap();
    let a_path = dir.path().join("A.txt");
    fs::write(
        &a_path,
        "1 0 0 0\n0 1 0 0\n0 0 1 0\n0 0 0 1\n1 1 1 1\n2 0 -1 0.5\n",
    )
    .unwrap();
    let a = read_rectangular_matrix_file(&a_path).unwrap();
    let v = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    let expected = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 10.0, 1.0]);
    for world_size in 1..=3 {
        assert_eq!(distributed_matvec(world_size, &a, &v).unwrap(), expected);
    }
}
