#![allow(non_snake_case)]
//! Command line driver: every subcommand loads its data files, runs one solver or demo and
//! prints the result as `name[index] = value` lines. Any error ends the process with status 1.
use RustedLinSolve::Utils::data_files::{read_rectangular_matrix_file, read_vector_file};
use RustedLinSolve::Utils::logger::{
    default_log_file_name, init_logger, parse_log_level, solution_lines,
};
use RustedLinSolve::distributed::roundtrip::vector_round_trip;
use RustedLinSolve::somelinalg::linear_solver_api::{LinearSystemTask, SolverMethod};
use RustedLinSolve::somelinalg::linsys_error::{LinSysError, LinSysResult};
use RustedLinSolve::somelinalg::vector_ops::{
    bilinear_row_product, inner_product, matrix_product, matrix_vector_product, vector_add,
};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use nalgebra::{DMatrix, DVector};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rusted-linsolve",
    version,
    about = "Gaussian elimination (dense, symmetric packed, banded), conjugate gradient and message-passing demos"
)]
struct Cli {
    /// debug, info, warn, error or off
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// also write the log into a file; without a value the name is log_<date>_<time>.txt
    #[arg(long, num_args = 0..=1, global = true)]
    log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dense Gaussian elimination with partial pivoting
    Gauss(SolveArgs),
    /// Dense Gaussian elimination without pivoting
    GaussNaive(SolveArgs),
    /// Symmetric matrix in packed storage, elimination without pivoting
    Symmetric(SymmetricArgs),
    /// Symmetric banded matrix, elimination restricted to the band
    Banded(SolveArgs),
    /// Conjugate gradient method
    Cg(CgArgs),
    /// Vector and matrix products: A v, A B, a^T A B, a + b, a . b
    Product(ProductArgs),
    /// Two-rank round trip: rank 1 doubles the vector sent by rank 0
    Roundtrip(RoundtripArgs),
    /// Matrix-vector product with rows distributed row-cyclically over ranks
    DistMatvec(DistMatvecArgs),
    /// Run a task file
    Task(TaskArgs),
}

#[derive(Args)]
struct SolveArgs {
    /// coefficient matrix, one row per line
    #[arg(short, long)]
    matrix: Option<PathBuf>,
    /// right-hand side
    #[arg(short, long)]
    vector: Option<PathBuf>,
    /// matrix rows followed by the right-hand side in one file (dense methods)
    #[arg(short, long)]
    system: Option<PathBuf>,
    /// text report with the input echoed
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// solution as csv
    #[arg(long)]
    csv: Option<PathBuf>,
    #[arg(long)]
    pivot_tolerance: Option<f64>,
    #[arg(long)]
    symmetry_tolerance: Option<f64>,
}

#[derive(Args)]
struct SymmetricArgs {
    #[command(flatten)]
    solve: SolveArgs,
    /// matrix file lists only the upper triangle, row i holding a(i,i) .. a(i,N)
    #[arg(long)]
    upper_triangle: bool,
}

#[derive(Args)]
struct CgArgs {
    #[command(flatten)]
    solve: SolveArgs,
    /// threshold on the residual 1-norm
    #[arg(long)]
    eps: Option<f64>,
    /// maximal number of iterations
    #[arg(long)]
    kmax: Option<usize>,
}

#[derive(Args)]
struct ProductArgs {
    /// matrix A (N x M)
    #[arg(short, long)]
    matrix: PathBuf,
    /// vector v, prints c = A v
    #[arg(short, long)]
    vector: Option<PathBuf>,
    /// matrix B, prints A B
    #[arg(long)]
    matrix_b: Option<PathBuf>,
    /// vector a, prints a^T A B (needs --matrix-b)
    #[arg(long)]
    left_vector: Option<PathBuf>,
    /// vector w, prints v + w and v . w (needs --vector)
    #[arg(long)]
    add_vector: Option<PathBuf>,
}

#[derive(Args)]
struct RoundtripArgs {
    /// vector file sent by rank 0
    #[arg(short, long)]
    vector: PathBuf,
    #[arg(long, default_value = "2")]
    ranks: usize,
}

#[derive(Args)]
struct DistMatvecArgs {
    /// matrix file (N x M) owned by rank 0
    #[arg(short, long)]
    matrix: PathBuf,
    /// vector file with M elements
    #[arg(short, long)]
    vector: PathBuf,
    #[arg(long, default_value = "2")]
    ranks: usize,
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Args)]
struct TaskArgs {
    /// task file with solver, files, cg, distributed and logging sections
    task_file: PathBuf,
}

fn build_task(method: SolverMethod, args: SolveArgs) -> LinSysResult<LinearSystemTask> {
    let mut task = LinearSystemTask::new();
    task.set_method(method);
    task.set_files(args.matrix, args.vector, args.system);
    task.set_outputs(args.output, args.csv);
    task.set_solver_params(args.pivot_tolerance, args.symmetry_tolerance)?;
    Ok(task)
}

fn print_solution(method: SolverMethod, x: &DVector<f64>) {
    let (name, first_index) = method.output_naming();
    for line in solution_lines(name, x, first_index) {
        println!("{}", line);
    }
}

fn run_task(mut task: LinearSystemTask) -> LinSysResult<()> {
    let x = task.run()?;
    print_solution(task.method, &x);
    Ok(())
}

fn print_matrix(name: &str, m: &DMatrix<f64>) {
    for i in 0..m.nrows() {
        for j in 0..m.ncols() {
            println!("{}[{}][{}] = {:.10e}", name, i, j, m[(i, j)]);
        }
    }
}

fn run_product(args: ProductArgs) -> LinSysResult<()> {
    let a = read_rectangular_matrix_file(&args.matrix)?;
    let v = match &args.vector {
        Some(path) => Some(read_vector_file(path, None)?),
        None => None,
    };
    if let Some(v) = &v {
        let c = matrix_vector_product(&a, v)?;
        solution_lines("c", &c, 0).iter().for_each(|l| println!("{}", l));
    }
    if let Some(path) = &args.add_vector {
        let Some(v) = &v else {
            return Err(LinSysError::Config("--add-vector needs --vector".to_string()));
        };
        let w = read_vector_file(path, Some(v.len()))?;
        solution_lines("s", &vector_add(v, &w)?, 0)
            .iter()
            .for_each(|l| println!("{}", l));
        println!("v . w = {:.10e}", inner_product(v, &w)?);
    }
    if let Some(path) = &args.matrix_b {
        let b = read_rectangular_matrix_file(path)?;
        let ab = matrix_product(&a, &b)?;
        print_matrix("AB", &ab);
        if let Some(left) = &args.left_vector {
            let left = read_vector_file(left, Some(a.nrows()))?;
            let row = bilinear_row_product(&left, &a, &b)?;
            solution_lines("aAB", &row, 0)
                .iter()
                .for_each(|l| println!("{}", l));
        }
    }
    Ok(())
}

fn run_command(command: Commands) -> LinSysResult<()> {
    match command {
        Commands::Gauss(args) => run_task(build_task(SolverMethod::Gauss, args)?),
        Commands::GaussNaive(args) => run_task(build_task(SolverMethod::GaussNaive, args)?),
        Commands::Banded(args) => run_task(build_task(SolverMethod::Banded, args)?),
        Commands::Symmetric(args) => {
            let mut task = build_task(SolverMethod::Symmetric, args.solve)?;
            task.upper_triangle = args.upper_triangle;
            run_task(task)
        }
        Commands::Cg(args) => {
            let mut task = build_task(SolverMethod::Cg, args.solve)?;
            task.set_cg_params(args.eps, args.kmax)?;
            run_task(task)
        }
        Commands::Product(args) => run_product(args),
        Commands::Roundtrip(args) => {
            let vector = read_vector_file(&args.vector, None)?;
            let report = vector_round_trip(vector.as_slice(), args.ranks)?;
            for (i, v) in report.received.iter().enumerate() {
                println!("a[{}] = {:.10e}", i, v);
            }
            for (i, v) in report.returned.iter().enumerate() {
                println!("b[{}] = {:.10e}", i, v);
            }
            Ok(())
        }
        Commands::DistMatvec(args) => {
            let mut task = LinearSystemTask::new();
            task.set_method(SolverMethod::DistMatvec);
            task.set_files(Some(args.matrix), Some(args.vector), None);
            task.set_outputs(args.output, args.csv);
            task.set_ranks(args.ranks)?;
            run_task(task)
        }
        Commands::Task(args) => {
            let mut task = LinearSystemTask::from_task_file(&args.task_file)?;
            let x = task.solve()?;
            print_solution(task.method, &x);
            Ok(())
        }
    }
}

fn run(cli: Cli) -> LinSysResult<()> {
    if !matches!(cli.command, Commands::Task(_)) {
        let level = parse_log_level(&cli.log_level)?;
        let log_file = cli
            .log_file
            .map(|file| file.unwrap_or_else(|| PathBuf::from(default_log_file_name())));
        init_logger(level, log_file.as_deref())?;
    }
    run_command(cli.command)?;
    info!("done");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
