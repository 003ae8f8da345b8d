//! Task-level interface: pick a method, point it at the data files, call `solve()`.
//!
//! # Example
//! ```rust, no_run
//! use RustedLinSolve::somelinalg::linear_solver_api::{LinearSystemTask, SolverMethod};
//! let mut task = LinearSystemTask::new();
//! task.set_method(SolverMethod::Cg);
//! task.set_files(Some("A.txt".into()), Some("b.txt".into()), None);
//! task.set_loglevel(Some("info".to_string()), None);
//! let x = task.solve().unwrap();
//! println!("{}", x);
//! ```
//!
//! The same task can be described in a task file:
//! ```text
//! solver
//!  method: symmetric
//!  pivot_tolerance: 1e-15
//! files
//!  matrix: A.txt
//!  vector: b.txt
//!  output: result.txt
//! logging
//!  level: info
//! ```
use crate::Utils::data_files::{
    read_banded_file, read_combined_system_file, read_matrix_file, read_rectangular_matrix_file,
    read_symmetric_packed_file, read_upper_triangle_file, read_vector_file,
};
use crate::Utils::logger::{
    default_log_file_name, init_logger, parse_log_level, save_solution_to_csv,
    save_solution_to_file,
};
use crate::Utils::task_parser::{DocumentMap, Value, parse_document_as, template_from};
use crate::distributed::row_matvec::distributed_matvec;
use crate::somelinalg::conjugate_gradient::{CgSettings, ConjugateGradient};
use crate::somelinalg::gauss_elimination::{
    SolverConfig, gauss_banded, gauss_no_pivoting, gauss_partial_pivoting, gauss_symmetric_packed,
};
use crate::somelinalg::linsys_error::{LinSysError, LinSysResult};
use crate::somelinalg::matrix_storage::MatrixStorage;
use crate::somelinalg::vector_ops::relative_residual_norm;
use log::info;
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumIter, EnumString};
use tabled::{builder::Builder, settings::Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SolverMethod {
    /// dense elimination with partial pivoting
    Gauss,
    /// dense elimination in the natural order
    GaussNaive,
    /// symmetric matrix in packed storage
    Symmetric,
    /// symmetric banded matrix
    Banded,
    /// conjugate gradient
    Cg,
    /// row-cyclic matrix-vector product over several ranks
    DistMatvec,
}

impl SolverMethod {
    /// name of the output vector and the index of its first element
    pub fn output_naming(&self) -> (&'static str, usize) {
        match self {
            SolverMethod::DistMatvec => ("c", 0),
            _ => ("x", 1),
        }
    }
}

const TASK_TEMPLATE: &[(&str, &[&str])] = &[
    (
        "solver",
        &["method", "pivot_tolerance", "symmetry_tolerance", "upper_triangle"],
    ),
    ("files", &["matrix", "vector", "system", "output", "csv"]),
    ("cg", &["eps", "kmax"]),
    ("distributed", &["ranks"]),
    ("logging", &["level", "file"]),
];

pub struct LinearSystemTask {
    pub method: SolverMethod,
    pub config: SolverConfig,
    pub cg_settings: CgSettings,
    pub matrix_file: Option<PathBuf>,
    pub vector_file: Option<PathBuf>,
    /// matrix rows followed by the right-hand side in one file
    pub system_file: Option<PathBuf>,
    /// the symmetric matrix file lists only a(i, j) with j >= i
    pub upper_triangle: bool,
    pub ranks: usize,
    pub output_file: Option<PathBuf>,
    pub csv_file: Option<PathBuf>,
    pub loglevel: Option<String>,
    /// None: terminal only; Some(None): file with the default timestamped name
    pub log_file: Option<Option<PathBuf>>,
    result: Option<DVector<f64>>,
    pub calc_statistics: HashMap<String, String>,
}

impl Default for LinearSystemTask {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSystemTask {
    pub fn new() -> LinearSystemTask {
        LinearSystemTask {
            method: SolverMethod::Gauss,
            config: SolverConfig::default(),
            cg_settings: CgSettings::default(),
            matrix_file: None,
            vector_file: None,
            system_file: None,
            upper_triangle: false,
            ranks: 2,
            output_file: None,
            csv_file: None,
            loglevel: Some("info".to_string()),
            log_file: None,
            result: None,
            calc_statistics: HashMap::new(),
        }
    }
    ////////////////////////////SETTERS///////////////////////////////////////////////////////////////////
    pub fn set_method(&mut self, method: SolverMethod) {
        self.method = method;
    }

    pub fn set_files(
        &mut self,
        matrix_file: Option<PathBuf>,
        vector_file: Option<PathBuf>,
        system_file: Option<PathBuf>,
    ) {
        self.matrix_file = matrix_file;
        self.vector_file = vector_file;
        self.system_file = system_file;
    }

    pub fn set_outputs(&mut self, output_file: Option<PathBuf>, csv_file: Option<PathBuf>) {
        self.output_file = output_file;
        self.csv_file = csv_file;
    }

    pub fn set_solver_params(
        &mut self,
        pivot_tolerance: Option<f64>,
        symmetry_tolerance: Option<f64>,
    ) -> LinSysResult<()> {
        if let Some(tol) = pivot_tolerance {
            if !(tol >= 0.0) {
                return Err(LinSysError::Config(format!(
                    "pivot_tolerance must be non-negative, got {}",
                    tol
                )));
            }
            self.config.pivot_tolerance = tol;
        }
        if let Some(tol) = symmetry_tolerance {
            if !(tol >= 0.0) {
                return Err(LinSysError::Config(format!(
                    "symmetry_tolerance must be non-negative, got {}",
                    tol
                )));
            }
            self.config.symmetry_tolerance = tol;
        }
        Ok(())
    }

    pub fn set_cg_params(&mut self, eps: Option<f64>, kmax: Option<usize>) -> LinSysResult<()> {
        if let Some(eps) = eps {
            if !(eps > 0.0) {
                return Err(LinSysError::Config(format!("eps must be positive, got {}", eps)));
            }
            self.cg_settings.eps = eps;
        }
        if let Some(kmax) = kmax {
            if kmax == 0 {
                return Err(LinSysError::Config("kmax must be positive".to_string()));
            }
            self.cg_settings.kmax = kmax;
        }
        Ok(())
    }

    pub fn set_ranks(&mut self, ranks: usize) -> LinSysResult<()> {
        if ranks == 0 {
            return Err(LinSysError::Config("ranks must be positive".to_string()));
        }
        self.ranks = ranks;
        Ok(())
    }

    pub fn set_loglevel(&mut self, loglevel: Option<String>, log_file: Option<Option<PathBuf>>) {
        self.loglevel = loglevel;
        self.log_file = log_file;
    }

    ////////////////////////////TASK FILE///////////////////////////////////////////////////////////////////
    /// builds a task from the text of a task file
    pub fn from_task_str(input: &str) -> LinSysResult<LinearSystemTask> {
        let template = template_from(TASK_TEMPLATE);
        let doc = parse_document_as(input, Some(&template)).map_err(LinSysError::Config)?;
        for (section, keys) in &doc {
            let Some(known) = template.get(section) else {
                return Err(LinSysError::Config(format!("unknown section '{}'", section)));
            };
            if let Some(key) = keys.keys().find(|k| !known.contains_key(*k)) {
                return Err(LinSysError::Config(format!(
                    "unknown key '{}' in section '{}'",
                    key, section
                )));
            }
        }

        let mut task = LinearSystemTask::new();
        if let Some(method) = first_value(&doc, "solver", "method") {
            let name = method.to_string();
            task.method = name.parse().map_err(|_| {
                LinSysError::Config(format!("unknown solver method '{}'", name))
            })?;
        }
        task.set_solver_params(
            float_value(&doc, "solver", "pivot_tolerance")?,
            float_value(&doc, "solver", "symmetry_tolerance")?,
        )?;
        if let Some(value) = first_value(&doc, "solver", "upper_triangle") {
            task.upper_triangle = value.as_boolean().ok_or_else(|| {
                LinSysError::Config("solver.upper_triangle must be true or false".to_string())
            })?;
        }
        task.set_files(
            path_value(&doc, "files", "matrix"),
            path_value(&doc, "files", "vector"),
            path_value(&doc, "files", "system"),
        );
        task.set_outputs(path_value(&doc, "files", "output"), path_value(&doc, "files", "csv"));
        task.set_cg_params(
            float_value(&doc, "cg", "eps")?,
            usize_value(&doc, "cg", "kmax")?,
        )?;
        if let Some(ranks) = usize_value(&doc, "distributed", "ranks")? {
            task.set_ranks(ranks)?;
        }
        if let Some(level) = first_value(&doc, "logging", "level") {
            let level = level.to_string();
            parse_log_level(&level)?;
            task.loglevel = Some(level);
        }
        if let Some(file) = first_value(&doc, "logging", "file") {
            task.log_file = match file {
                Value::Boolean(false) => None,
                Value::Boolean(true) => Some(None),
                other => Some(Some(PathBuf::from(other.to_string()))),
            };
        }
        Ok(task)
    }

    pub fn from_task_file(path: &Path) -> LinSysResult<LinearSystemTask> {
        if !path.exists() {
            return Err(LinSysError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_task_str(&content)
    }

    ////////////////////////////SOLVING///////////////////////////////////////////////////////////////////
    fn require(file: &Option<PathBuf>, what: &str) -> LinSysResult<PathBuf> {
        file.clone()
            .ok_or_else(|| LinSysError::Config(format!("{} file is not set", what)))
    }

    /// dense system, from the combined file or from the matrix and vector files
    fn load_dense_system(&self) -> LinSysResult<(DMatrix<f64>, DVector<f64>)> {
        if let Some(system) = &self.system_file {
            return read_combined_system_file(system);
        }
        let a = read_matrix_file(&Self::require(&self.matrix_file, "matrix")?)?;
        let b = read_vector_file(&Self::require(&self.vector_file, "vector")?, Some(a.nrows()))?;
        Ok((a, b))
    }

    /// loads the data, runs the chosen method and checks the residual
    fn solver(&mut self) -> LinSysResult<(Vec<(String, DMatrix<f64>)>, DVector<f64>)> {
        self.calc_statistics.clear();
        self.calc_statistics
            .insert("method".to_string(), self.method.to_string());
        let (a_dense, b, x) = match self.method {
            SolverMethod::Gauss | SolverMethod::GaussNaive => {
                let (a, b) = self.load_dense_system()?;
                let (mut a_work, mut b_work) = (a.clone(), b.clone());
                let x = if self.method == SolverMethod::Gauss {
                    gauss_partial_pivoting(&mut a_work, &mut b_work, &self.config)?
                } else {
                    gauss_no_pivoting(&mut a_work, &mut b_work, &self.config)?
                };
                self.calc_statistics
                    .insert("stored elements".to_string(), a.stored_elements().to_string());
                (a, b, x)
            }
            SolverMethod::Symmetric => {
                let matrix_file = Self::require(&self.matrix_file, "matrix")?;
                let mut packed = if self.upper_triangle {
                    read_upper_triangle_file(&matrix_file)?
                } else {
                    read_symmetric_packed_file(&matrix_file, self.config.symmetry_tolerance)?
                };
                let vector_file = Self::require(&self.vector_file, "vector")?;
                let b = read_vector_file(&vector_file, Some(packed.dim()))?;
                let a = packed.to_dense();
                self.calc_statistics.insert(
                    "stored elements".to_string(),
                    packed.stored_elements().to_string(),
                );
                let x = gauss_symmetric_packed(&mut packed, &mut b.clone(), &self.config)?;
                (a, b, x)
            }
            SolverMethod::Banded => {
                let matrix_file = Self::require(&self.matrix_file, "matrix")?;
                let mut banded = read_banded_file(&matrix_file, self.config.symmetry_tolerance)?;
                let vector_file = Self::require(&self.vector_file, "vector")?;
                let b = read_vector_file(&vector_file, Some(banded.dim()))?;
                let a = banded.to_dense();
                self.calc_statistics
                    .insert("bandwidth".to_string(), banded.bandwidth().to_string());
                self.calc_statistics.insert(
                    "stored elements".to_string(),
                    banded.stored_elements().to_string(),
                );
                let x = gauss_banded(&mut banded, &mut b.clone(), &self.config)?;
                (a, b, x)
            }
            SolverMethod::Cg => {
                let (a, b) = self.load_dense_system()?;
                let solution = ConjugateGradient::solve(&a, &b, &self.cg_settings)?;
                self.calc_statistics
                    .insert("iterations".to_string(), solution.iterations.to_string());
                self.calc_statistics.insert(
                    "final residual 1-norm".to_string(),
                    format!("{:e}", solution.final_residual()),
                );
                (a, b, solution.x)
            }
            SolverMethod::DistMatvec => {
                let a = read_rectangular_matrix_file(&Self::require(&self.matrix_file, "matrix")?)?;
                let v = read_vector_file(&Self::require(&self.vector_file, "vector")?, None)?;
                let c = distributed_matvec(self.ranks, &a, &v)?;
                self.calc_statistics
                    .insert("ranks".to_string(), self.ranks.to_string());
                self.calc_statistics.insert(
                    "matrix shape".to_string(),
                    format!("{} x {}", a.nrows(), a.ncols()),
                );
                let inputs = vec![
                    ("A".to_string(), a),
                    ("v".to_string(), DMatrix::from_column_slice(v.len(), 1, v.as_slice())),
                ];
                return Ok((inputs, c));
            }
        };
        self.calc_statistics
            .insert("dimension".to_string(), b.len().to_string());
        let residual = relative_residual_norm(&a_dense, &x, &b)?;
        self.calc_statistics.insert(
            "relative residual ||b - Ax|| / ||b||".to_string(),
            format!("{:e}", residual),
        );
        let inputs = vec![
            ("A".to_string(), a_dense),
            ("b".to_string(), DMatrix::from_column_slice(b.len(), 1, b.as_slice())),
        ];
        Ok((inputs, x))
    }

    fn calc_statistics(&self) {
        let stats = self.calc_statistics.clone();
        let mut table = Builder::from(stats).build();
        table.with(Style::modern_rounded());
        info!("\n \n CALC STATISTICS \n \n {}", table.to_string());
    }

    fn write_reports(&self, inputs: &[(String, DMatrix<f64>)], x: &DVector<f64>) -> LinSysResult<()> {
        let (name, first_index) = self.method.output_naming();
        if let Some(output) = &self.output_file {
            save_solution_to_file(output, inputs, name, x, first_index)?;
        }
        if let Some(csv_file) = &self.csv_file {
            save_solution_to_csv(csv_file, name, x, first_index)?;
        }
        Ok(())
    }

    /// Solves without touching the logger; reports are written when output files are set.
    pub fn run(&mut self) -> LinSysResult<DVector<f64>> {
        info!("solving with method '{}'", self.method);
        let (inputs, x) = self.solver()?;
        self.calc_statistics();
        self.write_reports(&inputs, &x)?;
        self.result = Some(x.clone());
        Ok(x)
    }

    /// wrapper around `run` that installs the logger first
    pub fn solve(&mut self) -> LinSysResult<DVector<f64>> {
        let level = parse_log_level(self.loglevel.as_deref().unwrap_or("info"))?;
        let log_file = match &self.log_file {
            None => None,
            Some(Some(path)) => Some(path.clone()),
            Some(None) => Some(PathBuf::from(default_log_file_name())),
        };
        init_logger(level, log_file.as_deref())?;
        let res = self.run();
        info!(" \n \n Program ended");
        res
    }

    pub fn get_result(&self) -> Option<DVector<f64>> {
        self.result.clone()
    }
}

fn first_value<'a>(doc: &'a DocumentMap, section: &str, key: &str) -> Option<&'a Value> {
    doc.get(section)?.get(key)?.as_ref()?.first()
}

fn float_value(doc: &DocumentMap, section: &str, key: &str) -> LinSysResult<Option<f64>> {
    first_value(doc, section, key)
        .map(|v| {
            v.as_float().ok_or_else(|| {
                LinSysError::Config(format!("{}.{} must be a number, got '{}'", section, key, v))
            })
        })
        .transpose()
}

fn usize_value(doc: &DocumentMap, section: &str, key: &str) -> LinSysResult<Option<usize>> {
    first_value(doc, section, key)
        .map(|v| {
            v.as_usize().ok_or_else(|| {
                LinSysError::Config(format!(
                    "{}.{} must be a non-negative integer, got '{}'",
                    section, key, v
                ))
            })
        })
        .transpose()
}

fn path_value(doc: &DocumentMap, section: &str, key: &str) -> Option<PathBuf> {
    first_value(doc, section, key).map(|v| PathBuf::from(v.to_string()))
}
