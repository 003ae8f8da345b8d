use crate::somelinalg::linsys_error::{LinSysError, LinSysResult};
use chrono::Local;
use csv::Writer;
use log::info;
use nalgebra::{DMatrix, DVector};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// "debug", "info", "warn", "error" or "off"
pub fn parse_log_level(level: &str) -> LinSysResult<LevelFilter> {
    match level.trim().to_lowercase().as_str() {
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        "off" => Ok(LevelFilter::Off),
        other => Err(LinSysError::Config(format!(
            "loglevel must be debug, info, warn, error or off, got '{}'",
            other
        ))),
    }
}

/// log_YYYY-MM-DD_HH-MM-SS.txt
pub fn default_log_file_name() -> String {
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("log_{}.txt", date_and_time)
}

/// Terminal logger plus an optional file logger. Installing a second logger in the same
/// process is silently ignored.
pub fn init_logger(level: LevelFilter, log_file: Option<&Path>) -> LinSysResult<()> {
    if level == LevelFilter::Off {
        return Ok(());
    }
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        loggers.push(WriteLogger::new(level, Config::default(), File::create(path)?));
    }
    let _ = CombinedLogger::init(loggers);
    Ok(())
}

/// `name[index] = value` lines, indices starting at `first_index`
pub fn solution_lines(name: &str, values: &DVector<f64>, first_index: usize) -> Vec<String> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| format!("{}[{}] = {:.10e}", name, i + first_index, v))
        .collect()
}

/// Text report: every input block is echoed row by row, then the solution lines follow.
pub fn save_solution_to_file(
    path: &Path,
    inputs: &[(String, DMatrix<f64>)],
    name: &str,
    solution: &DVector<f64>,
    first_index: usize,
) -> LinSysResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    for (title, block) in inputs {
        writeln!(file, "{} ({} x {}):", title, block.nrows(), block.ncols())?;
        for row in block.row_iter() {
            let row_data: Vec<String> = row.iter().map(|v| format!("{:>10.3e}", v)).collect();
            writeln!(file, "{}", row_data.join(" "))?;
        }
        writeln!(file)?;
    }
    for line in solution_lines(name, solution, first_index) {
        writeln!(file, "{}", line)?;
    }
    file.flush()?;
    info!("result saved to {}", path.display());
    Ok(())
}

/// `index,<name>` header followed by one row per element, full precision
pub fn save_solution_to_csv(
    path: &Path,
    name: &str,
    solution: &DVector<f64>,
    first_index: usize,
) -> LinSysResult<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["index", name])?;
    for (i, v) in solution.iter().enumerate() {
        writer.write_record(&[(i + first_index).to_string(), v.to_string()])?;
    }
    writer.flush()?;
    info!("result saved to {}", path.display());
    Ok(())
}
