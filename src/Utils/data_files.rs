//! Readers for the plain-text data files: one row of whitespace separated numbers per line,
//! blank lines ignored. The dimension of a square matrix is the number of non-blank lines.
use crate::somelinalg::linsys_error::{LinSysError, LinSysResult};
use crate::somelinalg::matrix_storage::{BandedStorage, MatrixStorage, SymmetricPacked};
use log::info;
use nalgebra::{DMatrix, DVector};
use nom::{
    IResult, Parser,
    character::complete::{space0, space1},
    multi::separated_list0,
    number::complete::double,
    sequence::delimited,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

fn open(path: &Path) -> LinSysResult<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(LinSysError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(LinSysError::Io(e)),
    }
}

/// Parses the numbers of a single line
fn parse_number_row(input: &str) -> IResult<&str, Vec<f64>> {
    let mut parser = delimited(space0, separated_list0(space1, double), space0);
    parser.parse(input)
}

/// numbers of one line, or the first token that is not a number
fn parse_line(line: &str) -> Result<Vec<f64>, String> {
    match parse_number_row(line) {
        Ok((rest, values)) if rest.is_empty() => Ok(values),
        Ok((rest, _)) => Err(rest.split_whitespace().next().unwrap_or(rest).to_string()),
        Err(_) => Err(line.split_whitespace().next().unwrap_or(line).to_string()),
    }
}

/// Calls `f(row, values)` for every non-blank line; `row` counts non-blank lines from 0.
fn for_each_row<F>(path: &Path, mut f: F) -> LinSysResult<()>
where
    F: FnMut(usize, Vec<f64>) -> LinSysResult<()>,
{
    let reader = open(path)?;
    let mut row = 0;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let values = parse_line(&line).map_err(|token| {
            LinSysError::MalformedInput(format!(
                "{}:{}: '{}' is not a number",
                path.display(),
                line_no + 1,
                token
            ))
        })?;
        f(row, values)?;
        row += 1;
    }
    Ok(())
}

fn row_length_error(path: &Path, row: usize, expected: usize, got: usize) -> LinSysError {
    LinSysError::MalformedInput(format!(
        "{}: row {} holds {} values, expected {}",
        path.display(),
        row + 1,
        got,
        expected
    ))
}

/// number of non-blank lines
pub fn count_data_lines(path: &Path) -> LinSysResult<usize> {
    let reader = open(path)?;
    let mut n = 0;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            n += 1;
        }
    }
    Ok(n)
}

/// all rows of the file
pub fn read_rows(path: &Path) -> LinSysResult<Vec<Vec<f64>>> {
    let mut rows = Vec::new();
    for_each_row(path, |_, values| {
        rows.push(values);
        Ok(())
    })?;
    Ok(rows)
}

fn rows_to_matrix(path: &Path, rows: &[Vec<f64>], ncols: usize) -> LinSysResult<DMatrix<f64>> {
    for (i, row) in rows.iter().enumerate() {
        if row.len() != ncols {
            return Err(row_length_error(path, i, ncols, row.len()));
        }
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

/// N x N matrix, N = number of non-blank lines
pub fn read_matrix_file(path: &Path) -> LinSysResult<DMatrix<f64>> {
    let rows = read_rows(path)?;
    if rows.is_empty() {
        return Err(LinSysError::MalformedInput(format!(
            "{}: matrix file is empty",
            path.display()
        )));
    }
    let n = rows.len();
    info!("matrix file {}: {} x {}", path.display(), n, n);
    rows_to_matrix(path, &rows, n)
}

/// N x M matrix, M = number of values on the first row
pub fn read_rectangular_matrix_file(path: &Path) -> LinSysResult<DMatrix<f64>> {
    let rows = read_rows(path)?;
    let Some(first) = rows.first() else {
        return Err(LinSysError::MalformedInput(format!(
            "{}: matrix file is empty",
            path.display()
        )));
    };
    let ncols = first.len();
    info!("matrix file {}: {} x {}", path.display(), rows.len(), ncols);
    rows_to_matrix(path, &rows, ncols)
}

/// All values of the file in reading order. With `expected` set, the count must match.
pub fn read_vector_file(path: &Path, expected: Option<usize>) -> LinSysResult<DVector<f64>> {
    let values: Vec<f64> = read_rows(path)?.into_iter().flatten().collect();
    if let Some(n) = expected {
        if values.len() != n {
            return Err(LinSysError::MalformedInput(format!(
                "{}: expected {} vector elements, found {}",
                path.display(),
                n,
                values.len()
            )));
        }
    }
    info!("vector file {}: {} elements", path.display(), values.len());
    Ok(DVector::from_vec(values))
}

/// One file holding N matrix rows followed by N lines of the right-hand side.
/// The line count is checked before anything is allocated.
pub fn read_combined_system_file(path: &Path) -> LinSysResult<(DMatrix<f64>, DVector<f64>)> {
    let lines = count_data_lines(path)?;
    if lines == 0 {
        return Err(LinSysError::MalformedInput(format!(
            "{}: file is empty",
            path.display()
        )));
    }
    if lines % 2 != 0 {
        return Err(LinSysError::MalformedInput(format!(
            "{}: line count {} must be even (N matrix rows + N vector lines)",
            path.display(),
            lines
        )));
    }
    let n = lines / 2;
    let mut a = DMatrix::zeros(n, n);
    let mut b = Vec::with_capacity(n);
    for_each_row(path, |row, values| {
        if row < n {
            if values.len() != n {
                return Err(row_length_error(path, row, n, values.len()));
            }
            for (j, v) in values.into_iter().enumerate() {
                a[(row, j)] = v;
            }
        } else {
            b.extend(values);
        }
        Ok(())
    })?;
    if b.len() != n {
        return Err(LinSysError::MalformedInput(format!(
            "{}: right-hand side has {} elements, expected {}",
            path.display(),
            b.len(),
            n
        )));
    }
    Ok((a, DVector::from_vec(b)))
}

/// Packed input format: line i lists a(i,i), a(i,i+1), ..., a(i,N-1).
pub fn read_upper_triangle_file(path: &Path) -> LinSysResult<SymmetricPacked> {
    let rows = read_rows(path)?;
    let n = rows.len();
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n - i {
            return Err(row_length_error(path, i, n - i, row.len()));
        }
    }
    let upper: Vec<f64> = rows.into_iter().flatten().collect();
    info!(
        "upper triangle file {}: {} x {}, {} stored elements",
        path.display(),
        n,
        n,
        upper.len()
    );
    SymmetricPacked::from_upper_triangle(n, &upper)
}

fn stream_square_into<S: MatrixStorage>(path: &Path, storage: &mut S) -> LinSysResult<()> {
    let n = storage.dim();
    for_each_row(path, |i, values| {
        if i >= n {
            return Err(LinSysError::MalformedInput(format!(
                "{}: more than {} rows",
                path.display(),
                n
            )));
        }
        if values.len() != n {
            return Err(row_length_error(path, i, n, values.len()));
        }
        for (j, v) in values.into_iter().enumerate() {
            storage.set(i, j, v)?;
        }
        Ok(())
    })
}

/// Full square matrix streamed into packed storage; lower entries are checked against the
/// stored upper ones.
pub fn read_symmetric_packed_file(
    path: &Path,
    symmetry_tolerance: f64,
) -> LinSysResult<SymmetricPacked> {
    let n = count_data_lines(path)?;
    info!("matrix size: {} x {}", n, n);
    let mut packed = SymmetricPacked::allocate(n)?.with_symmetry_tolerance(symmetry_tolerance);
    info!(
        "storage: {} elements (upper triangle only)",
        packed.stored_elements()
    );
    stream_square_into(path, &mut packed)?;
    Ok(packed)
}

/// Two passes over the file: the first finds the bandwidth, the second fills the band.
pub fn read_banded_file(path: &Path, symmetry_tolerance: f64) -> LinSysResult<BandedStorage> {
    let n = count_data_lines(path)?;
    let mut bandwidth = usize::from(n > 0);
    for_each_row(path, |i, values| {
        if values.len() != n {
            return Err(row_length_error(path, i, n, values.len()));
        }
        for (j, v) in values.into_iter().enumerate() {
            if j >= i && v != 0.0 && j - i + 1 > bandwidth {
                bandwidth = j - i + 1;
            }
        }
        Ok(())
    })?;
    info!("matrix size: {} x {}, bandwidth: {}", n, n, bandwidth);
    let mut banded =
        BandedStorage::allocate(n, bandwidth)?.with_symmetry_tolerance(symmetry_tolerance);
    stream_square_into(path, &mut banded)?;
    Ok(banded)
}
