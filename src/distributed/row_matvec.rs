//! c = A v with the rows of A dealt out row-cyclically. Rank 0 owns A and v; v and the
//! dimensions are broadcast, rows travel with their global index as tag and so do the
//! partial results on the way back.
use crate::distributed::communicator::{Communicator, Payload, RecvRequest, SendRequest, World};
use crate::distributed::partition::RowPartition;
use crate::somelinalg::linsys_error::{LinSysError, LinSysResult};
use log::{debug, info};
use nalgebra::{DMatrix, DVector};

const ROOT: usize = 0;

// everything one rank does; only the root returns the product
fn rank_matvec(
    mut comm: Communicator,
    a: &DMatrix<f64>,
    v: &DVector<f64>,
) -> LinSysResult<Option<DVector<f64>>> {
    let is_root = comm.rank() == ROOT;
    let dims = is_root.then(|| Payload::Dimensions {
        rows: a.nrows(),
        cols: a.ncols(),
    });
    let (rows, cols) = comm.broadcast(ROOT, dims)?.into_dimensions()?;
    let vector = DVector::from_vec(
        comm.broadcast(ROOT, is_root.then(|| Payload::Values(v.as_slice().to_vec())))?
            .into_values()?,
    );
    if vector.len() != cols {
        return Err(LinSysError::DimensionMismatch(format!(
            "rank {} got a vector of {} elements for {} columns",
            comm.rank(),
            vector.len(),
            cols
        )));
    }

    let partition = RowPartition::new(comm.rank(), comm.size(), rows)?;
    debug!("rank {} owns rows {:?}", comm.rank(), partition.rows);

    // scatter: the root keeps its own rows and posts the others without blocking
    let mut row_sends: Vec<SendRequest> = Vec::new();
    let my_rows: Vec<Vec<f64>> = if is_root {
        let mut own = Vec::with_capacity(partition.local_rows());
        for i in 0..rows {
            let row: Vec<f64> = a.row(i).iter().copied().collect();
            let dest = RowPartition::owner(i, comm.size());
            if dest == ROOT {
                own.push(row);
            } else {
                row_sends.push(comm.isend(dest, i, Payload::Values(row)));
            }
        }
        own
    } else {
        let requests = partition
            .rows
            .iter()
            .map(|&i| comm.irecv(ROOT, i))
            .collect::<Result<Vec<RecvRequest>, _>>()?;
        comm.wait_all(requests)?
            .into_iter()
            .map(Payload::into_values)
            .collect::<Result<Vec<_>, _>>()?
    };

    let partial: Vec<f64> = my_rows
        .iter()
        .map(|row| DVector::from_column_slice(row).dot(&vector))
        .collect();

    let result = if is_root {
        let mut c = DVector::zeros(rows);
        for (&i, value) in partition.rows.iter().zip(&partial) {
            c[i] = *value;
        }
        let foreign: Vec<usize> = (0..rows)
            .filter(|&i| RowPartition::owner(i, comm.size()) != ROOT)
            .collect();
        let requests = foreign
            .iter()
            .map(|&i| comm.irecv(RowPartition::owner(i, comm.size()), i))
            .collect::<Result<Vec<RecvRequest>, _>>()?;
        for (&i, payload) in foreign.iter().zip(comm.wait_all(requests)?) {
            c[i] = single_value(payload)?;
        }
        Some(c)
    } else {
        let result_sends: Vec<SendRequest> = partition
            .rows
            .iter()
            .zip(&partial)
            .map(|(&i, &value)| comm.isend(ROOT, i, Payload::Values(vec![value])))
            .collect();
        SendRequest::wait_all(result_sends)?;
        None
    };
    SendRequest::wait_all(row_sends)?;
    Ok(result)
}

fn single_value(payload: Payload) -> LinSysResult<f64> {
    match payload.into_values()?.as_slice() {
        [value] => Ok(*value),
        other => Err(LinSysError::DimensionMismatch(format!(
            "partial result holds {} values instead of 1",
            other.len()
        ))),
    }
}

/// Row-cyclic parallel product of an N x M matrix with a vector of length M on `world_size`
/// ranks. Dimensions are checked before any rank is started.
pub fn distributed_matvec(
    world_size: usize,
    a: &DMatrix<f64>,
    v: &DVector<f64>,
) -> LinSysResult<DVector<f64>> {
    if a.ncols() != v.len() {
        return Err(LinSysError::DimensionMismatch(format!(
            "matrix has {} columns, vector has {} elements",
            a.ncols(),
            v.len()
        )));
    }
    info!(
        "distributed matvec: {} x {} matrix on {} ranks",
        a.nrows(),
        a.ncols(),
        world_size
    );
    let results = World::run(world_size, |comm| rank_matvec(comm, a, v))?;
    results
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| LinSysError::DimensionMismatch("rank 0 returned no product".to_string()))
}
