use crate::distributed::communicator::CommError;

/// Rows owned by one rank under the row-cyclic distribution: row i lives on rank i mod nranks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPartition {
    pub rank: usize,
    pub nranks: usize,
    pub global_rows: usize,
    /// global indices of the owned rows, increasing
    pub rows: Vec<usize>,
}

impl RowPartition {
    pub fn new(rank: usize, nranks: usize, global_rows: usize) -> Result<Self, CommError> {
        if nranks < 1 {
            return Err(CommError::WorldTooSmall {
                required: 1,
                actual: nranks,
            });
        }
        if rank >= nranks {
            return Err(CommError::InvalidRank { rank, size: nranks });
        }
        Ok(RowPartition {
            rank,
            nranks,
            global_rows,
            rows: (rank..global_rows).step_by(nranks).collect(),
        })
    }

    pub fn owner(row: usize, nranks: usize) -> usize {
        row % nranks
    }

    pub fn local_rows(&self) -> usize {
        self.rows.len()
    }
}

/// partitions of all ranks, in rank order
pub fn decompose_rows(global_rows: usize, nranks: usize) -> Result<Vec<RowPartition>, CommError> {
    (0..nranks.max(1))
        .map(|rank| RowPartition::new(rank, nranks, global_rows))
        .collect()
}
