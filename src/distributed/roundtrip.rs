use crate::distributed::communicator::{CommError, Payload, World};
use crate::somelinalg::linsys_error::LinSysResult;
use log::info;

pub const FORWARD_TAG: usize = 9;
pub const RETURN_TAG: usize = 10;

/// what each side saw during the round trip
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTripReport {
    /// vector as received by rank 1
    pub received: Vec<f64>,
    /// doubled vector as received back by rank 0
    pub returned: Vec<f64>,
}

/// Rank 0 sends `vector` to rank 1, rank 1 doubles every element and sends it back.
/// Ranks above 1 take no part.
pub fn vector_round_trip(vector: &[f64], world_size: usize) -> LinSysResult<RoundTripReport> {
    if world_size < 2 {
        return Err(CommError::WorldTooSmall {
            required: 2,
            actual: world_size,
        }
        .into());
    }
    let results = World::run(world_size, |mut comm| match comm.rank() {
        0 => {
            comm.send(1, FORWARD_TAG, Payload::Values(vector.to_vec()))?;
            let returned = comm.recv(1, RETURN_TAG)?.into_values()?;
            info!("rank 0 received {} doubled values", returned.len());
            Ok(Some(returned))
        }
        1 => {
            let received = comm.recv(0, FORWARD_TAG)?.into_values()?;
            info!("rank 1 received {} values", received.len());
            let doubled: Vec<f64> = received.iter().map(|v| 2.0 * v).collect();
            comm.send(0, RETURN_TAG, Payload::Values(doubled))?;
            Ok(Some(received))
        }
        _ => Ok(None),
    })?;
    let mut ranks = results.into_iter();
    match (ranks.next().flatten(), ranks.next().flatten()) {
        (Some(returned), Some(received)) => Ok(RoundTripReport { received, returned }),
        _ => Err(CommError::UnexpectedPayload {
            expected: "round trip results of ranks 0 and 1",
        }
        .into()),
    }
}
