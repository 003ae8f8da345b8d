//! A tiny in-process stand-in for a message-passing runtime.
//!
//! `World::run` starts one thread per rank and hands each of them a `Communicator`. Messages
//! travel over `std::sync::mpsc` channels and are matched on (source, tag); messages that
//! arrive before they are asked for are parked in a per-rank buffer, so gathering depends on
//! tags and not on arrival order. Between one pair of ranks, messages with the same tag are
//! received in the order they were sent.
//!
//! Non-blocking calls return request handles which must be waited on. There are no timeouts:
//! a receive that is never matched blocks forever.
use crate::somelinalg::linsys_error::{LinSysError, LinSysResult};
use log::{debug, error, info};
use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

pub type Tag = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum CommError {
    /// every peer that could still send to `rank` has gone away
    Disconnected { rank: usize },
    RankPanicked(usize),
    InvalidRank { rank: usize, size: usize },
    UnexpectedPayload { expected: &'static str },
    WorldTooSmall { required: usize, actual: usize },
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommError::Disconnected { rank } => {
                write!(f, "rank {} lost the connection to its peers", rank)
            }
            CommError::RankPanicked(rank) => write!(f, "rank {} panicked", rank),
            CommError::InvalidRank { rank, size } => {
                write!(f, "rank {} does not exist in a world of size {}", rank, size)
            }
            CommError::UnexpectedPayload { expected } => {
                write!(f, "unexpected message payload, expected {}", expected)
            }
            CommError::WorldTooSmall { required, actual } => write!(
                f,
                "at least {} ranks are required, world size is {}",
                required, actual
            ),
        }
    }
}

impl std::error::Error for CommError {}

/// message contents
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Dimensions { rows: usize, cols: usize },
    Values(Vec<f64>),
}

impl Payload {
    pub fn into_values(self) -> Result<Vec<f64>, CommError> {
        match self {
            Payload::Values(values) => Ok(values),
            _ => Err(CommError::UnexpectedPayload { expected: "values" }),
        }
    }

    pub fn into_dimensions(self) -> Result<(usize, usize), CommError> {
        match self {
            Payload::Dimensions { rows, cols } => Ok((rows, cols)),
            _ => Err(CommError::UnexpectedPayload {
                expected: "dimensions",
            }),
        }
    }
}

// collective messages are numbered per call so they never match point-to-point tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    PointToPoint(Tag),
    Broadcast(u64),
}

#[derive(Debug)]
struct Envelope {
    source: usize,
    kind: MessageKind,
    payload: Payload,
}

/// Handle of a non-blocking send. The payload has already been moved into the channel.
#[must_use = "a send request has to be waited on"]
#[derive(Debug)]
pub struct SendRequest {
    outcome: Result<(), CommError>,
}

impl SendRequest {
    pub fn wait(self) -> Result<(), CommError> {
        self.outcome
    }

    pub fn wait_all(requests: Vec<SendRequest>) -> Result<(), CommError> {
        for request in requests {
            request.wait()?;
        }
        Ok(())
    }
}

/// Handle of a non-blocking receive, completed by `Communicator::wait`.
#[must_use = "a receive request has to be waited on"]
#[derive(Debug)]
pub struct RecvRequest {
    source: usize,
    kind: MessageKind,
}

/// endpoint of one rank
#[derive(Debug)]
pub struct Communicator {
    rank: usize,
    size: usize,
    // no sender to itself: self-addressed messages go straight to `pending`
    senders: Vec<Option<Sender<Envelope>>>,
    receiver: Receiver<Envelope>,
    pending: VecDeque<Envelope>,
    broadcast_count: u64,
}

impl Communicator {
    /// fully connected set of endpoints, one per rank
    pub fn create_world(size: usize) -> Vec<Communicator> {
        let (senders, receivers): (Vec<Sender<Envelope>>, Vec<Receiver<Envelope>>) =
            (0..size).map(|_| channel()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| Communicator {
                rank,
                size,
                senders: senders
                    .iter()
                    .enumerate()
                    .map(|(dest, tx)| (dest != rank).then(|| tx.clone()))
                    .collect(),
                receiver,
                pending: VecDeque::new(),
                broadcast_count: 0,
            })
            .collect()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn check_rank(&self, rank: usize) -> Result<(), CommError> {
        if rank >= self.size {
            return Err(CommError::InvalidRank {
                rank,
                size: self.size,
            });
        }
        Ok(())
    }

    fn post(&mut self, dest: usize, kind: MessageKind, payload: Payload) -> Result<(), CommError> {
        self.check_rank(dest)?;
        let envelope = Envelope {
            source: self.rank,
            kind,
            payload,
        };
        match &self.senders[dest] {
            None => {
                self.pending.push_back(envelope);
                Ok(())
            }
            Some(tx) => tx
                .send(envelope)
                .map_err(|_| CommError::Disconnected { rank: dest }),
        }
    }

    fn take(&mut self, source: usize, kind: MessageKind) -> Result<Payload, CommError> {
        self.check_rank(source)?;
        if let Some(pos) = self
            .pending
            .iter()
            .position(|m| m.source == source && m.kind == kind)
        {
            if let Some(envelope) = self.pending.remove(pos) {
                return Ok(envelope.payload);
            }
        }
        loop {
            let envelope = self
                .receiver
                .recv()
                .map_err(|_| CommError::Disconnected { rank: self.rank })?;
            if envelope.source == source && envelope.kind == kind {
                return Ok(envelope.payload);
            }
            self.pending.push_back(envelope);
        }
    }

    /// blocking send
    pub fn send(&mut self, dest: usize, tag: Tag, payload: Payload) -> Result<(), CommError> {
        debug!("rank {} -> rank {} (tag {})", self.rank, dest, tag);
        self.post(dest, MessageKind::PointToPoint(tag), payload)
    }

    /// blocking receive of the first message from `source` carrying `tag`
    pub fn recv(&mut self, source: usize, tag: Tag) -> Result<Payload, CommError> {
        let payload = self.take(source, MessageKind::PointToPoint(tag))?;
        debug!("rank {} <- rank {} (tag {})", self.rank, source, tag);
        Ok(payload)
    }

    pub fn isend(&mut self, dest: usize, tag: Tag, payload: Payload) -> SendRequest {
        SendRequest {
            outcome: self.send(dest, tag, payload),
        }
    }

    pub fn irecv(&self, source: usize, tag: Tag) -> Result<RecvRequest, CommError> {
        self.check_rank(source)?;
        Ok(RecvRequest {
            source,
            kind: MessageKind::PointToPoint(tag),
        })
    }

    pub fn wait(&mut self, request: RecvRequest) -> Result<Payload, CommError> {
        self.take(request.source, request.kind)
    }

    /// completes the requests, results in request order
    pub fn wait_all(&mut self, requests: Vec<RecvRequest>) -> Result<Vec<Payload>, CommError> {
        requests.into_iter().map(|r| self.wait(r)).collect()
    }

    /// Every rank must call `broadcast` the same number of times in the same order. The root
    /// passes `Some(payload)`, the other ranks pass `None` and get the root's payload back.
    pub fn broadcast(&mut self, root: usize, payload: Option<Payload>) -> Result<Payload, CommError> {
        self.check_rank(root)?;
        let kind = MessageKind::Broadcast(self.broadcast_count);
        self.broadcast_count += 1;
        if self.rank == root {
            let payload = payload.ok_or(CommError::UnexpectedPayload {
                expected: "broadcast payload at the root",
            })?;
            for dest in (0..self.size).filter(|&d| d != root) {
                self.post(dest, kind, payload.clone())?;
            }
            Ok(payload)
        } else {
            self.take(root, kind)
        }
    }
}

/// a group of ranks running the same closure
pub struct World;

impl World {
    /// Runs `rank_main` on `size` threads and returns their results in rank order.
    /// The first failing rank (lowest rank number) decides the error.
    pub fn run<R, F>(size: usize, rank_main: F) -> LinSysResult<Vec<R>>
    where
        R: Send,
        F: Fn(Communicator) -> LinSysResult<R> + Sync,
    {
        if size == 0 {
            return Err(CommError::WorldTooSmall {
                required: 1,
                actual: 0,
            }
            .into());
        }
        info!("starting world of {} ranks", size);
        let rank_main = &rank_main;
        let outcomes: Vec<LinSysResult<R>> = thread::scope(|s| {
            let handles: Vec<_> = Communicator::create_world(size)
                .into_iter()
                .map(|comm| s.spawn(move || rank_main(comm)))
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| match handle.join() {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!("rank {} panicked", rank);
                        Err(LinSysError::Comm(CommError::RankPanicked(rank)))
                    }
                })
                .collect()
        });
        outcomes.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_matching_ignores_arrival_order() {
        let results = World::run(2, |mut comm| {
            if comm.rank() == 0 {
                comm.send(1, 1, Payload::Values(vec![1.0]))?;
                comm.send(1, 2, Payload::Values(vec![2.0]))?;
                comm.send(1, 1, Payload::Values(vec![3.0]))?;
                Ok(vec![])
            } else {
                let second = comm.recv(0, 2)?.into_values()?;
                let first = comm.recv(0, 1)?.into_values()?;
                let third = comm.recv(0, 1)?.into_values()?;
                Ok([first, second, third].concat())
            }
        })
        .unwrap();
        assert_eq!(results[1], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_self_send_and_broadcast() {
        let results = World::run(3, |mut comm| {
            let payload = (comm.rank() == 0).then(|| Payload::Dimensions { rows: 4, cols: 2 });
            let dims = comm.broadcast(0, payload)?.into_dimensions()?;
            let me = comm.rank();
            let request = comm.isend(me, 7, Payload::Values(vec![me as f64]));
            request.wait()?;
            let recv = comm.irecv(me, 7)?;
            let own = comm.wait(recv)?.into_values()?;
            Ok((dims, own[0]))
        })
        .unwrap();
        for (rank, (dims, own)) in results.into_iter().enumerate() {
            assert_eq!(dims, (4, 2));
            assert_eq!(own, rank as f64);
        }
    }

    #[test]
    fn test_invalid_rank() {
        let res = World::run(1, |mut comm| {
            comm.send(3, 0, Payload::Values(vec![]))?;
            Ok(())
        });
        assert!(matches!(
            res,
            Err(LinSysError::Comm(CommError::InvalidRank { rank: 3, size: 1 }))
        ));
    }

    #[test]
    fn test_unexpected_payload() {
        let res = World::run(1, |mut comm| {
            let dims = comm.broadcast(0, Some(Payload::Values(vec![1.0])))?;
            dims.into_dimensions()?;
            Ok(())
        });
        assert!(matches!(
            res,
            Err(LinSysError::Comm(CommError::UnexpectedPayload { .. }))
        ));
    }

    #[test]
    fn test_panicking_rank_is_reported() {
        let res = World::run(2, |mut comm| {
            if comm.rank() == 1 {
                panic!("rank 1 fails on purpose");
            }
            // rank 1 was the only other sender, so this fails instead of blocking
            comm.recv(1, 0)?;
            Ok(())
        });
        assert!(matches!(
            res,
            Err(LinSysError::Comm(CommError::Disconnected { rank: 0 }))
        ));
    }

    #[test]
    fn test_empty_world() {
        assert!(matches!(
            World::run(0, |_comm| Ok(())),
            Err(LinSysError::Comm(CommError::WorldTooSmall { .. }))
        ));
    }
}
