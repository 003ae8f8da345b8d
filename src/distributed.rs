//! message-passing demonstrations: every rank is a thread, ranks talk only through tagged messages
/// point-to-point and collective messaging between ranks of a `World`
pub mod communicator;
/// row-cyclic ownership of matrix rows
pub mod partition;
/// two-rank doubling round trip
pub mod roundtrip;
/// matrix-vector product with rows scattered over the ranks
pub mod row_matvec;
