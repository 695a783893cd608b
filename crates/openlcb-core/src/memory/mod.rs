//! Memory configuration service.
//!
//! Operations ride on the datagram service: a request datagram is acked by
//! the node, which then sends its reply in a datagram of its own. The
//! service correlates that reply with the active operation by space and
//! address, accumulates read chunks at their offsets and moves on to the
//! next chunk only after the previous one finished.
//!
//! Outcomes:
//! - a rejected datagram or a failure reply ends the operation with
//!   [`MemoryError::Rejected`];
//! - exhausted datagram retries or a missing reply end it with
//!   [`MemoryError::Timeout`];
//! - [`OperationHandle::cancel`] ends it with [`MemoryError::Cancelled`]
//!   unless a real outcome got there first.
//!
//! A short read chunk is the node's end-of-data signal and completes the
//! read successfully.

pub mod error;
pub mod operation;
pub mod service;

pub use error::{MemoryError, WriteFailure};
pub use operation::{ReadData, ReadHandler, SpaceInfoHandler, WriteHandler};
pub use service::{MemoryConfigService, OperationHandle};

use crate::identity::NodeId;

/// Anything that can serve asynchronous reads of a node's memory.
///
/// [`MemoryConfigService`] is the network implementation; callers can
/// provide their own, for example to read from a cached copy.
pub trait MemoryReader: Send + Sync {
    fn read(&self, peer: NodeId, space: u8, address: u32, length: usize, handler: ReadHandler);
}

impl MemoryReader for MemoryConfigService {
    fn read(&self, peer: NodeId, space: u8, address: u32, length: usize, handler: ReadHandler) {
        self.request_read(peer, space, address, length, handler);
    }
}
