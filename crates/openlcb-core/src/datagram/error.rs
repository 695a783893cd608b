use thiserror::Error;

use super::codes;
use crate::protocols::message::MessageError;

/// Terminal outcome of a failed datagram send.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatagramError {
    #[error("datagram rejected with code 0x{code:04X}")]
    Rejected { code: u16 },
    #[error("no acknowledgment after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error(transparent)]
    Malformed(#[from] MessageError),
}

/// Link-level segment reassembly failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("datagram payload is empty")]
    Empty,
    #[error("datagram payload of {length} bytes exceeds 72")]
    TooLong { length: usize },
    #[error("segment carries {length} bytes, expected 1..=8")]
    BadSegment { length: usize },
    #[error("segment received out of order")]
    OutOfOrder,
}

impl SegmentError {
    /// Code sent back to the peer when reassembly fails.
    pub fn reject_code(&self) -> u16 {
        match self {
            SegmentError::OutOfOrder => codes::reject::OUT_OF_ORDER,
            SegmentError::Empty
            | SegmentError::TooLong { .. }
            | SegmentError::BadSegment { .. } => codes::reject::INVALID_ARGUMENTS,
        }
    }
}
