use thiserror::Error;

use crate::datagram::DatagramError;
use crate::protocols::memconfig::MemConfigError;

/// Terminal failure of a memory configuration operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The node rejected the datagram or answered with a failure reply.
    #[error("rejected by node with code 0x{code:04X}")]
    Rejected { code: u16 },
    #[error("no answer from node")]
    Timeout,
    #[error("operation cancelled")]
    Cancelled,
    #[error("malformed memory configuration payload: {0}")]
    Malformed(#[from] MemConfigError),
    #[error("protocol error: {reason}")]
    Protocol { reason: String },
}

impl From<DatagramError> for MemoryError {
    fn from(err: DatagramError) -> Self {
        match err {
            DatagramError::Rejected { code } => MemoryError::Rejected { code },
            DatagramError::Timeout { .. } => MemoryError::Timeout,
            DatagramError::Malformed(err) => MemoryError::Protocol {
                reason: err.to_string(),
            },
        }
    }
}

/// A write that stopped part way.
///
/// Chunks before `written` reached the node; nothing at or after it did.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("write stopped after {written} bytes: {error}")]
pub struct WriteFailure {
    pub written: usize,
    #[source]
    pub error: MemoryError,
}

#[cfg(test)]
mod tests {
    use super::{MemoryError, WriteFailure};
    use crate::datagram::DatagramError;

    #[test]
    fn datagram_failures_map_to_kinds() {
        assert_eq!(
            MemoryError::from(DatagramError::Rejected { code: 0x1041 }),
            MemoryError::Rejected { code: 0x1041 }
        );
        assert_eq!(
            MemoryError::from(DatagramError::Timeout { attempts: 3 }),
            MemoryError::Timeout
        );
    }

    #[test]
    fn write_failure_reports_offset() {
        let failure = WriteFailure {
            written: 128,
            error: MemoryError::Timeout,
        };
        assert_eq!(failure.to_string(), "write stopped after 128 bytes: no answer from node");
    }
}
