use thiserror::Error;

/// Errors returned while decoding memory configuration datagrams.
///
/// # Examples
/// ```
/// use openlcb_core::protocols::memconfig::MemConfigError;
///
/// let err = MemConfigError::UnknownCommand { command: 0xC0 };
/// assert!(err.to_string().contains("unknown memory configuration command"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemConfigError {
    #[error("payload too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("not a memory configuration datagram: protocol 0x{protocol:02X}")]
    NotMemoryConfig { protocol: u8 },
    #[error("unknown memory configuration command 0x{command:02X}")]
    UnknownCommand { command: u8 },
    #[error("invalid transfer length: {length}")]
    InvalidLength { length: usize },
}
