use std::time::Duration;

/// `DatagramReceivedOk` flag: the receiver will answer with its own datagram.
pub const REPLY_PENDING: u8 = 0x80;
/// Low nibble of the ack flags: reply expected within `2^N` seconds.
pub const REPLY_TIMEOUT_MASK: u8 = 0x0F;

/// Rejection reason codes carried by `DatagramRejected`.
pub mod reject {
    pub const PERMANENT_ERROR: u16 = 0x1000;
    pub const SOURCE_NOT_PERMITTED: u16 = 0x1020;
    pub const NOT_IMPLEMENTED: u16 = 0x1040;
    pub const SUBCOMMAND_UNKNOWN: u16 = 0x1041;
    pub const DATAGRAM_TYPE_UNKNOWN: u16 = 0x1042;
    pub const INVALID_ARGUMENTS: u16 = 0x1080;
    pub const RESEND_OK: u16 = 0x2000;
    pub const TIMEOUT: u16 = 0x2010;
    pub const BUFFER_UNAVAILABLE: u16 = 0x2020;
    pub const OUT_OF_ORDER: u16 = 0x2040;
    pub const TRANSFER_ERROR: u16 = 0x2080;
}

/// True when the sender may resend the same datagram later.
pub const fn is_temporary(code: u16) -> bool {
    code & reject::RESEND_OK != 0
}

pub const fn is_permanent(code: u16) -> bool {
    code & reject::PERMANENT_ERROR != 0
}

pub fn describe(code: u16) -> &'static str {
    match code {
        reject::PERMANENT_ERROR => "permanent error",
        reject::SOURCE_NOT_PERMITTED => "source not permitted",
        reject::NOT_IMPLEMENTED => "not implemented",
        reject::SUBCOMMAND_UNKNOWN => "subcommand unknown",
        reject::DATAGRAM_TYPE_UNKNOWN => "datagram type unknown",
        reject::INVALID_ARGUMENTS => "invalid arguments",
        reject::RESEND_OK => "resend ok",
        reject::TIMEOUT => "timeout",
        reject::BUFFER_UNAVAILABLE => "buffer unavailable",
        reject::OUT_OF_ORDER => "out of order",
        reject::TRANSFER_ERROR => "transfer error",
        _ if is_temporary(code) => "temporary error",
        _ if is_permanent(code) => "permanent error",
        _ => "unknown error",
    }
}

/// Positive acknowledgment of a sent datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramAck {
    pub flags: u8,
}

impl DatagramAck {
    pub fn reply_pending(&self) -> bool {
        self.flags & REPLY_PENDING != 0
    }

    /// Reply window announced by the receiver, `None` when unspecified.
    pub fn reply_timeout(&self) -> Option<Duration> {
        match self.flags & REPLY_TIMEOUT_MASK {
            0 => None,
            exponent => Some(Duration::from_secs(1u64 << exponent)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{DatagramAck, describe, is_permanent, is_temporary, reject};

    #[test]
    fn classifies_codes() {
        assert!(is_temporary(reject::BUFFER_UNAVAILABLE));
        assert!(!is_permanent(reject::BUFFER_UNAVAILABLE));
        assert!(is_permanent(reject::SUBCOMMAND_UNKNOWN));
        assert!(!is_temporary(reject::SUBCOMMAND_UNKNOWN));
        assert_eq!(describe(0x1081), "permanent error");
        assert_eq!(describe(reject::OUT_OF_ORDER), "out of order");
    }

    #[test]
    fn ack_flags() {
        let ack = DatagramAck { flags: 0x83 };
        assert!(ack.reply_pending());
        assert_eq!(ack.reply_timeout(), Some(Duration::from_secs(8)));
        assert_eq!(DatagramAck { flags: 0 }.reply_timeout(), None);
    }
}
