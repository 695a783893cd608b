pub const MTI_ADDRESS_PRESENT: u16 = 0x0008;
pub const MTI_EVENT_PRESENT: u16 = 0x0004;

pub const NODE_ID_RANGE: std::ops::Range<usize> = 0..6;
pub const EVENT_ID_RANGE: std::ops::Range<usize> = 0..8;

pub const ERROR_CODE_RANGE: std::ops::Range<usize> = 0..2;
pub const REJECTED_MTI_RANGE: std::ops::Range<usize> = 2..4;
pub const ERROR_CODE_ONLY_LEN: usize = 2;
pub const ERROR_WITH_MTI_LEN: usize = 4;

pub const PROTOCOL_FLAGS_MIN_LEN: usize = 3;
pub const PROTOCOL_FLAGS_LEN: usize = 6;

pub const DATAGRAM_MIN_LEN: usize = 1;
pub const DATAGRAM_MAX_LEN: usize = 72;
pub const DATAGRAM_OK_FLAGS_OFFSET: usize = 0;
pub const DATAGRAM_OK_MAX_LEN: usize = 1;
pub const DATAGRAM_REJECTED_CODE_RANGE: std::ops::Range<usize> = 0..2;
pub const DATAGRAM_REJECTED_MAX_LEN: usize = 4;

pub const STREAM_MAX_BUFFER_RANGE: std::ops::Range<usize> = 0..2;
pub const STREAM_FLAGS_RANGE: std::ops::Range<usize> = 2..4;
pub const STREAM_SOURCE_ID_OFFSET: usize = 4;
pub const STREAM_DEST_ID_OFFSET: usize = 5;
pub const STREAM_INITIATE_LEN: usize = 6;

pub const STREAM_IDS_SOURCE_OFFSET: usize = 0;
pub const STREAM_IDS_DEST_OFFSET: usize = 1;
pub const STREAM_IDS_LEN: usize = 2;

pub const STREAM_SEND_DEST_ID_OFFSET: usize = 0;
pub const STREAM_SEND_DATA_OFFSET: usize = 1;
