pub const PROTOCOL_ID: u8 = 0x20;

pub const PROTOCOL_OFFSET: usize = 0;
pub const COMMAND_OFFSET: usize = 1;
pub const ADDRESS_RANGE: std::ops::Range<usize> = 2..6;
pub const SPACE_OFFSET: usize = 6;
pub const HEADER_LEN_SHORT: usize = 6;
pub const HEADER_LEN_WITH_SPACE: usize = 7;

pub const SPACE_BITS_MASK: u8 = 0x03;
pub const COMMAND_MASK: u8 = 0xFC;

pub const CMD_WRITE: u8 = 0x00;
pub const CMD_WRITE_REPLY_OK: u8 = 0x10;
pub const CMD_WRITE_REPLY_FAILED: u8 = 0x18;
pub const CMD_READ: u8 = 0x40;
pub const CMD_READ_REPLY_OK: u8 = 0x50;
pub const CMD_READ_REPLY_FAILED: u8 = 0x58;
pub const CMD_GET_SPACE_INFO: u8 = 0x84;
pub const CMD_SPACE_INFO_NOT_PRESENT: u8 = 0x86;
pub const CMD_SPACE_INFO_PRESENT: u8 = 0x87;

pub const READ_COUNT_LEN: usize = 1;
pub const ERROR_CODE_LEN: usize = 2;
pub const MAX_TRANSFER_LEN: usize = 64;

pub const SPACE_INFO_SPACE_OFFSET: usize = 2;
pub const SPACE_INFO_HIGHEST_RANGE: std::ops::Range<usize> = 3..7;
pub const SPACE_INFO_FLAGS_OFFSET: usize = 7;
pub const SPACE_INFO_LOWEST_RANGE: std::ops::Range<usize> = 8..12;
pub const SPACE_INFO_MIN_LEN: usize = 3;
pub const SPACE_INFO_FLAG_READ_ONLY: u8 = 0x01;
pub const SPACE_INFO_FLAG_LOW_ADDRESS: u8 = 0x02;
