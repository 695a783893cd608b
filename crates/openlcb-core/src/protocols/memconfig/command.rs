use super::error::MemConfigError;
use super::layout;

/// Well-known address spaces.
pub mod space {
    pub const CDI: u8 = 0xFF;
    pub const ALL_MEMORY: u8 = 0xFE;
    pub const CONFIGURATION: u8 = 0xFD;
    pub const ACDI_MANUFACTURER: u8 = 0xFC;
    pub const ACDI_USER: u8 = 0xFB;
    pub const TRACTION_FDI: u8 = 0xFA;
    pub const FUNCTION_CONFIGURATION: u8 = 0xF9;
    pub const FIRMWARE: u8 = 0xEF;
}

/// Requests sent to a remote node's memory configuration protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McsRequest {
    Read { space: u8, address: u32, count: u8 },
    Write { space: u8, address: u32, data: Vec<u8> },
    GetSpaceInfo { space: u8 },
}

/// Replies a node sends back in its own datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McsReply {
    ReadOk { space: u8, address: u32, data: Vec<u8> },
    ReadFailed { space: u8, address: u32, code: u16 },
    WriteOk { space: u8, address: u32 },
    WriteFailed { space: u8, address: u32, code: u16 },
    SpaceInfo(SpaceInfo),
}

impl McsReply {
    /// Space and address this reply answers, when it carries one.
    pub fn target(&self) -> Option<(u8, u32)> {
        match self {
            McsReply::ReadOk { space, address, .. }
            | McsReply::ReadFailed { space, address, .. }
            | McsReply::WriteOk { space, address }
            | McsReply::WriteFailed { space, address, .. } => Some((*space, *address)),
            McsReply::SpaceInfo(_) => None,
        }
    }
}

/// Address space information reported by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceInfo {
    pub space: u8,
    pub present: bool,
    pub highest_address: u32,
    pub lowest_address: u32,
    pub read_only: bool,
}

impl SpaceInfo {
    /// Size in bytes implied by the reported address range.
    pub fn size(&self) -> Option<u64> {
        if !self.present || self.highest_address < self.lowest_address {
            return None;
        }
        Some(self.highest_address as u64 - self.lowest_address as u64 + 1)
    }
}

fn space_bits(space: u8) -> u8 {
    match space {
        space::CONFIGURATION => 0x01,
        space::ALL_MEMORY => 0x02,
        space::CDI => 0x03,
        _ => 0x00,
    }
}

fn encode_header(command: u8, space: u8, address: u32, capacity: usize) -> Vec<u8> {
    let bits = space_bits(space);
    let mut payload = Vec::with_capacity(layout::HEADER_LEN_WITH_SPACE + capacity);
    payload.push(layout::PROTOCOL_ID);
    payload.push(command | bits);
    payload.extend_from_slice(&address.to_be_bytes());
    if bits == 0 {
        payload.push(space);
    }
    payload
}

impl McsRequest {
    /// Encode the request as a datagram payload.
    ///
    /// # Errors
    /// Read counts and write lengths must be within `1..=64`.
    pub fn encode(&self) -> Result<Vec<u8>, MemConfigError> {
        match self {
            McsRequest::Read {
                space,
                address,
                count,
            } => {
                check_length(*count as usize)?;
                let mut payload =
                    encode_header(layout::CMD_READ, *space, *address, layout::READ_COUNT_LEN);
                payload.push(*count);
                Ok(payload)
            }
            McsRequest::Write {
                space,
                address,
                data,
            } => {
                check_length(data.len())?;
                let mut payload = encode_header(layout::CMD_WRITE, *space, *address, data.len());
                payload.extend_from_slice(data);
                Ok(payload)
            }
            McsRequest::GetSpaceInfo { space } => {
                Ok(vec![layout::PROTOCOL_ID, layout::CMD_GET_SPACE_INFO, *space])
            }
        }
    }
}

impl McsReply {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            McsReply::ReadOk {
                space,
                address,
                data,
            } => {
                let mut payload =
                    encode_header(layout::CMD_READ_REPLY_OK, *space, *address, data.len());
                payload.extend_from_slice(data);
                payload
            }
            McsReply::ReadFailed {
                space,
                address,
                code,
            } => {
                let mut payload = encode_header(
                    layout::CMD_READ_REPLY_FAILED,
                    *space,
                    *address,
                    layout::ERROR_CODE_LEN,
                );
                payload.extend_from_slice(&code.to_be_bytes());
                payload
            }
            McsReply::WriteOk { space, address } => {
                encode_header(layout::CMD_WRITE_REPLY_OK, *space, *address, 0)
            }
            McsReply::WriteFailed {
                space,
                address,
                code,
            } => {
                let mut payload = encode_header(
                    layout::CMD_WRITE_REPLY_FAILED,
                    *space,
                    *address,
                    layout::ERROR_CODE_LEN,
                );
                payload.extend_from_slice(&code.to_be_bytes());
                payload
            }
            McsReply::SpaceInfo(info) => {
                let command = if info.present {
                    layout::CMD_SPACE_INFO_PRESENT
                } else {
                    layout::CMD_SPACE_INFO_NOT_PRESENT
                };
                let mut payload = vec![layout::PROTOCOL_ID, command, info.space];
                payload.extend_from_slice(&info.highest_address.to_be_bytes());
                let mut flags = 0u8;
                if info.read_only {
                    flags |= layout::SPACE_INFO_FLAG_READ_ONLY;
                }
                if info.lowest_address != 0 {
                    flags |= layout::SPACE_INFO_FLAG_LOW_ADDRESS;
                }
                payload.push(flags);
                if info.lowest_address != 0 {
                    payload.extend_from_slice(&info.lowest_address.to_be_bytes());
                }
                payload
            }
        }
    }
}

fn check_length(length: usize) -> Result<(), MemConfigError> {
    if length == 0 || length > layout::MAX_TRANSFER_LEN {
        return Err(MemConfigError::InvalidLength { length });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{McsReply, McsRequest, SpaceInfo, space};
    use crate::protocols::memconfig::error::MemConfigError;

    #[test]
    fn read_cdi_uses_short_form() {
        let request = McsRequest::Read {
            space: space::CDI,
            address: 0x40,
            count: 64,
        };
        assert_eq!(
            request.encode().unwrap(),
            vec![0x20, 0x43, 0x00, 0x00, 0x00, 0x40, 0x40]
        );
    }

    #[test]
    fn read_other_space_carries_space_byte() {
        let request = McsRequest::Read {
            space: space::ACDI_USER,
            address: 0x0102_0304,
            count: 8,
        };
        assert_eq!(
            request.encode().unwrap(),
            vec![0x20, 0x40, 0x01, 0x02, 0x03, 0x04, 0xFB, 0x08]
        );
    }

    #[test]
    fn write_rejects_oversized_chunk() {
        let request = McsRequest::Write {
            space: space::CONFIGURATION,
            address: 0,
            data: vec![0; 65],
        };
        assert_eq!(
            request.encode().unwrap_err(),
            MemConfigError::InvalidLength { length: 65 }
        );
    }

    #[test]
    fn read_failed_reply_layout() {
        let reply = McsReply::ReadFailed {
            space: space::CONFIGURATION,
            address: 0x10,
            code: 0x1081,
        };
        assert_eq!(
            reply.encode(),
            vec![0x20, 0x59, 0x00, 0x00, 0x00, 0x10, 0x10, 0x81]
        );
    }

    #[test]
    fn space_info_size() {
        let info = SpaceInfo {
            space: space::CDI,
            present: true,
            highest_address: 168,
            lowest_address: 0,
            read_only: true,
        };
        assert_eq!(info.size(), Some(169));
        assert_eq!(
            McsReply::SpaceInfo(info).encode(),
            vec![0x20, 0x87, 0xFF, 0x00, 0x00, 0x00, 0xA8, 0x01]
        );
        let absent = SpaceInfo {
            present: false,
            ..info
        };
        assert_eq!(absent.size(), None);
    }
}
