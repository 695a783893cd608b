use super::command::{McsReply, McsRequest, SpaceInfo};
use super::error::MemConfigError;
use super::layout;
use super::reader::MemConfigReader;

/// Returns true when the datagram payload belongs to the memory
/// configuration protocol.
pub fn is_memory_config(payload: &[u8]) -> bool {
    payload.first() == Some(&layout::PROTOCOL_ID)
}

/// Decode a request datagram as a node serving memory would receive it.
pub fn parse_request(payload: &[u8]) -> Result<McsRequest, MemConfigError> {
    let reader = MemConfigReader::new(payload);
    let command = reader.read_command()?;

    if command == layout::CMD_GET_SPACE_INFO {
        let space = reader.read_u8(layout::SPACE_INFO_SPACE_OFFSET)?;
        return Ok(McsRequest::GetSpaceInfo { space });
    }

    match command & layout::COMMAND_MASK {
        layout::CMD_READ => {
            let address = reader.read_address()?;
            let (space, offset) = reader.read_space(command)?;
            let count = reader.read_u8(offset)?;
            if count == 0 || count as usize > layout::MAX_TRANSFER_LEN {
                return Err(MemConfigError::InvalidLength {
                    length: count as usize,
                });
            }
            Ok(McsRequest::Read {
                space,
                address,
                count,
            })
        }
        layout::CMD_WRITE => {
            let address = reader.read_address()?;
            let (space, offset) = reader.read_space(command)?;
            let data = reader.read_rest(offset)?;
            if data.is_empty() || data.len() > layout::MAX_TRANSFER_LEN {
                return Err(MemConfigError::InvalidLength { length: data.len() });
            }
            Ok(McsRequest::Write {
                space,
                address,
                data: data.to_vec(),
            })
        }
        _ => Err(MemConfigError::UnknownCommand { command }),
    }
}

/// Decode a reply datagram sent back by the node that served a request.
pub fn parse_reply(payload: &[u8]) -> Result<McsReply, MemConfigError> {
    let reader = MemConfigReader::new(payload);
    let command = reader.read_command()?;

    if command == layout::CMD_SPACE_INFO_PRESENT || command == layout::CMD_SPACE_INFO_NOT_PRESENT
    {
        return parse_space_info(&reader, command == layout::CMD_SPACE_INFO_PRESENT)
            .map(McsReply::SpaceInfo);
    }

    let kind = command & layout::COMMAND_MASK;
    match kind {
        layout::CMD_READ_REPLY_OK
        | layout::CMD_READ_REPLY_FAILED
        | layout::CMD_WRITE_REPLY_OK
        | layout::CMD_WRITE_REPLY_FAILED => {}
        _ => return Err(MemConfigError::UnknownCommand { command }),
    }

    let address = reader.read_address()?;
    let (space, offset) = reader.read_space(command)?;

    match kind {
        layout::CMD_READ_REPLY_OK => {
            let data = reader.read_rest(offset)?;
            if data.len() > layout::MAX_TRANSFER_LEN {
                return Err(MemConfigError::InvalidLength { length: data.len() });
            }
            Ok(McsReply::ReadOk {
                space,
                address,
                data: data.to_vec(),
            })
        }
        layout::CMD_READ_REPLY_FAILED => Ok(McsReply::ReadFailed {
            space,
            address,
            code: reader.read_u16_be(offset)?,
        }),
        layout::CMD_WRITE_REPLY_OK => Ok(McsReply::WriteOk { space, address }),
        _ => Ok(McsReply::WriteFailed {
            space,
            address,
            code: reader.read_u16_be(offset)?,
        }),
    }
}

fn parse_space_info(
    reader: &MemConfigReader<'_>,
    present: bool,
) -> Result<SpaceInfo, MemConfigError> {
    reader.require_len(layout::SPACE_INFO_MIN_LEN)?;
    let space = reader.read_u8(layout::SPACE_INFO_SPACE_OFFSET)?;
    // Nodes reporting an absent space may omit everything after the space byte.
    if !present && reader.len() < layout::SPACE_INFO_HIGHEST_RANGE.end {
        return Ok(SpaceInfo {
            space,
            present,
            highest_address: 0,
            lowest_address: 0,
            read_only: false,
        });
    }
    let highest_address = reader.read_u32_be(layout::SPACE_INFO_HIGHEST_RANGE)?;
    let flags = if reader.len() > layout::SPACE_INFO_FLAGS_OFFSET {
        reader.read_u8(layout::SPACE_INFO_FLAGS_OFFSET)?
    } else {
        0
    };
    let lowest_address = if flags & layout::SPACE_INFO_FLAG_LOW_ADDRESS != 0 {
        reader.read_u32_be(layout::SPACE_INFO_LOWEST_RANGE)?
    } else {
        0
    };
    Ok(SpaceInfo {
        space,
        present,
        highest_address,
        lowest_address,
        read_only: flags & layout::SPACE_INFO_FLAG_READ_ONLY != 0,
    })
}
