use super::error::MemConfigError;
use super::layout;

pub struct MemConfigReader<'a> {
    payload: &'a [u8],
}

impl<'a> MemConfigReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn require_len(&self, needed: usize) -> Result<(), MemConfigError> {
        if self.payload.len() < needed {
            return Err(MemConfigError::TooShort {
                needed,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, MemConfigError> {
        self.payload
            .get(offset)
            .copied()
            .ok_or(MemConfigError::TooShort {
                needed: offset + 1,
                actual: self.payload.len(),
            })
    }

    pub fn read_u16_be(&self, offset: usize) -> Result<u16, MemConfigError> {
        let bytes = self.read_slice(offset..offset + 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_be(&self, range: std::ops::Range<usize>) -> Result<u32, MemConfigError> {
        let bytes = self.read_slice(range)?;
        if bytes.len() != 4 {
            return Err(MemConfigError::TooShort {
                needed: 4,
                actual: bytes.len(),
            });
        }
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], MemConfigError> {
        self.payload
            .get(range.clone())
            .ok_or(MemConfigError::TooShort {
                needed: range.end,
                actual: self.payload.len(),
            })
    }

    pub fn read_rest(&self, offset: usize) -> Result<&'a [u8], MemConfigError> {
        self.require_len(offset)?;
        self.read_slice(offset..self.payload.len())
    }

    /// Verify the leading protocol byte and return the command byte.
    pub fn read_command(&self) -> Result<u8, MemConfigError> {
        let protocol = self.read_u8(layout::PROTOCOL_OFFSET)?;
        if protocol != layout::PROTOCOL_ID {
            return Err(MemConfigError::NotMemoryConfig { protocol });
        }
        self.read_u8(layout::COMMAND_OFFSET)
    }

    /// Decode the space encoded in the command's low bits, falling back to
    /// the explicit space byte. Returns the space and the offset of the
    /// first byte after the header.
    pub fn read_space(&self, command: u8) -> Result<(u8, usize), MemConfigError> {
        match command & layout::SPACE_BITS_MASK {
            0 => Ok((
                self.read_u8(layout::SPACE_OFFSET)?,
                layout::HEADER_LEN_WITH_SPACE,
            )),
            bits => {
                self.require_len(layout::HEADER_LEN_SHORT)?;
                Ok((0xFC | bits, layout::HEADER_LEN_SHORT))
            }
        }
    }

    pub fn read_address(&self) -> Result<u32, MemConfigError> {
        self.read_u32_be(layout::ADDRESS_RANGE)
    }
}
