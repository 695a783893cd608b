use super::error::MessageError;
use super::layout;
use crate::identity::{EventId, NodeId};

pub struct MessageReader<'a> {
    payload: &'a [u8],
}

impl<'a> MessageReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn require_len(&self, needed: usize) -> Result<(), MessageError> {
        if self.payload.len() < needed {
            return Err(MessageError::TooShort {
                needed,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, MessageError> {
        self.payload
            .get(offset)
            .copied()
            .ok_or(MessageError::TooShort {
                needed: offset + 1,
                actual: self.payload.len(),
            })
    }

    pub fn read_u16_be(&self, range: std::ops::Range<usize>) -> Result<u16, MessageError> {
        let bytes = self.read_slice(range)?;
        if bytes.len() != 2 {
            return Err(MessageError::TooShort {
                needed: 2,
                actual: bytes.len(),
            });
        }
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], MessageError> {
        self.payload
            .get(range.clone())
            .ok_or(MessageError::TooShort {
                needed: range.end,
                actual: self.payload.len(),
            })
    }

    pub fn read_rest(&self, offset: usize) -> Result<&'a [u8], MessageError> {
        self.read_slice(offset..self.payload.len().max(offset))
    }

    pub fn read_node_id(&self) -> Result<NodeId, MessageError> {
        let bytes = self.read_slice(layout::NODE_ID_RANGE)?;
        let mut array = [0u8; 6];
        array.copy_from_slice(bytes);
        Ok(NodeId::new(array))
    }

    pub fn read_event_id(&self) -> Result<EventId, MessageError> {
        let bytes = self.read_slice(layout::EVENT_ID_RANGE)?;
        let mut array = [0u8; 8];
        array.copy_from_slice(bytes);
        Ok(EventId::new(array))
    }

    /// Read a left-aligned big-endian value of up to `width` bytes.
    pub fn read_left_aligned(&self, width: usize) -> u64 {
        let mut value = 0u64;
        for index in 0..width {
            let byte = self.payload.get(index).copied().unwrap_or(0);
            value = (value << 8) | byte as u64;
        }
        value
    }
}
