use std::collections::HashMap;

use super::error::SegmentError;
use crate::identity::NodeId;
use crate::protocols::message::layout::{DATAGRAM_MAX_LEN, DATAGRAM_MIN_LEN};

/// Bytes carried by one link-level frame.
pub const SEGMENT_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Only,
    First,
    Middle,
    Final,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub data: Vec<u8>,
}

/// Cut a datagram payload into frame-sized segments.
///
/// # Examples
/// ```
/// use openlcb_core::datagram::{SegmentKind, split_datagram};
///
/// let segments = split_datagram(&[0u8; 20]).unwrap();
/// let kinds: Vec<_> = segments.iter().map(|segment| segment.kind).collect();
/// assert_eq!(
///     kinds,
///     vec![SegmentKind::First, SegmentKind::Middle, SegmentKind::Final]
/// );
/// ```
pub fn split_datagram(payload: &[u8]) -> Result<Vec<Segment>, SegmentError> {
    if payload.len() < DATAGRAM_MIN_LEN {
        return Err(SegmentError::Empty);
    }
    if payload.len() > DATAGRAM_MAX_LEN {
        return Err(SegmentError::TooLong {
            length: payload.len(),
        });
    }
    let count = payload.len().div_ceil(SEGMENT_LEN);
    Ok(payload
        .chunks(SEGMENT_LEN)
        .enumerate()
        .map(|(index, chunk)| {
            let kind = match (index, count) {
                (_, 1) => SegmentKind::Only,
                (0, _) => SegmentKind::First,
                (i, n) if i + 1 == n => SegmentKind::Final,
                _ => SegmentKind::Middle,
            };
            Segment {
                kind,
                data: chunk.to_vec(),
            }
        })
        .collect())
}

/// Reassembles segmented datagrams per (source, destination) pair.
///
/// A failed push discards the partial datagram for that pair.
#[derive(Debug, Default)]
pub struct SegmentAssembler {
    partial: HashMap<(NodeId, NodeId), Vec<u8>>,
}

impl SegmentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one segment; returns the payload once the final segment lands.
    pub fn push(
        &mut self,
        source: NodeId,
        destination: NodeId,
        segment: &Segment,
    ) -> Result<Option<Vec<u8>>, SegmentError> {
        let key = (source, destination);
        if segment.data.is_empty() || segment.data.len() > SEGMENT_LEN {
            self.partial.remove(&key);
            return Err(SegmentError::BadSegment {
                length: segment.data.len(),
            });
        }

        match segment.kind {
            SegmentKind::Only => {
                if self.partial.remove(&key).is_some() {
                    return Err(SegmentError::OutOfOrder);
                }
                Ok(Some(segment.data.clone()))
            }
            SegmentKind::First => {
                if self.partial.remove(&key).is_some() {
                    return Err(SegmentError::OutOfOrder);
                }
                self.partial.insert(key, segment.data.clone());
                Ok(None)
            }
            SegmentKind::Middle | SegmentKind::Final => {
                let Some(mut buffer) = self.partial.remove(&key) else {
                    return Err(SegmentError::OutOfOrder);
                };
                buffer.extend_from_slice(&segment.data);
                if buffer.len() > DATAGRAM_MAX_LEN {
                    return Err(SegmentError::TooLong {
                        length: buffer.len(),
                    });
                }
                if segment.kind == SegmentKind::Final {
                    return Ok(Some(buffer));
                }
                self.partial.insert(key, buffer);
                Ok(None)
            }
        }
    }

    /// Number of pairs with a datagram in progress.
    pub fn in_progress(&self) -> usize {
        self.partial.len()
    }
}
