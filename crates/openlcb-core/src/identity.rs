//! Node and event identifiers.
//!
//! Both identifiers are opaque fixed-width values carried big-endian on the
//! wire. They render as upper-case hex pairs separated by dots, which is the
//! form used in OpenLCB documentation and tooling (`05.01.01.01.22.00`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::hex::{parse_hex_pairs, write_hex_pairs};

/// Width of a [`NodeId`] on the wire.
pub const NODE_ID_LEN: usize = 6;
/// Width of an [`EventId`] on the wire.
pub const EVENT_ID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("wrong identifier width: need {needed} bytes, got {actual}")]
    WrongWidth { needed: usize, actual: usize },
    #[error("invalid identifier text: {text:?}")]
    InvalidText { text: String },
}

/// 48-bit node identifier.
///
/// # Examples
/// ```
/// use openlcb_core::NodeId;
///
/// let node = NodeId::new([0x05, 0x01, 0x01, 0x01, 0x22, 0x00]);
/// assert_eq!(node.to_string(), "05.01.01.01.22.00");
/// assert_eq!("05.01.01.01.22.00".parse::<NodeId>().unwrap(), node);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId([u8; NODE_ID_LEN]);

impl NodeId {
    pub const fn new(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentityError> {
        let array: [u8; NODE_ID_LEN] =
            bytes.try_into().map_err(|_| IdentityError::WrongWidth {
                needed: NODE_ID_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    /// Build from the low 48 bits of `value`.
    pub fn from_u64(value: u64) -> Self {
        let raw = value.to_be_bytes();
        let mut bytes = [0u8; NODE_ID_LEN];
        bytes.copy_from_slice(&raw[2..]);
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; NODE_ID_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    pub fn to_u64(self) -> u64 {
        let mut raw = [0u8; 8];
        raw[2..].copy_from_slice(&self.0);
        u64::from_be_bytes(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex_pairs(f, &self.0, '.')
    }
}

impl FromStr for NodeId {
    type Err = IdentityError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bytes = parse_hex_pairs(text).ok_or_else(|| IdentityError::InvalidText {
            text: text.to_string(),
        })?;
        Self::from_slice(&bytes)
    }
}

impl From<[u8; NODE_ID_LEN]> for NodeId {
    fn from(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// 64-bit event identifier used by the producer/consumer event protocol.
///
/// # Examples
/// ```
/// use openlcb_core::EventId;
///
/// let event = EventId::from_u64(0x0501_0101_2200_0001);
/// assert_eq!(event.to_string(), "05.01.01.01.22.00.00.01");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EventId([u8; EVENT_ID_LEN]);

impl EventId {
    pub const fn new(bytes: [u8; EVENT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentityError> {
        let array: [u8; EVENT_ID_LEN] =
            bytes.try_into().map_err(|_| IdentityError::WrongWidth {
                needed: EVENT_ID_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    pub const fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    pub const fn to_bytes(self) -> [u8; EVENT_ID_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; EVENT_ID_LEN] {
        &self.0
    }

    pub const fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex_pairs(f, &self.0, '.')
    }
}

impl FromStr for EventId {
    type Err = IdentityError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bytes = parse_hex_pairs(text).ok_or_else(|| IdentityError::InvalidText {
            text: text.to_string(),
        })?;
        Self::from_slice(&bytes)
    }
}

impl From<[u8; EVENT_ID_LEN]> for EventId {
    fn from(bytes: [u8; EVENT_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
