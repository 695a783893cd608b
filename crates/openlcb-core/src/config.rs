//! Tunables for the datagram and memory configuration services.
//!
//! Both structs deserialize from a host configuration file; missing fields
//! take their defaults and durations are written in milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocols::memconfig::layout::MAX_TRANSFER_LEN;

/// Retry policy for outgoing datagrams.
///
/// # Examples
/// ```
/// use std::time::Duration;
///
/// use openlcb_core::DatagramConfig;
///
/// let config = DatagramConfig {
///     max_attempts: 0,
///     ..DatagramConfig::default()
/// }
/// .validated();
/// assert_eq!(config.max_attempts, 1);
/// assert_eq!(config.timeout, Duration::from_secs(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatagramConfig {
    /// Time to wait for an ack or nack before resending.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    /// Total sends per datagram, the first one included.
    pub max_attempts: u32,
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            max_attempts: 3,
        }
    }
}

impl DatagramConfig {
    pub fn validated(self) -> Self {
        Self {
            timeout: self.timeout.max(Duration::from_millis(1)),
            max_attempts: self.max_attempts.max(1),
        }
    }
}

/// Chunking and reply timing for memory configuration operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Time to wait for the reply datagram after the request was acked.
    #[serde(rename = "reply_timeout_ms", with = "millis")]
    pub reply_timeout: Duration,
    pub max_read_chunk: usize,
    pub max_write_chunk: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(3),
            max_read_chunk: MAX_TRANSFER_LEN,
            max_write_chunk: MAX_TRANSFER_LEN,
        }
    }
}

impl MemoryConfig {
    /// Clamp chunk sizes into `1..=64`.
    pub fn validated(self) -> Self {
        Self {
            reply_timeout: self.reply_timeout.max(Duration::from_millis(1)),
            max_read_chunk: self.max_read_chunk.clamp(1, MAX_TRANSFER_LEN),
            max_write_chunk: self.max_write_chunk.clamp(1, MAX_TRANSFER_LEN),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
