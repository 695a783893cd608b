//! OpenLCB node protocol core.
//!
//! This crate implements the node side of the OpenLCB/LCC protocol stack:
//! identifiers, the typed message model with its MTI table and dispatch, a
//! datagram transport with acknowledgment and resend, the memory
//! configuration protocol built on it, and a streaming reader for a node's
//! configuration description (CDI).
//!
//! Layering:
//! - `protocols`: pure wire codecs (layout/reader/parser/error), no state;
//! - [`datagram`], [`memory`]: per-peer state machines driving the codecs;
//! - [`cdi`]: a consumer of the memory service.
//!
//! The link layer is outside the crate. It hands inbound messages to
//! [`DatagramService::handle_message`] and receives outbound ones through a
//! [`Connection`]. Timeouts are driven by calling `poll_timeouts`, or by
//! spawning `run_timeouts` on a tokio runtime.
//!
//! Invariants:
//! - Messages are immutable; the MTI is derived from the variant.
//! - At most one datagram and one memory operation are in flight per peer.
//! - Every asynchronous request reports exactly one outcome.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use openlcb_core::{
//!     Connection, DatagramConfig, DatagramService, MemoryConfig, MemoryConfigService, Message,
//!     NodeId,
//! };
//!
//! struct Bus;
//!
//! impl Connection for Bus {
//!     fn put(&self, message: Message) {
//!         println!("{message}");
//!     }
//! }
//!
//! let local: NodeId = "05.01.01.01.22.00".parse()?;
//! let datagrams = DatagramService::new(local, Arc::new(Bus), DatagramConfig::default());
//! let memory = MemoryConfigService::new(datagrams, MemoryConfig::default());
//! memory.request_read(NodeId::from_u64(0x0501_0101_2201), 0xFD, 0, 16, |result| {
//!     if let Ok(read) = result {
//!         println!("{} bytes", read.data.len());
//!     }
//! });
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Instant;

pub mod cdi;
pub mod config;
pub mod connection;
pub mod datagram;
mod hex;
pub mod identity;
pub mod memory;
pub mod protocols;
pub mod throttle;

pub use cdi::{CdiError, CdiLoader, CdiStream};
pub use config::{DatagramConfig, MemoryConfig};
pub use connection::Connection;
pub use datagram::{DatagramError, DatagramService};
pub use hex::hex_space_string;
pub use identity::{EventId, IdentityError, NodeId};
pub use memory::{MemoryConfigService, MemoryError, MemoryReader, OperationHandle, ReadData};
pub use protocols::message::{
    Decoded, EventState, Message, MessageBody, MessageError, MessageHandler, Mti, ProtocolFlags,
    WireMessage,
};

/// Current time on the clock used for deadlines.
///
/// Follows tokio's clock, so a paused test runtime also pauses deadlines.
pub(crate) fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}
