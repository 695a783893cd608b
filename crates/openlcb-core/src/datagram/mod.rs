//! Datagram transport.
//!
//! A datagram is a 1..=72 byte payload delivered point to point and
//! answered by the receiver with `DatagramReceivedOk` or
//! `DatagramRejected`. The sender keeps one transfer in flight per peer:
//! unanswered sends are resent after the configured timeout up to the
//! attempt limit, rejections fail immediately and are never resent.
//!
//! On the receive side complete datagrams are routed by their first byte to
//! a registered [`DatagramConsumer`], which answers through a one-shot
//! [`DatagramReply`].
//!
//! Link layers that carry at most eight bytes per frame use
//! [`split_datagram`] and [`DatagramService::handle_segment`].

pub mod codes;
pub mod error;
pub mod segment;
pub mod service;

pub use codes::DatagramAck;
pub use error::{DatagramError, SegmentError};
pub use segment::{Segment, SegmentAssembler, SegmentKind, split_datagram};
pub use service::{
    DatagramConsumer, DatagramReply, DatagramResult, DatagramService, IncomingDatagram,
};
