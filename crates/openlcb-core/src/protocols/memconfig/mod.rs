//! Memory configuration protocol codec.
//!
//! Requests and replies travel as datagram payloads starting with the
//! protocol byte `0x20`. The command's two low bits select one of the three
//! well-known spaces; otherwise an explicit space byte follows the address.
//! This module only converts bytes; sequencing lives in
//! [`crate::memory`].

pub mod command;
pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use command::{McsReply, McsRequest, SpaceInfo, space};
pub use error::MemConfigError;
pub use parser::{is_memory_config, parse_reply, parse_request};
