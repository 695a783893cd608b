//! Wire-format modules.
//!
//! Each format follows the same layering:
//! - `layout`: byte offsets, ranges and protocol constants (source of truth)
//! - `reader`: safe byte access and protocol conventions
//! - `parser`: domain-level decoding (no direct byte indexing)
//! - `error`: explicit, actionable errors
//!
//! Codecs are pure and contain no I/O or state; the services in `datagram`
//! and `memory` own all transfer bookkeeping.

pub mod memconfig;
pub mod message;
