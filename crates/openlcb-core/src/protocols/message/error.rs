use thiserror::Error;

use super::mti::Mti;

/// Errors returned when building or decoding a [`Message`](super::Message).
///
/// # Examples
/// ```
/// use openlcb_core::{MessageError, WireMessage, NodeId, Message};
///
/// let wire = WireMessage {
///     mti: 0x0594,
///     source: NodeId::new([0, 0, 0, 0, 0, 1]),
///     destination: None,
///     payload: vec![1, 2, 3],
/// };
/// let err = Message::from_wire(&wire).unwrap_err();
/// assert!(matches!(err, MessageError::MalformedPayload { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("unknown MTI 0x{mti:04X}")]
    UnknownMti { mti: u16 },
    #[error("payload too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("malformed {mti} payload: {reason}")]
    MalformedPayload { mti: Mti, reason: String },
    #[error("{mti} requires a destination node")]
    MissingDestination { mti: Mti },
    #[error("{mti} is a global message and cannot carry a destination")]
    UnexpectedDestination { mti: Mti },
}

impl MessageError {
    pub(crate) fn malformed(mti: Mti, reason: impl Into<String>) -> Self {
        MessageError::MalformedPayload {
            mti,
            reason: reason.into(),
        }
    }

    pub(crate) fn in_message(self, mti: Mti) -> Self {
        match self {
            MessageError::TooShort { needed, actual } => MessageError::malformed(
                mti,
                format!("need {needed} bytes, got {actual}"),
            ),
            other => other,
        }
    }
}
