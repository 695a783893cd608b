//! OpenLCB message model.
//!
//! A [`Message`] is an immutable value: source node, optional destination and
//! a typed [`MessageBody`]. The MTI is derived from the body and therefore
//! cannot drift after construction. Constructors validate the destination
//! against the MTI address bit and reject payloads of the wrong width.
//!
//! Wire conversion goes through [`WireMessage`] (MTI, source, destination,
//! payload bytes). Offsets live in `layout`, safe byte access in `reader`,
//! and decoding in `parser`, like every other protocol module.
//!
//! Dispatch is a match over the body that calls exactly one
//! [`MessageHandler`] method.

pub mod body;
pub mod error;
pub mod handler;
pub mod layout;
pub mod mti;
pub mod parser;
pub mod reader;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use body::{EventState, MessageBody, ProtocolFlags};
pub use error::MessageError;
pub use handler::MessageHandler;
pub use mti::Mti;

use crate::hex::hex_space_string;
use crate::identity::{EventId, NodeId};

/// Message as it crosses the link-layer boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Raw 16-bit MTI.
    pub mti: u16,
    pub source: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<NodeId>,
    /// Payload bytes, serialized as space separated hex pairs.
    #[serde(with = "crate::hex::space_pairs")]
    pub payload: Vec<u8>,
}

/// Outcome of decoding one [`WireMessage`], as recorded in trace fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decoded {
    Message { name: String, display: String },
    Error { error: String },
}

impl Decoded {
    pub fn from_wire(wire: &WireMessage) -> Self {
        match Message::from_wire(wire) {
            Ok(message) => Decoded::Message {
                name: message.mti().name().to_string(),
                display: message.to_string(),
            },
            Err(err) => Decoded::Error {
                error: err.to_string(),
            },
        }
    }
}

/// Immutable OpenLCB message.
///
/// # Examples
/// ```
/// use openlcb_core::{EventId, Message, Mti, NodeId};
///
/// let source = NodeId::new([0x05, 0x01, 0x01, 0x01, 0x22, 0x00]);
/// let message = Message::learn_event(source, EventId::from_u64(1));
/// assert_eq!(message.mti(), Mti::LearnEvent);
/// assert!(message.destination().is_none());
/// assert_eq!(
///     message.to_string(),
///     "05.01.01.01.22.00 Learn Event 00.00.00.00.00.00.00.01"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    source: NodeId,
    destination: Option<NodeId>,
    body: MessageBody,
}

impl Message {
    /// Build a message, checking addressing and payload widths.
    pub fn new(
        source: NodeId,
        destination: Option<NodeId>,
        body: MessageBody,
    ) -> Result<Self, MessageError> {
        let mti = body.mti();
        match (mti.is_addressed(), destination.is_some()) {
            (true, false) => return Err(MessageError::MissingDestination { mti }),
            (false, true) => return Err(MessageError::UnexpectedDestination { mti }),
            _ => {}
        }
        validate_body(mti, &body)?;
        Ok(Self {
            source,
            destination,
            body,
        })
    }

    pub fn initialization_complete(source: NodeId) -> Self {
        Self {
            source,
            destination: None,
            body: MessageBody::InitializationComplete,
        }
    }

    pub fn verified_node_id(source: NodeId) -> Self {
        Self {
            source,
            destination: None,
            body: MessageBody::VerifiedNodeId { node: source },
        }
    }

    pub fn learn_event(source: NodeId, event: EventId) -> Self {
        Self {
            source,
            destination: None,
            body: MessageBody::LearnEvent { event },
        }
    }

    pub fn event_report(source: NodeId, event: EventId) -> Self {
        Self {
            source,
            destination: None,
            body: MessageBody::ProducerConsumerEventReport { event },
        }
    }

    pub fn datagram(
        source: NodeId,
        destination: NodeId,
        data: Vec<u8>,
    ) -> Result<Self, MessageError> {
        Self::new(source, Some(destination), MessageBody::Datagram { data })
    }

    pub fn datagram_received_ok(source: NodeId, destination: NodeId, flags: u8) -> Self {
        Self {
            source,
            destination: Some(destination),
            body: MessageBody::DatagramReceivedOk { flags },
        }
    }

    pub fn datagram_rejected(source: NodeId, destination: NodeId, code: u16) -> Self {
        Self {
            source,
            destination: Some(destination),
            body: MessageBody::DatagramRejected { code },
        }
    }

    pub fn stream_data_proceed(
        source: NodeId,
        destination: NodeId,
        source_stream_id: u8,
        destination_stream_id: u8,
    ) -> Self {
        Self {
            source,
            destination: Some(destination),
            body: MessageBody::StreamDataProceed {
                source_stream_id,
                destination_stream_id,
            },
        }
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn destination(&self) -> Option<NodeId> {
        self.destination
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn mti(&self) -> Mti {
        self.body.mti()
    }

    /// True when the message is addressed to `node` or is global.
    pub fn is_for(&self, node: NodeId) -> bool {
        self.destination.is_none_or(|dest| dest == node)
    }

    /// Encode the payload bytes exactly as they appear on the wire.
    pub fn payload(&self) -> Vec<u8> {
        match &self.body {
            MessageBody::InitializationComplete | MessageBody::InitializationCompleteSimple => {
                self.source.to_bytes().to_vec()
            }
            MessageBody::VerifyNodeIdAddressed { node }
            | MessageBody::VerifyNodeIdGlobal { node } => node
                .map(|node| node.to_bytes().to_vec())
                .unwrap_or_default(),
            MessageBody::VerifiedNodeId { node } | MessageBody::VerifiedNodeIdSimple { node } => {
                node.to_bytes().to_vec()
            }
            MessageBody::OptionalInteractionRejected { code, rejected_mti }
            | MessageBody::TerminateDueToError { code, rejected_mti } => {
                let mut payload = code.to_be_bytes().to_vec();
                payload.extend_from_slice(&rejected_mti.to_be_bytes());
                payload
            }
            MessageBody::ProtocolSupportInquiry
            | MessageBody::IdentifyEventsAddressed
            | MessageBody::IdentifyEventsGlobal
            | MessageBody::SimpleNodeIdentInfoRequest => Vec::new(),
            MessageBody::ProtocolSupportReply { protocols } => protocols.to_bytes().to_vec(),
            MessageBody::IdentifyConsumers { event }
            | MessageBody::ConsumerRangeIdentified { event }
            | MessageBody::ConsumerIdentified { event, .. }
            | MessageBody::IdentifyProducers { event }
            | MessageBody::ProducerRangeIdentified { event }
            | MessageBody::ProducerIdentified { event, .. }
            | MessageBody::LearnEvent { event }
            | MessageBody::ProducerConsumerEventReport { event } => event.to_bytes().to_vec(),
            MessageBody::TractionControlCommand { data }
            | MessageBody::TractionControlReply { data }
            | MessageBody::RemoteButtonRequest { data }
            | MessageBody::RemoteButtonReply { data }
            | MessageBody::SimpleNodeIdentInfoReply { data }
            | MessageBody::Datagram { data } => data.clone(),
            MessageBody::DatagramReceivedOk { flags } => {
                if *flags == 0 {
                    Vec::new()
                } else {
                    vec![*flags]
                }
            }
            MessageBody::DatagramRejected { code } => code.to_be_bytes().to_vec(),
            MessageBody::StreamInitiateRequest {
                max_buffer_size,
                flags,
                source_stream_id,
                destination_stream_id,
            }
            | MessageBody::StreamInitiateReply {
                max_buffer_size,
                flags,
                source_stream_id,
                destination_stream_id,
            } => {
                let mut payload = max_buffer_size.to_be_bytes().to_vec();
                payload.extend_from_slice(&flags.to_be_bytes());
                payload.push(*source_stream_id);
                payload.push(*destination_stream_id);
                payload
            }
            MessageBody::StreamDataSend {
                destination_stream_id,
                data,
            } => {
                let mut payload = Vec::with_capacity(data.len() + 1);
                payload.push(*destination_stream_id);
                payload.extend_from_slice(data);
                payload
            }
            MessageBody::StreamDataProceed {
                source_stream_id,
                destination_stream_id,
            }
            | MessageBody::StreamDataComplete {
                source_stream_id,
                destination_stream_id,
            } => vec![*source_stream_id, *destination_stream_id],
        }
    }

    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            mti: self.mti().code(),
            source: self.source,
            destination: self.destination,
            payload: self.payload(),
        }
    }

    pub fn from_wire(wire: &WireMessage) -> Result<Self, MessageError> {
        parser::parse_message(wire)
    }

    /// Route to the handler method for this variant.
    pub fn dispatch<H: MessageHandler + ?Sized>(&self, handler: &H) {
        match &self.body {
            MessageBody::InitializationComplete => handler.handle_initialization_complete(self),
            MessageBody::InitializationCompleteSimple => {
                handler.handle_initialization_complete_simple(self)
            }
            MessageBody::VerifyNodeIdAddressed { node } => {
                handler.handle_verify_node_id_addressed(self, *node)
            }
            MessageBody::VerifyNodeIdGlobal { node } => {
                handler.handle_verify_node_id_global(self, *node)
            }
            MessageBody::VerifiedNodeId { node } => handler.handle_verified_node_id(self, *node),
            MessageBody::VerifiedNodeIdSimple { node } => {
                handler.handle_verified_node_id_simple(self, *node)
            }
            MessageBody::OptionalInteractionRejected { code, rejected_mti } => {
                handler.handle_optional_interaction_rejected(self, *code, *rejected_mti)
            }
            MessageBody::TerminateDueToError { code, rejected_mti } => {
                handler.handle_terminate_due_to_error(self, *code, *rejected_mti)
            }
            MessageBody::ProtocolSupportInquiry => handler.handle_protocol_support_inquiry(self),
            MessageBody::ProtocolSupportReply { protocols } => {
                handler.handle_protocol_support_reply(self, *protocols)
            }
            MessageBody::IdentifyConsumers { event } => {
                handler.handle_identify_consumers(self, *event)
            }
            MessageBody::ConsumerRangeIdentified { event } => {
                handler.handle_consumer_range_identified(self, *event)
            }
            MessageBody::ConsumerIdentified { event, state } => {
                handler.handle_consumer_identified(self, *event, *state)
            }
            MessageBody::IdentifyProducers { event } => {
                handler.handle_identify_producers(self, *event)
            }
            MessageBody::ProducerRangeIdentified { event } => {
                handler.handle_producer_range_identified(self, *event)
            }
            MessageBody::ProducerIdentified { event, state } => {
                handler.handle_producer_identified(self, *event, *state)
            }
            MessageBody::IdentifyEventsAddressed => handler.handle_identify_events_addressed(self),
            MessageBody::IdentifyEventsGlobal => handler.handle_identify_events_global(self),
            MessageBody::LearnEvent { event } => handler.handle_learn_event(self, *event),
            MessageBody::ProducerConsumerEventReport { event } => {
                handler.handle_producer_consumer_event_report(self, *event)
            }
            MessageBody::TractionControlCommand { data } => {
                handler.handle_traction_control_command(self, data)
            }
            MessageBody::TractionControlReply { data } => {
                handler.handle_traction_control_reply(self, data)
            }
            MessageBody::RemoteButtonRequest { data } => {
                handler.handle_remote_button_request(self, data)
            }
            MessageBody::RemoteButtonReply { data } => {
                handler.handle_remote_button_reply(self, data)
            }
            MessageBody::SimpleNodeIdentInfoRequest => {
                handler.handle_simple_node_ident_info_request(self)
            }
            MessageBody::SimpleNodeIdentInfoReply { data } => {
                handler.handle_simple_node_ident_info_reply(self, data)
            }
            MessageBody::Datagram { data } => handler.handle_datagram(self, data),
            MessageBody::DatagramReceivedOk { flags } => {
                handler.handle_datagram_received_ok(self, *flags)
            }
            MessageBody::DatagramRejected { code } => handler.handle_datagram_rejected(self, *code),
            MessageBody::StreamInitiateRequest {
                max_buffer_size,
                flags,
                source_stream_id,
                destination_stream_id,
            } => handler.handle_stream_initiate_request(
                self,
                *max_buffer_size,
                *flags,
                *source_stream_id,
                *destination_stream_id,
            ),
            MessageBody::StreamInitiateReply {
                max_buffer_size,
                flags,
                source_stream_id,
                destination_stream_id,
            } => handler.handle_stream_initiate_reply(
                self,
                *max_buffer_size,
                *flags,
                *source_stream_id,
                *destination_stream_id,
            ),
            MessageBody::StreamDataSend {
                destination_stream_id,
                data,
            } => handler.handle_stream_data_send(self, *destination_stream_id, data),
            MessageBody::StreamDataProceed {
                source_stream_id,
                destination_stream_id,
            } => handler.handle_stream_data_proceed(
                self,
                *source_stream_id,
                *destination_stream_id,
            ),
            MessageBody::StreamDataComplete {
                source_stream_id,
                destination_stream_id,
            } => handler.handle_stream_data_complete(
                self,
                *source_stream_id,
                *destination_stream_id,
            ),
        }
    }
}

fn validate_body(mti: Mti, body: &MessageBody) -> Result<(), MessageError> {
    match body {
        MessageBody::Datagram { data } => {
            if !(layout::DATAGRAM_MIN_LEN..=layout::DATAGRAM_MAX_LEN).contains(&data.len()) {
                return Err(MessageError::malformed(
                    mti,
                    format!(
                        "datagram length {} outside {}..={}",
                        data.len(),
                        layout::DATAGRAM_MIN_LEN,
                        layout::DATAGRAM_MAX_LEN
                    ),
                ));
            }
        }
        MessageBody::StreamDataSend { data, .. } if data.is_empty() => {
            return Err(MessageError::malformed(mti, "stream data is empty"));
        }
        MessageBody::TractionControlCommand { data } | MessageBody::TractionControlReply { data }
            if data.is_empty() =>
        {
            return Err(MessageError::malformed(mti, "missing traction instruction"));
        }
        _ => {}
    }
    Ok(())
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        if let Some(destination) = self.destination {
            write!(f, " -> {}", destination)?;
        }
        write!(f, " {}", self.mti())?;
        match &self.body {
            MessageBody::InitializationComplete
            | MessageBody::InitializationCompleteSimple
            | MessageBody::ProtocolSupportInquiry
            | MessageBody::IdentifyEventsAddressed
            | MessageBody::IdentifyEventsGlobal
            | MessageBody::SimpleNodeIdentInfoRequest => Ok(()),
            MessageBody::VerifyNodeIdAddressed { node }
            | MessageBody::VerifyNodeIdGlobal { node } => match node {
                Some(node) => write!(f, " {}", node),
                None => Ok(()),
            },
            MessageBody::VerifiedNodeId { node } | MessageBody::VerifiedNodeIdSimple { node } => {
                write!(f, " {}", node)
            }
            MessageBody::OptionalInteractionRejected { code, rejected_mti }
            | MessageBody::TerminateDueToError { code, rejected_mti } => {
                write!(f, " code=0x{:04X} mti=0x{:04X}", code, rejected_mti)
            }
            MessageBody::ProtocolSupportReply { protocols } => write!(f, " {}", protocols),
            MessageBody::IdentifyConsumers { event }
            | MessageBody::ConsumerRangeIdentified { event }
            | MessageBody::ConsumerIdentified { event, .. }
            | MessageBody::IdentifyProducers { event }
            | MessageBody::ProducerRangeIdentified { event }
            | MessageBody::ProducerIdentified { event, .. }
            | MessageBody::LearnEvent { event }
            | MessageBody::ProducerConsumerEventReport { event } => write!(f, " {}", event),
            MessageBody::TractionControlCommand { data }
            | MessageBody::TractionControlReply { data }
            | MessageBody::RemoteButtonRequest { data }
            | MessageBody::RemoteButtonReply { data }
            | MessageBody::SimpleNodeIdentInfoReply { data }
            | MessageBody::Datagram { data } => write!(f, " {}", hex_space_string(data)),
            MessageBody::DatagramReceivedOk { flags } => write!(f, " flags=0x{:02X}", flags),
            MessageBody::DatagramRejected { code } => write!(f, " code=0x{:04X}", code),
            MessageBody::StreamInitiateRequest {
                max_buffer_size,
                flags,
                source_stream_id,
                destination_stream_id,
            }
            | MessageBody::StreamInitiateReply {
                max_buffer_size,
                flags,
                source_stream_id,
                destination_stream_id,
            } => write!(
                f,
                " maxBuf={} flags=0x{:04X} srcId={} dstId={}",
                max_buffer_size, flags, source_stream_id, destination_stream_id
            ),
            MessageBody::StreamDataSend {
                destination_stream_id,
                data,
            } => write!(f, " dstId={} {}", destination_stream_id, hex_space_string(data)),
            MessageBody::StreamDataProceed {
                source_stream_id,
                destination_stream_id,
            }
            | MessageBody::StreamDataComplete {
                source_stream_id,
                destination_stream_id,
            } => write!(f, " srcId={} dstId={}", source_stream_id, destination_stream_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventState, Message, MessageBody, MessageError, MessageHandler, Mti};
    use crate::identity::{EventId, NodeId};
    use parking_lot::Mutex;

    const HERE: NodeId = NodeId::new([0, 0, 0, 0, 0, 1]);
    const THERE: NodeId = NodeId::new([0, 0, 0, 0, 0, 2]);

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Recorder {
        fn push(&self, name: &'static str) {
            self.calls.lock().push(name);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().clone()
        }
    }

    impl MessageHandler for Recorder {
        fn unhandled(&self, _message: &Message) {
            self.push("unhandled");
        }

        fn handle_initialization_complete(&self, _message: &Message) {
            self.push("initialization_complete");
        }

        fn handle_learn_event(&self, _message: &Message, _event: EventId) {
            self.push("learn_event");
        }

        fn handle_stream_data_proceed(&self, _message: &Message, _src: u8, _dst: u8) {
            self.push("stream_data_proceed");
        }

        fn handle_consumer_identified(
            &self,
            _message: &Message,
            _event: EventId,
            state: EventState,
        ) {
            match state {
                EventState::Valid => self.push("consumer_identified_valid"),
                _ => self.push("consumer_identified_other"),
            }
        }
    }

    #[test]
    fn dispatch_calls_exactly_one_method() {
        let recorder = Recorder::default();
        Message::initialization_complete(HERE).dispatch(&recorder);
        assert_eq!(recorder.calls(), vec!["initialization_complete"]);

        let recorder = Recorder::default();
        Message::learn_event(HERE, EventId::from_u64(1)).dispatch(&recorder);
        assert_eq!(recorder.calls(), vec!["learn_event"]);

        let recorder = Recorder::default();
        Message::stream_data_proceed(HERE, THERE, 4, 5).dispatch(&recorder);
        assert_eq!(recorder.calls(), vec!["stream_data_proceed"]);

        let recorder = Recorder::default();
        Message::verified_node_id(HERE).dispatch(&recorder);
        assert_eq!(recorder.calls(), vec!["unhandled"]);
    }

    #[test]
    fn dispatch_carries_event_state() {
        let recorder = Recorder::default();
        let message = Message::new(
            HERE,
            None,
            MessageBody::ConsumerIdentified {
                event: EventId::from_u64(9),
                state: EventState::Valid,
            },
        )
        .unwrap();
        assert_eq!(message.mti(), Mti::ConsumerIdentifiedValid);
        message.dispatch(&recorder);
        assert_eq!(recorder.calls(), vec!["consumer_identified_valid"]);
    }

    #[test]
    fn learn_event_equality_tracks_event_id() {
        let a = Message::learn_event(HERE, EventId::from_u64(1));
        let b = Message::learn_event(HERE, EventId::from_u64(1));
        let c = Message::learn_event(HERE, EventId::from_u64(2));
        let d = Message::learn_event(THERE, EventId::from_u64(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn stream_proceed_equality_tracks_both_ids() {
        let a = Message::stream_data_proceed(HERE, THERE, 1, 2);
        assert_eq!(a, Message::stream_data_proceed(HERE, THERE, 1, 2));
        assert_ne!(a, Message::stream_data_proceed(HERE, THERE, 1, 3));
        assert_ne!(a, Message::stream_data_proceed(HERE, THERE, 0, 2));
        assert_ne!(a, Message::stream_data_proceed(HERE, HERE, 1, 2));
    }

    #[test]
    fn rendering_includes_payload_fields() {
        let message = Message::stream_data_proceed(HERE, THERE, 4, 5);
        assert_eq!(
            message.to_string(),
            "00.00.00.00.00.01 -> 00.00.00.00.00.02 Stream Data Proceed srcId=4 dstId=5"
        );
        let init = Message::initialization_complete(HERE);
        assert_eq!(init.to_string(), "00.00.00.00.00.01 Initialization Complete");
    }

    #[test]
    fn addressed_body_requires_destination() {
        let err = Message::new(HERE, None, MessageBody::ProtocolSupportInquiry).unwrap_err();
        assert_eq!(
            err,
            MessageError::MissingDestination {
                mti: Mti::ProtocolSupportInquiry
            }
        );
        let err = Message::new(
            HERE,
            Some(THERE),
            MessageBody::LearnEvent {
                event: EventId::from_u64(1),
            },
        )
        .unwrap_err();
        assert_eq!(err, MessageError::UnexpectedDestination { mti: Mti::LearnEvent });
    }

    #[test]
    fn oversized_datagram_is_rejected_eagerly() {
        let err = Message::datagram(HERE, THERE, vec![0; 73]).unwrap_err();
        assert!(matches!(err, MessageError::MalformedPayload { mti: Mti::Datagram, .. }));
        assert!(Message::datagram(HERE, THERE, Vec::new()).is_err());
        assert!(Message::datagram(HERE, THERE, vec![0; 72]).is_ok());
    }

    #[test]
    fn payload_layouts_match_wire_format() {
        assert_eq!(
            Message::initialization_complete(HERE).payload(),
            vec![0, 0, 0, 0, 0, 1]
        );
        assert_eq!(
            Message::datagram_rejected(HERE, THERE, 0x2020).payload(),
            vec![0x20, 0x20]
        );
        assert!(Message::datagram_received_ok(HERE, THERE, 0).payload().is_empty());
        assert_eq!(
            Message::datagram_received_ok(HERE, THERE, 0x82).payload(),
            vec![0x82]
        );
        assert_eq!(
            Message::stream_data_proceed(HERE, THERE, 7, 9).payload(),
            vec![7, 9]
        );
    }

    #[test]
    fn is_for_accepts_global_and_matching_destination() {
        assert!(Message::initialization_complete(THERE).is_for(HERE));
        assert!(Message::datagram_received_ok(THERE, HERE, 0).is_for(HERE));
        assert!(!Message::datagram_received_ok(HERE, THERE, 0).is_for(HERE));
    }
}
