use super::body::{EventState, MessageBody, ProtocolFlags};
use super::error::MessageError;
use super::layout;
use super::mti::Mti;
use super::reader::MessageReader;
use super::{Message, WireMessage};

/// Decode a wire message into a typed [`Message`].
///
/// # Errors
/// Unknown MTIs, destination mismatches and payloads of the wrong width are
/// rejected; nothing is silently truncated except the documented optional
/// trailers (`DatagramRejected` may carry two extra bytes).
pub fn parse_message(wire: &WireMessage) -> Result<Message, MessageError> {
    let mti = Mti::from_code(wire.mti).ok_or(MessageError::UnknownMti { mti: wire.mti })?;
    let reader = MessageReader::new(&wire.payload);
    let body = parse_body(mti, wire, &reader).map_err(|err| err.in_message(mti))?;
    Message::new(wire.source, wire.destination, body)
}

fn parse_body(
    mti: Mti,
    wire: &WireMessage,
    reader: &MessageReader<'_>,
) -> Result<MessageBody, MessageError> {
    let body = match mti {
        Mti::InitializationComplete | Mti::InitializationCompleteSimple => {
            require_exact(mti, reader, layout::NODE_ID_RANGE.end)?;
            let node = reader.read_node_id()?;
            if node != wire.source {
                return Err(MessageError::malformed(
                    mti,
                    format!("announced node {} differs from source {}", node, wire.source),
                ));
            }
            if mti == Mti::InitializationComplete {
                MessageBody::InitializationComplete
            } else {
                MessageBody::InitializationCompleteSimple
            }
        }
        Mti::VerifyNodeIdAddressed => MessageBody::VerifyNodeIdAddressed {
            node: optional_node(mti, reader)?,
        },
        Mti::VerifyNodeIdGlobal => MessageBody::VerifyNodeIdGlobal {
            node: optional_node(mti, reader)?,
        },
        Mti::VerifiedNodeId => {
            require_exact(mti, reader, layout::NODE_ID_RANGE.end)?;
            MessageBody::VerifiedNodeId {
                node: reader.read_node_id()?,
            }
        }
        Mti::VerifiedNodeIdSimple => {
            require_exact(mti, reader, layout::NODE_ID_RANGE.end)?;
            MessageBody::VerifiedNodeIdSimple {
                node: reader.read_node_id()?,
            }
        }
        Mti::OptionalInteractionRejected | Mti::TerminateDueToError => {
            let (code, rejected_mti) = error_with_mti(mti, reader)?;
            if mti == Mti::OptionalInteractionRejected {
                MessageBody::OptionalInteractionRejected { code, rejected_mti }
            } else {
                MessageBody::TerminateDueToError { code, rejected_mti }
            }
        }
        Mti::ProtocolSupportInquiry => {
            require_exact(mti, reader, 0)?;
            MessageBody::ProtocolSupportInquiry
        }
        Mti::ProtocolSupportReply => {
            let len = reader.len();
            if !(layout::PROTOCOL_FLAGS_MIN_LEN..=layout::PROTOCOL_FLAGS_LEN).contains(&len) {
                return Err(MessageError::malformed(
                    mti,
                    format!("protocol flags must be 3..=6 bytes, got {len}"),
                ));
            }
            MessageBody::ProtocolSupportReply {
                protocols: ProtocolFlags::from_bits(
                    reader.read_left_aligned(layout::PROTOCOL_FLAGS_LEN),
                ),
            }
        }
        Mti::IdentifyConsumers => MessageBody::IdentifyConsumers {
            event: event(mti, reader)?,
        },
        Mti::ConsumerRangeIdentified => MessageBody::ConsumerRangeIdentified {
            event: event(mti, reader)?,
        },
        Mti::ConsumerIdentifiedValid
        | Mti::ConsumerIdentifiedInvalid
        | Mti::ConsumerIdentifiedReserved
        | Mti::ConsumerIdentifiedUnknown => MessageBody::ConsumerIdentified {
            event: event(mti, reader)?,
            state: identified_state(mti),
        },
        Mti::IdentifyProducers => MessageBody::IdentifyProducers {
            event: event(mti, reader)?,
        },
        Mti::ProducerRangeIdentified => MessageBody::ProducerRangeIdentified {
            event: event(mti, reader)?,
        },
        Mti::ProducerIdentifiedValid
        | Mti::ProducerIdentifiedInvalid
        | Mti::ProducerIdentifiedReserved
        | Mti::ProducerIdentifiedUnknown => MessageBody::ProducerIdentified {
            event: event(mti, reader)?,
            state: identified_state(mti),
        },
        Mti::IdentifyEventsAddressed => {
            require_exact(mti, reader, 0)?;
            MessageBody::IdentifyEventsAddressed
        }
        Mti::IdentifyEventsGlobal => {
            require_exact(mti, reader, 0)?;
            MessageBody::IdentifyEventsGlobal
        }
        Mti::LearnEvent => MessageBody::LearnEvent {
            event: event(mti, reader)?,
        },
        Mti::ProducerConsumerEventReport => MessageBody::ProducerConsumerEventReport {
            event: event(mti, reader)?,
        },
        Mti::TractionControlCommand => MessageBody::TractionControlCommand {
            data: wire.payload.clone(),
        },
        Mti::TractionControlReply => MessageBody::TractionControlReply {
            data: wire.payload.clone(),
        },
        Mti::RemoteButtonRequest => MessageBody::RemoteButtonRequest {
            data: wire.payload.clone(),
        },
        Mti::RemoteButtonReply => MessageBody::RemoteButtonReply {
            data: wire.payload.clone(),
        },
        Mti::SimpleNodeIdentInfoRequest => {
            require_exact(mti, reader, 0)?;
            MessageBody::SimpleNodeIdentInfoRequest
        }
        Mti::SimpleNodeIdentInfoReply => MessageBody::SimpleNodeIdentInfoReply {
            data: wire.payload.clone(),
        },
        Mti::Datagram => MessageBody::Datagram {
            data: wire.payload.clone(),
        },
        Mti::DatagramReceivedOk => {
            if reader.len() > layout::DATAGRAM_OK_MAX_LEN {
                return Err(MessageError::malformed(
                    mti,
                    format!("flags must be 0 or 1 byte, got {}", reader.len()),
                ));
            }
            let flags = if reader.is_empty() {
                0
            } else {
                reader.read_u8(layout::DATAGRAM_OK_FLAGS_OFFSET)?
            };
            MessageBody::DatagramReceivedOk { flags }
        }
        Mti::DatagramRejected => {
            let len = reader.len();
            if !(layout::DATAGRAM_REJECTED_CODE_RANGE.end..=layout::DATAGRAM_REJECTED_MAX_LEN)
                .contains(&len)
            {
                return Err(MessageError::malformed(
                    mti,
                    format!("rejection code must be 2..=4 bytes, got {len}"),
                ));
            }
            MessageBody::DatagramRejected {
                code: reader.read_u16_be(layout::DATAGRAM_REJECTED_CODE_RANGE)?,
            }
        }
        Mti::StreamInitiateRequest | Mti::StreamInitiateReply => {
            require_exact(mti, reader, layout::STREAM_INITIATE_LEN)?;
            let max_buffer_size = reader.read_u16_be(layout::STREAM_MAX_BUFFER_RANGE)?;
            let flags = reader.read_u16_be(layout::STREAM_FLAGS_RANGE)?;
            let source_stream_id = reader.read_u8(layout::STREAM_SOURCE_ID_OFFSET)?;
            let destination_stream_id = reader.read_u8(layout::STREAM_DEST_ID_OFFSET)?;
            if mti == Mti::StreamInitiateRequest {
                MessageBody::StreamInitiateRequest {
                    max_buffer_size,
                    flags,
                    source_stream_id,
                    destination_stream_id,
                }
            } else {
                MessageBody::StreamInitiateReply {
                    max_buffer_size,
                    flags,
                    source_stream_id,
                    destination_stream_id,
                }
            }
        }
        Mti::StreamDataSend => {
            reader.require_len(layout::STREAM_SEND_DATA_OFFSET + 1)?;
            MessageBody::StreamDataSend {
                destination_stream_id: reader.read_u8(layout::STREAM_SEND_DEST_ID_OFFSET)?,
                data: reader.read_rest(layout::STREAM_SEND_DATA_OFFSET)?.to_vec(),
            }
        }
        Mti::StreamDataProceed | Mti::StreamDataComplete => {
            require_exact(mti, reader, layout::STREAM_IDS_LEN)?;
            let source_stream_id = reader.read_u8(layout::STREAM_IDS_SOURCE_OFFSET)?;
            let destination_stream_id = reader.read_u8(layout::STREAM_IDS_DEST_OFFSET)?;
            if mti == Mti::StreamDataProceed {
                MessageBody::StreamDataProceed {
                    source_stream_id,
                    destination_stream_id,
                }
            } else {
                MessageBody::StreamDataComplete {
                    source_stream_id,
                    destination_stream_id,
                }
            }
        }
    };
    Ok(body)
}

fn require_exact(mti: Mti, reader: &MessageReader<'_>, len: usize) -> Result<(), MessageError> {
    if reader.len() != len {
        return Err(MessageError::malformed(
            mti,
            format!("expected {len} bytes, got {}", reader.len()),
        ));
    }
    Ok(())
}

fn optional_node(
    mti: Mti,
    reader: &MessageReader<'_>,
) -> Result<Option<crate::identity::NodeId>, MessageError> {
    if reader.is_empty() {
        return Ok(None);
    }
    require_exact(mti, reader, layout::NODE_ID_RANGE.end)?;
    reader.read_node_id().map(Some)
}

fn event(mti: Mti, reader: &MessageReader<'_>) -> Result<crate::identity::EventId, MessageError> {
    require_exact(mti, reader, layout::EVENT_ID_RANGE.end)?;
    reader.read_event_id()
}

fn error_with_mti(mti: Mti, reader: &MessageReader<'_>) -> Result<(u16, u16), MessageError> {
    match reader.len() {
        layout::ERROR_CODE_ONLY_LEN => Ok((reader.read_u16_be(layout::ERROR_CODE_RANGE)?, 0)),
        layout::ERROR_WITH_MTI_LEN => Ok((
            reader.read_u16_be(layout::ERROR_CODE_RANGE)?,
            reader.read_u16_be(layout::REJECTED_MTI_RANGE)?,
        )),
        len => Err(MessageError::malformed(
            mti,
            format!("expected 2 or 4 bytes, got {len}"),
        )),
    }
}

fn identified_state(mti: Mti) -> EventState {
    match mti {
        Mti::ConsumerIdentifiedValid | Mti::ProducerIdentifiedValid => EventState::Valid,
        Mti::ConsumerIdentifiedInvalid | Mti::ProducerIdentifiedInvalid => EventState::Invalid,
        Mti::ConsumerIdentifiedReserved | Mti::ProducerIdentifiedReserved => EventState::Reserved,
        _ => EventState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_message;
    use crate::identity::{EventId, NodeId};
    use crate::protocols::message::{
        EventState, Message, MessageBody, MessageError, Mti, ProtocolFlags, WireMessage,
    };

    const HERE: NodeId = NodeId::new([0, 0, 0, 0, 0, 1]);
    const THERE: NodeId = NodeId::new([0, 0, 0, 0, 0, 2]);

    fn wire(mti: u16, destination: Option<NodeId>, payload: &[u8]) -> WireMessage {
        WireMessage {
            mti,
            source: HERE,
            destination,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn parse_learn_event() {
        let parsed = parse_message(&wire(0x0594, None, &[1, 2, 3, 4, 5, 6, 7, 8])).unwrap();
        assert_eq!(
            parsed,
            Message::learn_event(HERE, EventId::from_u64(0x0102_0304_0506_0708))
        );
    }

    #[test]
    fn parse_learn_event_wrong_width() {
        let err = parse_message(&wire(0x0594, None, &[1, 2, 3, 4, 5, 6])).unwrap_err();
        assert!(matches!(
            err,
            MessageError::MalformedPayload {
                mti: Mti::LearnEvent,
                ..
            }
        ));
        assert!(err.to_string().contains("expected 8 bytes, got 6"));
    }

    #[test]
    fn parse_unknown_mti() {
        let err = parse_message(&wire(0x0000, None, &[])).unwrap_err();
        assert_eq!(err, MessageError::UnknownMti { mti: 0 });
    }

    #[test]
    fn parse_initialization_complete_checks_announced_node() {
        let parsed = parse_message(&wire(0x0100, None, &[0, 0, 0, 0, 0, 1])).unwrap();
        assert_eq!(parsed, Message::initialization_complete(HERE));
        let err = parse_message(&wire(0x0100, None, &[0, 0, 0, 0, 0, 2])).unwrap_err();
        assert!(err.to_string().contains("differs from source"));
    }

    #[test]
    fn parse_short_protocol_reply_left_aligns() {
        let parsed = parse_message(&wire(0x0668, Some(THERE), &[0x54, 0x18, 0x00])).unwrap();
        let MessageBody::ProtocolSupportReply { protocols } = parsed.body() else {
            panic!("unexpected body {parsed}");
        };
        assert!(protocols.contains(ProtocolFlags::DATAGRAM));
        assert!(protocols.contains(ProtocolFlags::MEMORY_CONFIGURATION));
        assert!(protocols.contains(ProtocolFlags::EVENT_EXCHANGE));
        assert!(protocols.contains(ProtocolFlags::SNIP));
        assert!(protocols.contains(ProtocolFlags::CDI));
        assert!(!protocols.contains(ProtocolFlags::STREAM));
    }

    #[test]
    fn parse_datagram_requires_destination() {
        let err = parse_message(&wire(0x1C48, None, &[0x20])).unwrap_err();
        assert_eq!(err, MessageError::MissingDestination { mti: Mti::Datagram });
    }

    #[test]
    fn parse_datagram_rejected_ignores_trailer() {
        let parsed = parse_message(&wire(0x0A48, Some(THERE), &[0x10, 0x40, 0x1C, 0x48])).unwrap();
        assert_eq!(parsed, Message::datagram_rejected(HERE, THERE, 0x1040));
        assert!(parse_message(&wire(0x0A48, Some(THERE), &[0x10])).is_err());
    }

    #[test]
    fn parse_identified_states() {
        let payload = [0, 0, 0, 0, 0, 0, 0, 5];
        let parsed = parse_message(&wire(0x0546, None, &payload)).unwrap();
        assert_eq!(
            parsed.body(),
            &MessageBody::ProducerIdentified {
                event: EventId::from_u64(5),
                state: EventState::Reserved
            }
        );
        assert_eq!(parsed.mti().code(), 0x0546);
    }

    #[test]
    fn parse_stream_data_proceed_rejects_extra_bytes() {
        let parsed = parse_message(&wire(0x0888, Some(THERE), &[3, 4])).unwrap();
        assert_eq!(parsed, Message::stream_data_proceed(HERE, THERE, 3, 4));
        assert!(parse_message(&wire(0x0888, Some(THERE), &[3, 4, 0, 0])).is_err());
    }

    #[test]
    fn parse_stream_data_send_splits_stream_id() {
        let parsed = parse_message(&wire(0x1F88, Some(THERE), &[9, 0xAA, 0xBB])).unwrap();
        assert_eq!(
            parsed.body(),
            &MessageBody::StreamDataSend {
                destination_stream_id: 9,
                data: vec![0xAA, 0xBB]
            }
        );
        assert!(parse_message(&wire(0x1F88, Some(THERE), &[9])).is_err());
    }
}
