use std::fmt;

use super::mti::Mti;
use crate::identity::{EventId, NodeId};

/// Validity state reported by Consumer/Producer Identified messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventState {
    Valid,
    Invalid,
    Reserved,
    Unknown,
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EventState::Valid => "valid",
            EventState::Invalid => "invalid",
            EventState::Reserved => "reserved",
            EventState::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// 48-bit protocol support bitmap, left aligned as on the wire.
///
/// # Examples
/// ```
/// use openlcb_core::ProtocolFlags;
///
/// let flags = ProtocolFlags::DATAGRAM | ProtocolFlags::MEMORY_CONFIGURATION;
/// assert!(flags.contains(ProtocolFlags::DATAGRAM));
/// assert!(!flags.contains(ProtocolFlags::STREAM));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProtocolFlags(u64);

impl ProtocolFlags {
    pub const SIMPLE: ProtocolFlags = ProtocolFlags(0x8000_0000_0000);
    pub const DATAGRAM: ProtocolFlags = ProtocolFlags(0x4000_0000_0000);
    pub const STREAM: ProtocolFlags = ProtocolFlags(0x2000_0000_0000);
    pub const MEMORY_CONFIGURATION: ProtocolFlags = ProtocolFlags(0x1000_0000_0000);
    pub const RESERVATION: ProtocolFlags = ProtocolFlags(0x0800_0000_0000);
    pub const EVENT_EXCHANGE: ProtocolFlags = ProtocolFlags(0x0400_0000_0000);
    pub const IDENTIFICATION: ProtocolFlags = ProtocolFlags(0x0200_0000_0000);
    pub const TEACH_LEARN: ProtocolFlags = ProtocolFlags(0x0100_0000_0000);
    pub const REMOTE_BUTTON: ProtocolFlags = ProtocolFlags(0x0080_0000_0000);
    pub const ACDI: ProtocolFlags = ProtocolFlags(0x0040_0000_0000);
    pub const DISPLAY: ProtocolFlags = ProtocolFlags(0x0020_0000_0000);
    pub const SNIP: ProtocolFlags = ProtocolFlags(0x0010_0000_0000);
    pub const CDI: ProtocolFlags = ProtocolFlags(0x0008_0000_0000);
    pub const TRACTION: ProtocolFlags = ProtocolFlags(0x0004_0000_0000);
    pub const FDI: ProtocolFlags = ProtocolFlags(0x0002_0000_0000);
    pub const DCC_COMMAND_STATION: ProtocolFlags = ProtocolFlags(0x0001_0000_0000);
    pub const SIMPLE_TRAIN_NODE: ProtocolFlags = ProtocolFlags(0x0000_8000_0000);
    pub const FUNCTION_CONFIGURATION: ProtocolFlags = ProtocolFlags(0x0000_4000_0000);
    pub const FIRMWARE_UPGRADE: ProtocolFlags = ProtocolFlags(0x0000_2000_0000);
    pub const FIRMWARE_UPGRADE_ACTIVE: ProtocolFlags = ProtocolFlags(0x0000_1000_0000);

    const MASK: u64 = 0xFFFF_FFFF_FFFF;

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: ProtocolFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn to_bytes(self) -> [u8; 6] {
        let raw = self.0.to_be_bytes();
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&raw[2..]);
        bytes
    }
}

impl std::ops::BitOr for ProtocolFlags {
    type Output = ProtocolFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ProtocolFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for ProtocolFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:012X}", self.0)
    }
}

/// Variant payload of a [`Message`](super::Message).
///
/// Each variant maps to exactly one MTI, except the Identified variants
/// whose [`EventState`] selects among four codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageBody {
    InitializationComplete,
    InitializationCompleteSimple,
    VerifyNodeIdAddressed { node: Option<NodeId> },
    VerifyNodeIdGlobal { node: Option<NodeId> },
    VerifiedNodeId { node: NodeId },
    VerifiedNodeIdSimple { node: NodeId },
    OptionalInteractionRejected { code: u16, rejected_mti: u16 },
    TerminateDueToError { code: u16, rejected_mti: u16 },
    ProtocolSupportInquiry,
    ProtocolSupportReply { protocols: ProtocolFlags },
    IdentifyConsumers { event: EventId },
    ConsumerRangeIdentified { event: EventId },
    ConsumerIdentified { event: EventId, state: EventState },
    IdentifyProducers { event: EventId },
    ProducerRangeIdentified { event: EventId },
    ProducerIdentified { event: EventId, state: EventState },
    IdentifyEventsAddressed,
    IdentifyEventsGlobal,
    LearnEvent { event: EventId },
    ProducerConsumerEventReport { event: EventId },
    TractionControlCommand { data: Vec<u8> },
    TractionControlReply { data: Vec<u8> },
    RemoteButtonRequest { data: Vec<u8> },
    RemoteButtonReply { data: Vec<u8> },
    SimpleNodeIdentInfoRequest,
    SimpleNodeIdentInfoReply { data: Vec<u8> },
    Datagram { data: Vec<u8> },
    DatagramReceivedOk { flags: u8 },
    DatagramRejected { code: u16 },
    StreamInitiateRequest {
        max_buffer_size: u16,
        flags: u16,
        source_stream_id: u8,
        destination_stream_id: u8,
    },
    StreamInitiateReply {
        max_buffer_size: u16,
        flags: u16,
        source_stream_id: u8,
        destination_stream_id: u8,
    },
    StreamDataSend { destination_stream_id: u8, data: Vec<u8> },
    StreamDataProceed { source_stream_id: u8, destination_stream_id: u8 },
    StreamDataComplete { source_stream_id: u8, destination_stream_id: u8 },
}

impl MessageBody {
    pub fn mti(&self) -> Mti {
        match self {
            MessageBody::InitializationComplete => Mti::InitializationComplete,
            MessageBody::InitializationCompleteSimple => Mti::InitializationCompleteSimple,
            MessageBody::VerifyNodeIdAddressed { .. } => Mti::VerifyNodeIdAddressed,
            MessageBody::VerifyNodeIdGlobal { .. } => Mti::VerifyNodeIdGlobal,
            MessageBody::VerifiedNodeId { .. } => Mti::VerifiedNodeId,
            MessageBody::VerifiedNodeIdSimple { .. } => Mti::VerifiedNodeIdSimple,
            MessageBody::OptionalInteractionRejected { .. } => Mti::OptionalInteractionRejected,
            MessageBody::TerminateDueToError { .. } => Mti::TerminateDueToError,
            MessageBody::ProtocolSupportInquiry => Mti::ProtocolSupportInquiry,
            MessageBody::ProtocolSupportReply { .. } => Mti::ProtocolSupportReply,
            MessageBody::IdentifyConsumers { .. } => Mti::IdentifyConsumers,
            MessageBody::ConsumerRangeIdentified { .. } => Mti::ConsumerRangeIdentified,
            MessageBody::ConsumerIdentified { state, .. } => match state {
                EventState::Valid => Mti::ConsumerIdentifiedValid,
                EventState::Invalid => Mti::ConsumerIdentifiedInvalid,
                EventState::Reserved => Mti::ConsumerIdentifiedReserved,
                EventState::Unknown => Mti::ConsumerIdentifiedUnknown,
            },
            MessageBody::IdentifyProducers { .. } => Mti::IdentifyProducers,
            MessageBody::ProducerRangeIdentified { .. } => Mti::ProducerRangeIdentified,
            MessageBody::ProducerIdentified { state, .. } => match state {
                EventState::Valid => Mti::ProducerIdentifiedValid,
                EventState::Invalid => Mti::ProducerIdentifiedInvalid,
                EventState::Reserved => Mti::ProducerIdentifiedReserved,
                EventState::Unknown => Mti::ProducerIdentifiedUnknown,
            },
            MessageBody::IdentifyEventsAddressed => Mti::IdentifyEventsAddressed,
            MessageBody::IdentifyEventsGlobal => Mti::IdentifyEventsGlobal,
            MessageBody::LearnEvent { .. } => Mti::LearnEvent,
            MessageBody::ProducerConsumerEventReport { .. } => Mti::ProducerConsumerEventReport,
            MessageBody::TractionControlCommand { .. } => Mti::TractionControlCommand,
            MessageBody::TractionControlReply { .. } => Mti::TractionControlReply,
            MessageBody::RemoteButtonRequest { .. } => Mti::RemoteButtonRequest,
            MessageBody::RemoteButtonReply { .. } => Mti::RemoteButtonReply,
            MessageBody::SimpleNodeIdentInfoRequest => Mti::SimpleNodeIdentInfoRequest,
            MessageBody::SimpleNodeIdentInfoReply { .. } => Mti::SimpleNodeIdentInfoReply,
            MessageBody::Datagram { .. } => Mti::Datagram,
            MessageBody::DatagramReceivedOk { .. } => Mti::DatagramReceivedOk,
            MessageBody::DatagramRejected { .. } => Mti::DatagramRejected,
            MessageBody::StreamInitiateRequest { .. } => Mti::StreamInitiateRequest,
            MessageBody::StreamInitiateReply { .. } => Mti::StreamInitiateReply,
            MessageBody::StreamDataSend { .. } => Mti::StreamDataSend,
            MessageBody::StreamDataProceed { .. } => Mti::StreamDataProceed,
            MessageBody::StreamDataComplete { .. } => Mti::StreamDataComplete,
        }
    }
}
