use std::fmt;

use super::layout;

/// OpenLCB message type indicators handled by this crate.
///
/// The discriminant is the 16-bit MTI carried on the wire. Addressing and
/// event flags are bits of the code itself, see [`Mti::is_addressed`] and
/// [`Mti::carries_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Mti {
    InitializationComplete = 0x0100,
    InitializationCompleteSimple = 0x0101,
    VerifyNodeIdAddressed = 0x0488,
    VerifyNodeIdGlobal = 0x0490,
    VerifiedNodeId = 0x0170,
    VerifiedNodeIdSimple = 0x0171,
    OptionalInteractionRejected = 0x0068,
    TerminateDueToError = 0x00A8,
    ProtocolSupportInquiry = 0x0828,
    ProtocolSupportReply = 0x0668,
    IdentifyConsumers = 0x08F4,
    ConsumerRangeIdentified = 0x04A4,
    ConsumerIdentifiedValid = 0x04C4,
    ConsumerIdentifiedInvalid = 0x04C5,
    ConsumerIdentifiedReserved = 0x04C6,
    ConsumerIdentifiedUnknown = 0x04C7,
    IdentifyProducers = 0x0914,
    ProducerRangeIdentified = 0x0524,
    ProducerIdentifiedValid = 0x0544,
    ProducerIdentifiedInvalid = 0x0545,
    ProducerIdentifiedReserved = 0x0546,
    ProducerIdentifiedUnknown = 0x0547,
    IdentifyEventsAddressed = 0x0968,
    IdentifyEventsGlobal = 0x0970,
    LearnEvent = 0x0594,
    ProducerConsumerEventReport = 0x05B4,
    TractionControlCommand = 0x05EB,
    TractionControlReply = 0x01E9,
    RemoteButtonRequest = 0x0948,
    RemoteButtonReply = 0x0549,
    SimpleNodeIdentInfoRequest = 0x0DE8,
    SimpleNodeIdentInfoReply = 0x0A08,
    Datagram = 0x1C48,
    DatagramReceivedOk = 0x0A28,
    DatagramRejected = 0x0A48,
    StreamInitiateRequest = 0x0CC8,
    StreamInitiateReply = 0x0868,
    StreamDataSend = 0x1F88,
    StreamDataProceed = 0x0888,
    StreamDataComplete = 0x08A8,
}

impl Mti {
    pub const ALL: [Mti; 40] = [
        Mti::InitializationComplete,
        Mti::InitializationCompleteSimple,
        Mti::VerifyNodeIdAddressed,
        Mti::VerifyNodeIdGlobal,
        Mti::VerifiedNodeId,
        Mti::VerifiedNodeIdSimple,
        Mti::OptionalInteractionRejected,
        Mti::TerminateDueToError,
        Mti::ProtocolSupportInquiry,
        Mti::ProtocolSupportReply,
        Mti::IdentifyConsumers,
        Mti::ConsumerRangeIdentified,
        Mti::ConsumerIdentifiedValid,
        Mti::ConsumerIdentifiedInvalid,
        Mti::ConsumerIdentifiedReserved,
        Mti::ConsumerIdentifiedUnknown,
        Mti::IdentifyProducers,
        Mti::ProducerRangeIdentified,
        Mti::ProducerIdentifiedValid,
        Mti::ProducerIdentifiedInvalid,
        Mti::ProducerIdentifiedReserved,
        Mti::ProducerIdentifiedUnknown,
        Mti::IdentifyEventsAddressed,
        Mti::IdentifyEventsGlobal,
        Mti::LearnEvent,
        Mti::ProducerConsumerEventReport,
        Mti::TractionControlCommand,
        Mti::TractionControlReply,
        Mti::RemoteButtonRequest,
        Mti::RemoteButtonReply,
        Mti::SimpleNodeIdentInfoRequest,
        Mti::SimpleNodeIdentInfoReply,
        Mti::Datagram,
        Mti::DatagramReceivedOk,
        Mti::DatagramRejected,
        Mti::StreamInitiateRequest,
        Mti::StreamInitiateReply,
        Mti::StreamDataSend,
        Mti::StreamDataProceed,
        Mti::StreamDataComplete,
    ];

    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Mti> {
        Self::ALL.iter().copied().find(|mti| mti.code() == code)
    }

    pub const fn is_addressed(self) -> bool {
        self.code() & layout::MTI_ADDRESS_PRESENT != 0
    }

    pub const fn carries_event(self) -> bool {
        self.code() & layout::MTI_EVENT_PRESENT != 0
    }

    pub fn name(self) -> &'static str {
        match self {
            Mti::InitializationComplete => "Initialization Complete",
            Mti::InitializationCompleteSimple => "Initialization Complete Simple",
            Mti::VerifyNodeIdAddressed => "Verify Node ID Addressed",
            Mti::VerifyNodeIdGlobal => "Verify Node ID Global",
            Mti::VerifiedNodeId => "Verified Node ID",
            Mti::VerifiedNodeIdSimple => "Verified Node ID Simple",
            Mti::OptionalInteractionRejected => "Optional Interaction Rejected",
            Mti::TerminateDueToError => "Terminate Due To Error",
            Mti::ProtocolSupportInquiry => "Protocol Support Inquiry",
            Mti::ProtocolSupportReply => "Protocol Support Reply",
            Mti::IdentifyConsumers => "Identify Consumers",
            Mti::ConsumerRangeIdentified => "Consumer Range Identified",
            Mti::ConsumerIdentifiedValid => "Consumer Identified Valid",
            Mti::ConsumerIdentifiedInvalid => "Consumer Identified Invalid",
            Mti::ConsumerIdentifiedReserved => "Consumer Identified Reserved",
            Mti::ConsumerIdentifiedUnknown => "Consumer Identified Unknown",
            Mti::IdentifyProducers => "Identify Producers",
            Mti::ProducerRangeIdentified => "Producer Range Identified",
            Mti::ProducerIdentifiedValid => "Producer Identified Valid",
            Mti::ProducerIdentifiedInvalid => "Producer Identified Invalid",
            Mti::ProducerIdentifiedReserved => "Producer Identified Reserved",
            Mti::ProducerIdentifiedUnknown => "Producer Identified Unknown",
            Mti::IdentifyEventsAddressed => "Identify Events Addressed",
            Mti::IdentifyEventsGlobal => "Identify Events Global",
            Mti::LearnEvent => "Learn Event",
            Mti::ProducerConsumerEventReport => "Producer/Consumer Event Report",
            Mti::TractionControlCommand => "Traction Control Command",
            Mti::TractionControlReply => "Traction Control Reply",
            Mti::RemoteButtonRequest => "Remote Button Request",
            Mti::RemoteButtonReply => "Remote Button Reply",
            Mti::SimpleNodeIdentInfoRequest => "Simple Node Ident Info Request",
            Mti::SimpleNodeIdentInfoReply => "Simple Node Ident Info Reply",
            Mti::Datagram => "Datagram",
            Mti::DatagramReceivedOk => "Datagram Received OK",
            Mti::DatagramRejected => "Datagram Rejected",
            Mti::StreamInitiateRequest => "Stream Initiate Request",
            Mti::StreamInitiateReply => "Stream Initiate Reply",
            Mti::StreamDataSend => "Stream Data Send",
            Mti::StreamDataProceed => "Stream Data Proceed",
            Mti::StreamDataComplete => "Stream Data Complete",
        }
    }
}

impl fmt::Display for Mti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
