use super::Message;
use super::body::{EventState, ProtocolFlags};
use crate::identity::{EventId, NodeId};

/// Receiver side of message dispatch.
///
/// [`Message::dispatch`] calls exactly one method, chosen by the message
/// variant. Every method defaults to [`MessageHandler::unhandled`], so an
/// implementation only overrides what it cares about.
///
/// # Examples
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use openlcb_core::{EventId, Message, MessageHandler, NodeId};
///
/// #[derive(Default)]
/// struct Learned(AtomicUsize);
///
/// impl MessageHandler for Learned {
///     fn handle_learn_event(&self, _message: &Message, _event: EventId) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let handler = Learned::default();
/// let source = NodeId::new([0, 0, 0, 0, 0, 1]);
/// Message::learn_event(source, EventId::from_u64(7)).dispatch(&handler);
/// Message::initialization_complete(source).dispatch(&handler);
/// assert_eq!(handler.0.load(Ordering::SeqCst), 1);
/// ```
#[allow(unused_variables)]
pub trait MessageHandler {
    fn unhandled(&self, message: &Message) {}

    fn handle_initialization_complete(&self, message: &Message) {
        self.unhandled(message)
    }

    fn handle_initialization_complete_simple(&self, message: &Message) {
        self.unhandled(message)
    }

    fn handle_verify_node_id_addressed(&self, message: &Message, node: Option<NodeId>) {
        self.unhandled(message)
    }

    fn handle_verify_node_id_global(&self, message: &Message, node: Option<NodeId>) {
        self.unhandled(message)
    }

    fn handle_verified_node_id(&self, message: &Message, node: NodeId) {
        self.unhandled(message)
    }

    fn handle_verified_node_id_simple(&self, message: &Message, node: NodeId) {
        self.unhandled(message)
    }

    fn handle_optional_interaction_rejected(
        &self,
        message: &Message,
        code: u16,
        rejected_mti: u16,
    ) {
        self.unhandled(message)
    }

    fn handle_terminate_due_to_error(&self, message: &Message, code: u16, rejected_mti: u16) {
        self.unhandled(message)
    }

    fn handle_protocol_support_inquiry(&self, message: &Message) {
        self.unhandled(message)
    }

    fn handle_protocol_support_reply(&self, message: &Message, protocols: ProtocolFlags) {
        self.unhandled(message)
    }

    fn handle_identify_consumers(&self, message: &Message, event: EventId) {
        self.unhandled(message)
    }

    fn handle_consumer_range_identified(&self, message: &Message, event: EventId) {
        self.unhandled(message)
    }

    fn handle_consumer_identified(&self, message: &Message, event: EventId, state: EventState) {
        self.unhandled(message)
    }

    fn handle_identify_producers(&self, message: &Message, event: EventId) {
        self.unhandled(message)
    }

    fn handle_producer_range_identified(&self, message: &Message, event: EventId) {
        self.unhandled(message)
    }

    fn handle_producer_identified(&self, message: &Message, event: EventId, state: EventState) {
        self.unhandled(message)
    }

    fn handle_identify_events_addressed(&self, message: &Message) {
        self.unhandled(message)
    }

    fn handle_identify_events_global(&self, message: &Message) {
        self.unhandled(message)
    }

    fn handle_learn_event(&self, message: &Message, event: EventId) {
        self.unhandled(message)
    }

    fn handle_producer_consumer_event_report(&self, message: &Message, event: EventId) {
        self.unhandled(message)
    }

    fn handle_traction_control_command(&self, message: &Message, data: &[u8]) {
        self.unhandled(message)
    }

    fn handle_traction_control_reply(&self, message: &Message, data: &[u8]) {
        self.unhandled(message)
    }

    fn handle_remote_button_request(&self, message: &Message, data: &[u8]) {
        self.unhandled(message)
    }

    fn handle_remote_button_reply(&self, message: &Message, data: &[u8]) {
        self.unhandled(message)
    }

    fn handle_simple_node_ident_info_request(&self, message: &Message) {
        self.unhandled(message)
    }

    fn handle_simple_node_ident_info_reply(&self, message: &Message, data: &[u8]) {
        self.unhandled(message)
    }

    fn handle_datagram(&self, message: &Message, data: &[u8]) {
        self.unhandled(message)
    }

    fn handle_datagram_received_ok(&self, message: &Message, flags: u8) {
        self.unhandled(message)
    }

    fn handle_datagram_rejected(&self, message: &Message, code: u16) {
        self.unhandled(message)
    }

    fn handle_stream_initiate_request(
        &self,
        message: &Message,
        max_buffer_size: u16,
        flags: u16,
        source_stream_id: u8,
        destination_stream_id: u8,
    ) {
        self.unhandled(message)
    }

    fn handle_stream_initiate_reply(
        &self,
        message: &Message,
        max_buffer_size: u16,
        flags: u16,
        source_stream_id: u8,
        destination_stream_id: u8,
    ) {
        self.unhandled(message)
    }

    fn handle_stream_data_send(&self, message: &Message, destination_stream_id: u8, data: &[u8]) {
        self.unhandled(message)
    }

    fn handle_stream_data_proceed(
        &self,
        message: &Message,
        source_stream_id: u8,
        destination_stream_id: u8,
    ) {
        self.unhandled(message)
    }

    fn handle_stream_data_complete(
        &self,
        message: &Message,
        source_stream_id: u8,
        destination_stream_id: u8,
    ) {
        self.unhandled(message)
    }
}
