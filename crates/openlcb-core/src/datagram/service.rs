use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use super::codes::{DatagramAck, describe, reject};
use super::error::DatagramError;
use super::segment::{Segment, SegmentAssembler};
use crate::clock_now;
use crate::config::DatagramConfig;
use crate::connection::Connection;
use crate::identity::NodeId;
use crate::protocols::message::{Message, MessageHandler};

pub type DatagramResult = Result<DatagramAck, DatagramError>;

type SendHandler = Box<dyn FnOnce(DatagramResult) + Send>;

/// A complete datagram received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingDatagram {
    pub source: NodeId,
    pub data: Vec<u8>,
}

impl IncomingDatagram {
    /// Leading byte used to route the datagram to a consumer.
    pub fn protocol_id(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

/// Receiver of datagrams for one protocol id.
///
/// The consumer owns the [`DatagramReply`] and must answer through it
/// exactly once. Until it does, further datagrams from the same peer are
/// turned away with "buffer unavailable".
pub trait DatagramConsumer: Send + Sync {
    fn handle_datagram(&self, datagram: IncomingDatagram, reply: DatagramReply);
}

impl<F> DatagramConsumer for F
where
    F: Fn(IncomingDatagram, DatagramReply) + Send + Sync,
{
    fn handle_datagram(&self, datagram: IncomingDatagram, reply: DatagramReply) {
        self(datagram, reply)
    }
}

/// One-shot answer to a received datagram.
///
/// Dropping the token without answering sends a permanent rejection.
pub struct DatagramReply {
    service: DatagramService,
    peer: NodeId,
    answered: bool,
}

impl DatagramReply {
    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Accept the datagram with the given `DatagramReceivedOk` flags.
    pub fn ack(mut self, flags: u8) {
        let message = Message::datagram_received_ok(self.service.inner.local, self.peer, flags);
        self.finish(message);
    }

    pub fn accept(self) {
        self.ack(0)
    }

    pub fn reject(mut self, code: u16) {
        let message = Message::datagram_rejected(self.service.inner.local, self.peer, code);
        self.finish(message);
    }

    fn finish(&mut self, message: Message) {
        self.answered = true;
        self.service.inner.awaiting_reply.remove(&self.peer);
        self.service.inner.connection.put(message);
    }
}

impl Drop for DatagramReply {
    fn drop(&mut self) {
        if !self.answered {
            warn!(peer = %self.peer, "datagram dropped without an answer, rejecting");
            let message = Message::datagram_rejected(
                self.service.inner.local,
                self.peer,
                reject::PERMANENT_ERROR,
            );
            self.finish(message);
        }
    }
}

impl fmt::Debug for DatagramReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatagramReply")
            .field("peer", &self.peer)
            .field("answered", &self.answered)
            .finish()
    }
}

/// Reliable datagram transport to and from remote nodes.
///
/// Sends to one peer are strictly serialized: the next queued datagram goes
/// out only after the previous one was acked, rejected or timed out, and
/// after its handler returned. Different peers proceed independently.
///
/// Cloning is cheap and every clone drives the same state.
#[derive(Clone)]
pub struct DatagramService {
    inner: Arc<Inner>,
}

struct Inner {
    local: NodeId,
    connection: Arc<dyn Connection>,
    config: DatagramConfig,
    // Shard lock guards the map, the per-peer mutex guards the transfer slot.
    outgoing: DashMap<NodeId, Mutex<Outgoing>>,
    awaiting_reply: DashSet<NodeId>,
    consumers: RwLock<HashMap<u8, Arc<dyn DatagramConsumer>>>,
    assembler: Mutex<SegmentAssembler>,
}

#[derive(Default)]
struct Outgoing {
    active: Option<InFlight>,
    queued: VecDeque<Queued>,
}

struct InFlight {
    message: Message,
    attempts: u32,
    deadline: Instant,
    handler: SendHandler,
}

struct Queued {
    message: Message,
    handler: SendHandler,
}

impl Outgoing {
    fn start_next(&mut self, now: Instant, timeout: Duration) -> Option<Message> {
        let next = self.queued.pop_front()?;
        self.active = Some(InFlight {
            message: next.message.clone(),
            attempts: 1,
            deadline: now + timeout,
            handler: next.handler,
        });
        Some(next.message)
    }

    fn len(&self) -> usize {
        self.queued.len() + usize::from(self.active.is_some())
    }
}

enum Action {
    Send(Message),
    Complete(SendHandler, DatagramResult),
}

impl Inner {
    fn with_outgoing<R>(&self, peer: NodeId, f: impl FnOnce(&mut Outgoing) -> R) -> R {
        if let Some(slot) = self.outgoing.get(&peer) {
            let mut state = slot.lock();
            return f(&mut state);
        }
        let slot = self.outgoing.entry(peer).or_default();
        let mut state = slot.lock();
        f(&mut state)
    }

    fn run(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(message) => self.connection.put(message),
                Action::Complete(handler, result) => handler(result),
            }
        }
    }
}

impl DatagramService {
    pub fn new(local: NodeId, connection: Arc<dyn Connection>, config: DatagramConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                connection,
                config: config.validated(),
                outgoing: DashMap::new(),
                awaiting_reply: DashSet::new(),
                consumers: RwLock::new(HashMap::new()),
                assembler: Mutex::new(SegmentAssembler::new()),
            }),
        }
    }

    pub fn local_node(&self) -> NodeId {
        self.inner.local
    }

    pub fn config(&self) -> DatagramConfig {
        self.inner.config
    }

    /// Queue `payload` for delivery to `peer`.
    ///
    /// Returns immediately; `handler` runs exactly once with the ack or the
    /// terminal failure.
    ///
    /// # Errors
    /// Payloads outside `1..=72` bytes are refused up front and the handler
    /// is dropped without being called.
    pub fn send_datagram<F>(
        &self,
        peer: NodeId,
        payload: Vec<u8>,
        handler: F,
    ) -> Result<(), DatagramError>
    where
        F: FnOnce(DatagramResult) + Send + 'static,
    {
        let message = Message::datagram(self.inner.local, peer, payload)?;
        let handler: SendHandler = Box::new(handler);
        let deadline = clock_now() + self.inner.config.timeout;
        let start = self.inner.with_outgoing(peer, |state| {
            if state.active.is_some() {
                state.queued.push_back(Queued { message, handler });
                return None;
            }
            state.active = Some(InFlight {
                message: message.clone(),
                attempts: 1,
                deadline,
                handler,
            });
            Some(message)
        });
        match start {
            Some(message) => {
                debug!(peer = %peer, "datagram sent");
                self.inner.connection.put(message);
            }
            None => trace!(peer = %peer, "datagram queued behind outstanding send"),
        }
        Ok(())
    }

    /// Route datagrams starting with `protocol_id` to `consumer`.
    ///
    /// Returns the consumer previously registered for that id.
    pub fn register_consumer(
        &self,
        protocol_id: u8,
        consumer: Arc<dyn DatagramConsumer>,
    ) -> Option<Arc<dyn DatagramConsumer>> {
        self.inner.consumers.write().insert(protocol_id, consumer)
    }

    /// Inbound delivery from the link layer.
    ///
    /// Messages addressed elsewhere and non-datagram messages are ignored.
    pub fn handle_message(&self, message: &Message) {
        if message.destination() != Some(self.inner.local) {
            return;
        }
        message.dispatch(self);
    }

    /// Inbound delivery of one link-level segment.
    pub fn handle_segment(&self, source: NodeId, destination: NodeId, segment: &Segment) {
        if destination != self.inner.local {
            return;
        }
        let result = self.inner.assembler.lock().push(source, destination, segment);
        match result {
            Ok(Some(payload)) => self.receive(source, payload),
            Ok(None) => {}
            Err(err) => {
                debug!(peer = %source, %err, "datagram reassembly failed");
                self.inner.connection.put(Message::datagram_rejected(
                    self.inner.local,
                    source,
                    err.reject_code(),
                ));
            }
        }
    }

    /// Resend or fail every send whose deadline is at or before `now`.
    pub fn poll_timeouts(&self, now: Instant) {
        let max_attempts = self.inner.config.max_attempts;
        let timeout = self.inner.config.timeout;
        let mut actions = Vec::new();
        for slot in self.inner.outgoing.iter() {
            let peer = *slot.key();
            let mut state = slot.lock();
            let Some(active) = state.active.as_mut() else {
                continue;
            };
            if active.deadline > now {
                continue;
            }
            if active.attempts < max_attempts {
                active.attempts += 1;
                active.deadline = now + timeout;
                debug!(peer = %peer, attempt = active.attempts, "datagram timed out, resending");
                actions.push(Action::Send(active.message.clone()));
            } else if let Some(expired) = state.active.take() {
                warn!(peer = %peer, attempts = expired.attempts, "datagram timed out, giving up");
                let error = DatagramError::Timeout {
                    attempts: expired.attempts,
                };
                actions.push(Action::Complete(expired.handler, Err(error)));
                if let Some(next) = state.start_next(now, timeout) {
                    actions.push(Action::Send(next));
                }
            }
        }
        self.inner.run(actions);
    }

    /// Tick [`poll_timeouts`](Self::poll_timeouts) every `period` forever.
    pub async fn run_timeouts(self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_timeouts(clock_now());
        }
    }

    /// Sends to `peer` that are in flight or queued.
    pub fn outstanding(&self, peer: NodeId) -> usize {
        self.inner
            .outgoing
            .get(&peer)
            .map(|slot| slot.lock().len())
            .unwrap_or(0)
    }

    fn complete_send(&self, peer: NodeId, result: DatagramResult) {
        let Some(slot) = self.inner.outgoing.get(&peer) else {
            debug!(peer = %peer, "answer from peer we never sent to, ignored");
            return;
        };
        let now = clock_now();
        let (finished, next) = {
            let mut state = slot.lock();
            let finished = state.active.take();
            let next = match finished {
                Some(_) => state.start_next(now, self.inner.config.timeout),
                None => None,
            };
            (finished, next)
        };
        drop(slot);

        let Some(finished) = finished else {
            debug!(peer = %peer, "answer without outstanding datagram, ignored");
            return;
        };
        let mut actions = vec![Action::Complete(finished.handler, result)];
        if let Some(next) = next {
            actions.push(Action::Send(next));
        }
        self.inner.run(actions);
    }

    fn receive(&self, source: NodeId, data: Vec<u8>) {
        if !self.inner.awaiting_reply.insert(source) {
            debug!(peer = %source, "previous datagram not answered yet, rejecting");
            self.inner.connection.put(Message::datagram_rejected(
                self.inner.local,
                source,
                reject::BUFFER_UNAVAILABLE,
            ));
            return;
        }
        let reply = DatagramReply {
            service: self.clone(),
            peer: source,
            answered: false,
        };
        let consumer = data
            .first()
            .and_then(|id| self.inner.consumers.read().get(id).cloned());
        let Some(consumer) = consumer else {
            debug!(peer = %source, protocol = ?data.first(), "no consumer for datagram");
            reply.reject(reject::DATAGRAM_TYPE_UNKNOWN);
            return;
        };
        trace!(peer = %source, len = data.len(), "datagram received");
        consumer.handle_datagram(IncomingDatagram { source, data }, reply);
    }
}

impl MessageHandler for DatagramService {
    fn handle_datagram(&self, message: &Message, data: &[u8]) {
        self.receive(message.source(), data.to_vec());
    }

    fn handle_datagram_received_ok(&self, message: &Message, flags: u8) {
        trace!(peer = %message.source(), flags, "datagram acknowledged");
        self.complete_send(message.source(), Ok(DatagramAck { flags }));
    }

    fn handle_datagram_rejected(&self, message: &Message, code: u16) {
        warn!(
            peer = %message.source(),
            code,
            reason = describe(code),
            "datagram rejected"
        );
        self.complete_send(message.source(), Err(DatagramError::Rejected { code }));
    }
}

impl fmt::Debug for DatagramService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatagramService")
            .field("local", &self.inner.local)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::{DatagramReply, DatagramService, IncomingDatagram};
    use crate::clock_now;
    use crate::config::DatagramConfig;
    use crate::connection::Connection;
    use crate::datagram::codes::reject;
    use crate::datagram::segment::split_datagram;
    use crate::identity::NodeId;
    use crate::protocols::message::{Message, MessageBody};

    #[derive(Default)]
    struct Recording(Mutex<Vec<Message>>);

    impl Connection for Recording {
        fn put(&self, message: Message) {
            self.0.lock().push(message);
        }
    }

    impl Recording {
        fn take(&self) -> Vec<MessageBody> {
            self.0.lock().drain(..).map(|m| m.body().clone()).collect()
        }
    }

    const LOCAL: NodeId = NodeId::new([0, 0, 0, 0, 0, 1]);
    const PEER: NodeId = NodeId::new([0, 0, 0, 0, 0, 2]);

    fn service() -> (DatagramService, Arc<Recording>) {
        let connection = Arc::new(Recording::default());
        let service = DatagramService::new(LOCAL, connection.clone(), DatagramConfig::default());
        (service, connection)
    }

    #[test]
    fn second_send_waits_for_first_ack() {
        let (service, connection) = service();
        service.send_datagram(PEER, vec![1], |_| {}).unwrap();
        service.send_datagram(PEER, vec![2], |_| {}).unwrap();
        assert_eq!(connection.take(), vec![MessageBody::Datagram { data: vec![1] }]);
        assert_eq!(service.outstanding(PEER), 2);

        service.handle_message(&Message::datagram_received_ok(PEER, LOCAL, 0));
        assert_eq!(connection.take(), vec![MessageBody::Datagram { data: vec![2] }]);
        assert_eq!(service.outstanding(PEER), 1);
    }

    #[test]
    fn oversized_payload_is_refused() {
        let (service, connection) = service();
        assert!(service.send_datagram(PEER, vec![0; 73], |_| {}).is_err());
        assert!(connection.take().is_empty());
    }

    #[test]
    fn stray_ack_is_ignored() {
        let (service, connection) = service();
        service.handle_message(&Message::datagram_received_ok(PEER, LOCAL, 0));
        assert!(connection.take().is_empty());
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        let (service, connection) = service();
        let datagram = Message::datagram(PEER, LOCAL, vec![0x99, 1]).unwrap();
        service.handle_message(&datagram);
        assert_eq!(
            connection.take(),
            vec![MessageBody::DatagramRejected {
                code: reject::DATAGRAM_TYPE_UNKNOWN
            }]
        );
    }

    #[test]
    fn unanswered_datagram_blocks_peer() {
        let (service, connection) = service();
        let held: Arc<Mutex<Vec<DatagramReply>>> = Arc::default();
        let sink = held.clone();
        service.register_consumer(
            0x20,
            Arc::new(move |_: IncomingDatagram, reply: DatagramReply| sink.lock().push(reply)),
        );
        let datagram = Message::datagram(PEER, LOCAL, vec![0x20, 1]).unwrap();
        service.handle_message(&datagram);
        service.handle_message(&datagram);
        assert_eq!(
            connection.take(),
            vec![MessageBody::DatagramRejected {
                code: reject::BUFFER_UNAVAILABLE
            }]
        );

        let reply = held.lock().pop().unwrap();
        reply.accept();
        service.handle_message(&datagram);
        assert_eq!(connection.take(), vec![MessageBody::DatagramReceivedOk { flags: 0 }]);
        assert_eq!(held.lock().len(), 1);
    }

    #[test]
    fn dropped_reply_rejects() {
        let (service, connection) = service();
        service.register_consumer(0x20, Arc::new(|_: IncomingDatagram, _: DatagramReply| {}));
        service.handle_message(&Message::datagram(PEER, LOCAL, vec![0x20]).unwrap());
        assert_eq!(
            connection.take(),
            vec![MessageBody::DatagramRejected {
                code: reject::PERMANENT_ERROR
            }]
        );
    }

    #[test]
    fn segments_are_reassembled_before_delivery() {
        let (service, _connection) = service();
        let received: Arc<Mutex<Vec<Vec<u8>>>> = Arc::default();
        let sink = received.clone();
        service.register_consumer(
            0x20,
            Arc::new(move |datagram: IncomingDatagram, reply: DatagramReply| {
                sink.lock().push(datagram.data);
                reply.accept();
            }),
        );
        let payload: Vec<u8> = (0x20..0x40).collect();
        for segment in split_datagram(&payload).unwrap() {
            service.handle_segment(PEER, LOCAL, &segment);
        }
        assert_eq!(*received.lock(), vec![payload]);
    }

    #[test]
    fn queued_send_starts_after_timeout_failure() {
        let (service, connection) = service();
        let failed = Arc::new(Mutex::new(None));
        let sink = failed.clone();
        service
            .send_datagram(PEER, vec![1], move |result| *sink.lock() = Some(result))
            .unwrap();
        service.send_datagram(PEER, vec![2], |_| {}).unwrap();
        connection.take();

        let start = clock_now();
        for step in 1..=3 {
            service.poll_timeouts(start + Duration::from_secs(4 * step));
        }
        assert!(failed.lock().as_ref().is_some_and(|result| result.is_err()));
        assert_eq!(
            connection.take(),
            vec![
                MessageBody::Datagram { data: vec![1] },
                MessageBody::Datagram { data: vec![1] },
                MessageBody::Datagram { data: vec![2] },
            ]
        );
    }
}
