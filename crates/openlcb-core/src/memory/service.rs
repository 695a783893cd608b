use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use super::error::{MemoryError, WriteFailure};
use super::operation::{Action, OpKind, Operation, PeerOps, Phase, ReadData};
use crate::clock_now;
use crate::config::MemoryConfig;
use crate::datagram::codes::reject;
use crate::datagram::{
    DatagramConsumer, DatagramReply, DatagramResult, DatagramService, IncomingDatagram,
};
use crate::identity::NodeId;
use crate::protocols::memconfig::{self, MemConfigError, McsReply, SpaceInfo};

const ADDRESS_SPACE_END: u64 = 1 << 32;

/// Client side of the memory configuration protocol.
///
/// Each request is split into chunks of at most 64 bytes, sent one at a
/// time in ascending address order. Only one operation per peer is active;
/// later requests to the same peer wait in FIFO order and start only after
/// the previous handler returned.
///
/// Creating the service registers it with the datagram service as the
/// consumer for protocol id `0x20`.
#[derive(Clone)]
pub struct MemoryConfigService {
    inner: Arc<Inner>,
}

struct Inner {
    datagrams: DatagramService,
    config: MemoryConfig,
    peers: DashMap<NodeId, Mutex<PeerOps>>,
    next_id: AtomicU64,
}

/// Handle to a submitted operation.
#[derive(Clone)]
pub struct OperationHandle {
    inner: Weak<Inner>,
    peer: NodeId,
    id: u64,
}

impl OperationHandle {
    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Cancel the operation.
    ///
    /// Returns true when the cancellation won: the handler then runs once
    /// with [`MemoryError::Cancelled`]. Returns false when the operation had
    /// already finished, in which case its handler got the real outcome.
    pub fn cancel(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.cancel(self.peer, self.id))
    }
}

impl fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("peer", &self.peer)
            .field("id", &self.id)
            .finish()
    }
}

impl Inner {
    fn with_peer<R>(&self, peer: NodeId, f: impl FnOnce(&mut PeerOps) -> R) -> R {
        if let Some(slot) = self.peers.get(&peer) {
            let mut state = slot.lock();
            return f(&mut state);
        }
        let slot = self.peers.entry(peer).or_default();
        let mut state = slot.lock();
        f(&mut state)
    }

    fn with_existing_peer<R>(&self, peer: NodeId, f: impl FnOnce(&mut PeerOps) -> R) -> Option<R> {
        let slot = self.peers.get(&peer)?;
        let mut state = slot.lock();
        Some(f(&mut state))
    }

    fn run(self: &Arc<Self>, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Complete(done) => done(),
                Action::Send {
                    peer,
                    id,
                    seq,
                    request,
                } => {
                    trace!(peer = %peer, id, seq, ?request, "memory configuration request");
                    let weak = Arc::downgrade(self);
                    let sent = request
                        .encode()
                        .map_err(MemoryError::from)
                        .and_then(|payload| {
                            self.datagrams
                                .send_datagram(peer, payload, move |result| {
                                    if let Some(inner) = weak.upgrade() {
                                        inner.on_sent(peer, id, seq, result);
                                    }
                                })
                                .map_err(MemoryError::from)
                        });
                    if let Err(error) = sent {
                        self.abort(peer, id, seq, error);
                    }
                }
            }
        }
    }

    fn abort(self: &Arc<Self>, peer: NodeId, id: u64, seq: u64, error: MemoryError) {
        let actions = self
            .with_existing_peer(peer, |state| {
                if state.is_current(id, seq) {
                    state.finish(Err(error), &self.config)
                } else {
                    Vec::new()
                }
            })
            .unwrap_or_default();
        self.run(actions);
    }

    fn on_sent(self: &Arc<Self>, peer: NodeId, id: u64, seq: u64, result: DatagramResult) {
        let ack = match result {
            Ok(ack) => ack,
            Err(error) => {
                debug!(peer = %peer, id, %error, "memory configuration request failed");
                self.abort(peer, id, seq, error.into());
                return;
            }
        };
        let now = clock_now();
        let actions = self
            .with_existing_peer(peer, |state| {
                if !state.is_current(id, seq) {
                    return Vec::new();
                }
                let Some(active) = state.active.as_mut() else {
                    return Vec::new();
                };
                if active.phase != Phase::Sending {
                    return Vec::new();
                }
                if active.is_write() && !ack.reply_pending() {
                    return state.write_chunk_done(&self.config);
                }
                let window = ack
                    .reply_timeout()
                    .map_or(self.config.reply_timeout, |announced| {
                        announced.max(self.config.reply_timeout)
                    });
                active.phase = Phase::AwaitingReply {
                    deadline: now + window,
                };
                Vec::new()
            })
            .unwrap_or_default();
        self.run(actions);
    }

    fn on_reply(self: &Arc<Self>, peer: NodeId, reply: McsReply) {
        let actions = self
            .with_existing_peer(peer, |state| state.apply_reply(reply, &self.config))
            .unwrap_or_default();
        self.run(actions);
    }

    fn cancel(self: &Arc<Self>, peer: NodeId, id: u64) -> bool {
        let actions = self
            .with_existing_peer(peer, |state| {
                if state.active.as_ref().is_some_and(|active| active.op.id == id) {
                    return Some(state.finish(Err(MemoryError::Cancelled), &self.config));
                }
                let position = state.queued.iter().position(|op| op.id == id)?;
                let op = state.queued.remove(position)?;
                Some(vec![Action::Complete(op.fail(MemoryError::Cancelled))])
            })
            .flatten();
        match actions {
            Some(actions) => {
                debug!(peer = %peer, id, "memory configuration operation cancelled");
                self.run(actions);
                true
            }
            None => false,
        }
    }
}

struct ReplyConsumer(Weak<Inner>);

impl DatagramConsumer for ReplyConsumer {
    fn handle_datagram(&self, datagram: IncomingDatagram, reply: DatagramReply) {
        let Some(inner) = self.0.upgrade() else {
            reply.reject(reject::NOT_IMPLEMENTED);
            return;
        };
        match memconfig::parse_reply(&datagram.data) {
            Ok(parsed) => {
                reply.accept();
                inner.on_reply(datagram.source, parsed);
            }
            Err(MemConfigError::UnknownCommand { command }) => {
                debug!(
                    peer = %datagram.source,
                    command,
                    "unsupported memory configuration command"
                );
                reply.reject(reject::SUBCOMMAND_UNKNOWN);
            }
            Err(err) => {
                debug!(peer = %datagram.source, %err, "malformed memory configuration reply");
                reply.reject(reject::INVALID_ARGUMENTS);
            }
        }
    }
}

impl MemoryConfigService {
    pub fn new(datagrams: DatagramService, config: MemoryConfig) -> Self {
        let inner = Arc::new(Inner {
            datagrams,
            config: config.validated(),
            peers: DashMap::new(),
            next_id: AtomicU64::new(1),
        });
        inner.datagrams.register_consumer(
            memconfig::layout::PROTOCOL_ID,
            Arc::new(ReplyConsumer(Arc::downgrade(&inner))),
        );
        Self { inner }
    }

    pub fn datagrams(&self) -> &DatagramService {
        &self.inner.datagrams
    }

    pub fn config(&self) -> MemoryConfig {
        self.inner.config
    }

    /// Read `length` bytes starting at `address` in `space`.
    ///
    /// A node answering a chunk with fewer bytes than asked ends the read
    /// successfully with the bytes received so far.
    pub fn request_read<F>(
        &self,
        peer: NodeId,
        space: u8,
        address: u32,
        length: usize,
        handler: F,
    ) -> OperationHandle
    where
        F: FnOnce(Result<ReadData, MemoryError>) + Send + 'static,
    {
        if length == 0 {
            handler(Ok(ReadData {
                peer,
                space,
                address,
                requested: 0,
                data: Vec::new(),
            }));
            return self.finished_handle(peer);
        }
        if let Err(error) = check_range(address, length) {
            handler(Err(error));
            return self.finished_handle(peer);
        }
        self.submit(
            peer,
            OpKind::Read {
                space,
                address,
                requested: length,
                data: Vec::with_capacity(length),
                ended: false,
                handler: Box::new(handler),
            },
        )
    }

    /// Write `data` starting at `address` in `space`.
    ///
    /// Chunks are not atomic as a whole; a failure reports how many bytes
    /// were written before it.
    pub fn request_write<F>(
        &self,
        peer: NodeId,
        space: u8,
        address: u32,
        data: Vec<u8>,
        handler: F,
    ) -> OperationHandle
    where
        F: FnOnce(Result<(), WriteFailure>) + Send + 'static,
    {
        if data.is_empty() {
            handler(Ok(()));
            return self.finished_handle(peer);
        }
        if let Err(error) = check_range(address, data.len()) {
            handler(Err(WriteFailure { written: 0, error }));
            return self.finished_handle(peer);
        }
        self.submit(
            peer,
            OpKind::Write {
                space,
                address,
                data,
                written: 0,
                handler: Box::new(handler),
            },
        )
    }

    /// Ask the node for the size and flags of `space`.
    pub fn request_space_info<F>(&self, peer: NodeId, space: u8, handler: F) -> OperationHandle
    where
        F: FnOnce(Result<SpaceInfo, MemoryError>) + Send + 'static,
    {
        self.submit(
            peer,
            OpKind::SpaceInfo {
                space,
                info: None,
                handler: Box::new(handler),
            },
        )
    }

    /// Fail operations whose reply deadline passed, after ticking the
    /// datagram service's own timeouts.
    pub fn poll_timeouts(&self, now: Instant) {
        self.inner.datagrams.poll_timeouts(now);
        let mut actions = Vec::new();
        for slot in self.inner.peers.iter() {
            let mut state = slot.lock();
            let expired = state.active.as_ref().is_some_and(|active| {
                matches!(active.phase, Phase::AwaitingReply { deadline } if deadline <= now)
            });
            if expired {
                warn!(peer = %slot.key(), "memory configuration reply timed out");
                actions.extend(state.finish(Err(MemoryError::Timeout), &self.inner.config));
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

    /// Operations for `peer` that are active or queued.
    pub fn pending(&self, peer: NodeId) -> usize {
        self.inner
            .peers
            .get(&peer)
            .map(|slot| slot.lock().len())
            .unwrap_or(0)
    }

    fn submit(&self, peer: NodeId, kind: OpKind) -> OperationHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let op = Operation { id, peer, kind };
        let start = self.inner.with_peer(peer, |state| state.submit(op, &self.inner.config));
        match start {
            Some(action) => self.inner.run(vec![action]),
            None => trace!(peer = %peer, id, "memory configuration operation queued"),
        }
        OperationHandle {
            inner: Arc::downgrade(&self.inner),
            peer,
            id,
        }
    }

    fn finished_handle(&self, peer: NodeId) -> OperationHandle {
        OperationHandle {
            inner: Arc::downgrade(&self.inner),
            peer,
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }
}

fn check_range(address: u32, length: usize) -> Result<(), MemoryError> {
    if u64::from(address) + length as u64 > ADDRESS_SPACE_END {
        return Err(MemoryError::Protocol {
            reason: format!("{length} bytes at 0x{address:08X} exceed the 32-bit address space"),
        });
    }
    Ok(())
}

impl fmt::Debug for MemoryConfigService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConfigService")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::MemoryConfigService;
    use crate::clock_now;
    use crate::config::{DatagramConfig, MemoryConfig};
    use crate::connection::Connection;
    use crate::datagram::DatagramService;
    use crate::identity::NodeId;
    use crate::memory::{MemoryError, WriteFailure};
    use crate::protocols::memconfig::{McsReply, McsRequest, parse_request, space};
    use crate::protocols::message::{Message, MessageBody};

    const LOCAL: NodeId = NodeId::new([0, 0, 0, 0, 0, 1]);
    const PEER: NodeId = NodeId::new([0, 0, 0, 0, 0, 2]);

    #[derive(Default)]
    struct Recording(Mutex<Vec<Message>>);

    impl Connection for Recording {
        fn put(&self, message: Message) {
            self.0.lock().push(message);
        }
    }

    impl Recording {
        fn requests(&self) -> Vec<McsRequest> {
            self.0
                .lock()
                .drain(..)
                .filter_map(|message| match message.body() {
                    MessageBody::Datagram { data } => parse_request(data).ok(),
                    _ => None,
                })
                .collect()
        }
    }

    fn setup() -> (MemoryConfigService, Arc<Recording>) {
        let connection = Arc::new(Recording::default());
        let datagrams = DatagramService::new(LOCAL, connection.clone(), DatagramConfig::default());
        let service = MemoryConfigService::new(datagrams, MemoryConfig::default());
        (service, connection)
    }

    fn ack(service: &MemoryConfigService, flags: u8) {
        service
            .datagrams()
            .handle_message(&Message::datagram_received_ok(PEER, LOCAL, flags));
    }

    fn reply(service: &MemoryConfigService, reply: McsReply) {
        let message = Message::datagram(PEER, LOCAL, reply.encode()).unwrap();
        service.datagrams().handle_message(&message);
    }

    #[test]
    fn write_without_pending_reply_completes_on_ack() {
        let (service, connection) = setup();
        let outcome = Arc::new(Mutex::new(None));
        let sink = outcome.clone();
        service.request_write(PEER, space::CONFIGURATION, 0x10, vec![1, 2, 3], move |result| {
            *sink.lock() = Some(result)
        });
        assert_eq!(
            connection.requests(),
            vec![McsRequest::Write {
                space: space::CONFIGURATION,
                address: 0x10,
                data: vec![1, 2, 3]
            }]
        );
        ack(&service, 0);
        assert_eq!(*outcome.lock(), Some(Ok(())));
        assert_eq!(service.pending(PEER), 0);
    }

    #[test]
    fn write_failure_reports_bytes_written() {
        let (service, connection) = setup();
        let outcome = Arc::new(Mutex::new(None));
        let sink = outcome.clone();
        service.request_write(PEER, space::CONFIGURATION, 0, vec![0xAA; 100], move |result| {
            *sink.lock() = Some(result)
        });
        ack(&service, 0x80);
        reply(
            &service,
            McsReply::WriteOk {
                space: space::CONFIGURATION,
                address: 0,
            },
        );
        ack(&service, 0x80);
        reply(
            &service,
            McsReply::WriteFailed {
                space: space::CONFIGURATION,
                address: 64,
                code: 0x1081,
            },
        );
        assert_eq!(
            *outcome.lock(),
            Some(Err(WriteFailure {
                written: 64,
                error: MemoryError::Rejected { code: 0x1081 }
            }))
        );
        assert_eq!(connection.requests().len(), 2);
    }

    #[test]
    fn missing_reply_times_out() {
        let (service, _connection) = setup();
        let outcome = Arc::new(Mutex::new(None));
        let sink = outcome.clone();
        service.request_read(PEER, space::CDI, 0, 10, move |result| {
            *sink.lock() = Some(result)
        });
        ack(&service, 0x80);
        service.poll_timeouts(clock_now() + Duration::from_secs(1));
        assert!(outcome.lock().is_none());
        service.poll_timeouts(clock_now() + Duration::from_secs(4));
        assert_eq!(*outcome.lock(), Some(Err(MemoryError::Timeout)));
    }

    #[test]
    fn space_info_round_trip() {
        let (service, connection) = setup();
        let outcome = Arc::new(Mutex::new(None));
        let sink = outcome.clone();
        service.request_space_info(PEER, space::CDI, move |result| *sink.lock() = Some(result));
        assert_eq!(
            connection.requests(),
            vec![McsRequest::GetSpaceInfo { space: space::CDI }]
        );
        ack(&service, 0x80);
        let info = crate::protocols::memconfig::SpaceInfo {
            space: space::CDI,
            present: true,
            highest_address: 0x1FF,
            lowest_address: 0,
            read_only: true,
        };
        reply(&service, McsReply::SpaceInfo(info));
        assert_eq!(*outcome.lock(), Some(Ok(info)));
    }

    #[test]
    fn cancel_queued_operation() {
        let (service, _connection) = setup();
        let outcome = Arc::new(Mutex::new(Vec::new()));
        let first = outcome.clone();
        let second = outcome.clone();
        service.request_read(PEER, space::CDI, 0, 4, move |result| {
            first.lock().push(("first", result.is_ok()))
        });
        let handle = service.request_read(PEER, space::CDI, 4, 4, move |result| {
            second.lock().push(("second", result == Err(MemoryError::Cancelled)))
        });
        assert_eq!(service.pending(PEER), 2);
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert_eq!(*outcome.lock(), vec![("second", true)]);
        assert_eq!(service.pending(PEER), 1);
    }

    #[test]
    fn zero_length_read_completes_immediately() {
        let (service, connection) = setup();
        let outcome = Arc::new(Mutex::new(None));
        let sink = outcome.clone();
        let handle = service.request_read(PEER, space::CDI, 0, 0, move |result| {
            *sink.lock() = Some(result.map(|read| read.data.len()))
        });
        assert_eq!(*outcome.lock(), Some(Ok(0)));
        assert!(!handle.cancel());
        assert!(connection.requests().is_empty());
    }

    #[test]
    fn range_past_address_space_is_refused() {
        let (service, _connection) = setup();
        let outcome = Arc::new(Mutex::new(None));
        let sink = outcome.clone();
        service.request_read(PEER, space::CDI, u32::MAX, 2, move |result| {
            *sink.lock() = Some(result.is_err())
        });
        assert_eq!(*outcome.lock(), Some(true));
    }
}
