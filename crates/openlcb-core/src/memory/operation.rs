use std::collections::VecDeque;
use std::time::Instant;

use tracing::debug;

use super::error::{MemoryError, WriteFailure};
use crate::config::MemoryConfig;
use crate::identity::NodeId;
use crate::protocols::memconfig::{McsReply, McsRequest, SpaceInfo};

pub type ReadHandler = Box<dyn FnOnce(Result<ReadData, MemoryError>) + Send>;
pub type WriteHandler = Box<dyn FnOnce(Result<(), WriteFailure>) + Send>;
pub type SpaceInfoHandler = Box<dyn FnOnce(Result<SpaceInfo, MemoryError>) + Send>;

pub(crate) type Completion = Box<dyn FnOnce() + Send>;

/// Bytes returned by a completed read.
///
/// `data` may be shorter than `requested` when the node signalled the end
/// of the space with a short chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadData {
    pub peer: NodeId,
    pub space: u8,
    pub address: u32,
    pub requested: usize,
    pub data: Vec<u8>,
}

impl ReadData {
    pub fn is_short(&self) -> bool {
        self.data.len() < self.requested
    }
}

pub(crate) struct Operation {
    pub id: u64,
    pub peer: NodeId,
    pub kind: OpKind,
}

pub(crate) enum OpKind {
    Read {
        space: u8,
        address: u32,
        requested: usize,
        data: Vec<u8>,
        ended: bool,
        handler: ReadHandler,
    },
    Write {
        space: u8,
        address: u32,
        data: Vec<u8>,
        written: usize,
        handler: WriteHandler,
    },
    SpaceInfo {
        space: u8,
        info: Option<SpaceInfo>,
        handler: SpaceInfoHandler,
    },
}

impl Operation {
    fn is_complete(&self) -> bool {
        match &self.kind {
            OpKind::Read {
                requested,
                data,
                ended,
                ..
            } => *ended || data.len() >= *requested,
            OpKind::Write { data, written, .. } => *written >= data.len(),
            OpKind::SpaceInfo { info, .. } => info.is_some(),
        }
    }

    /// Request for the next chunk and the number of bytes it covers.
    fn next_request(&self, config: &MemoryConfig) -> (McsRequest, usize) {
        match &self.kind {
            OpKind::Read {
                space,
                address,
                requested,
                data,
                ..
            } => {
                let count = (requested - data.len()).min(config.max_read_chunk);
                let request = McsRequest::Read {
                    space: *space,
                    address: address.wrapping_add(data.len() as u32),
                    count: count as u8,
                };
                (request, count)
            }
            OpKind::Write {
                space,
                address,
                data,
                written,
                ..
            } => {
                let end = (written + config.max_write_chunk).min(data.len());
                let request = McsRequest::Write {
                    space: *space,
                    address: address.wrapping_add(*written as u32),
                    data: data[*written..end].to_vec(),
                };
                (request, end - written)
            }
            OpKind::SpaceInfo { space, .. } => (McsRequest::GetSpaceInfo { space: *space }, 0),
        }
    }

    fn succeed(self) -> Completion {
        let peer = self.peer;
        match self.kind {
            OpKind::Read {
                space,
                address,
                requested,
                data,
                handler,
                ..
            } => Box::new(move || {
                handler(Ok(ReadData {
                    peer,
                    space,
                    address,
                    requested,
                    data,
                }))
            }),
            OpKind::Write { handler, .. } => Box::new(move || handler(Ok(()))),
            OpKind::SpaceInfo { info, handler, .. } => Box::new(move || {
                handler(info.ok_or_else(|| MemoryError::Protocol {
                    reason: "space information missing".to_string(),
                }))
            }),
        }
    }

    pub(crate) fn fail(self, error: MemoryError) -> Completion {
        match self.kind {
            OpKind::Read { handler, .. } => Box::new(move || handler(Err(error))),
            OpKind::Write {
                written, handler, ..
            } => Box::new(move || handler(Err(WriteFailure { written, error }))),
            OpKind::SpaceInfo { handler, .. } => Box::new(move || handler(Err(error))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Sending,
    AwaitingReply { deadline: Instant },
}

pub(crate) struct Active {
    pub op: Operation,
    /// Bumped for every chunk so stale datagram answers are recognised.
    pub seq: u64,
    pub chunk_len: usize,
    pub phase: Phase,
}

impl Active {
    pub fn is_write(&self) -> bool {
        matches!(self.op.kind, OpKind::Write { .. })
    }
}

enum Step {
    Advance,
    Fail(u16),
    Ignore(McsReply),
}

pub(crate) enum Action {
    Send {
        peer: NodeId,
        id: u64,
        seq: u64,
        request: McsRequest,
    },
    Complete(Completion),
}

/// Operations for one peer: at most one active, the rest in FIFO order.
#[derive(Default)]
pub(crate) struct PeerOps {
    pub active: Option<Active>,
    pub queued: VecDeque<Operation>,
}

impl PeerOps {
    pub fn len(&self) -> usize {
        self.queued.len() + usize::from(self.active.is_some())
    }

    pub fn is_current(&self, id: u64, seq: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.op.id == id && active.seq == seq)
    }

    pub fn submit(&mut self, op: Operation, config: &MemoryConfig) -> Option<Action> {
        if self.active.is_some() {
            self.queued.push_back(op);
            return None;
        }
        Some(self.activate(op, config))
    }

    fn activate(&mut self, op: Operation, config: &MemoryConfig) -> Action {
        let (request, chunk_len) = op.next_request(config);
        let action = Action::Send {
            peer: op.peer,
            id: op.id,
            seq: 0,
            request,
        };
        self.active = Some(Active {
            op,
            seq: 0,
            chunk_len,
            phase: Phase::Sending,
        });
        action
    }

    /// End the active operation, then start the next queued one.
    ///
    /// The completion comes first in the returned list so the next request
    /// goes out only after the previous handler returned.
    pub fn finish(
        &mut self,
        outcome: Result<(), MemoryError>,
        config: &MemoryConfig,
    ) -> Vec<Action> {
        let Some(done) = self.active.take() else {
            return Vec::new();
        };
        let completion = match outcome {
            Ok(()) => done.op.succeed(),
            Err(error) => done.op.fail(error),
        };
        let mut actions = vec![Action::Complete(completion)];
        if let Some(next) = self.queued.pop_front() {
            actions.push(self.activate(next, config));
        }
        actions
    }

    /// Complete the active operation or request its next chunk.
    pub fn settle(&mut self, config: &MemoryConfig) -> Vec<Action> {
        let complete = match &self.active {
            Some(active) => active.op.is_complete(),
            None => return Vec::new(),
        };
        if complete {
            return self.finish(Ok(()), config);
        }
        let Some(active) = self.active.as_mut() else {
            return Vec::new();
        };
        let (request, chunk_len) = active.op.next_request(config);
        active.seq += 1;
        active.chunk_len = chunk_len;
        active.phase = Phase::Sending;
        vec![Action::Send {
            peer: active.op.peer,
            id: active.op.id,
            seq: active.seq,
            request,
        }]
    }

    /// Apply a reply datagram to the active operation.
    ///
    /// Replies that do not answer the current chunk are ignored. Nodes ack a
    /// request before replying, so a reply arriving while the chunk is still
    /// unacknowledged belongs to an earlier, abandoned request.
    pub fn apply_reply(&mut self, reply: McsReply, config: &MemoryConfig) -> Vec<Action> {
        let Some(active) = self.active.as_mut() else {
            debug!(?reply, "memory configuration reply without active operation");
            return Vec::new();
        };
        if active.phase == Phase::Sending {
            debug!(peer = %active.op.peer, ?reply, "reply before request was acked, ignored");
            return Vec::new();
        }
        let peer = active.op.peer;
        let chunk_len = active.chunk_len;
        let step = match (&mut active.op.kind, reply) {
            (
                OpKind::Read {
                    space,
                    address,
                    data,
                    ended,
                    ..
                },
                McsReply::ReadOk {
                    space: reply_space,
                    address: reply_address,
                    data: chunk,
                },
            ) if reply_space == *space
                && reply_address == address.wrapping_add(data.len() as u32) =>
            {
                let take = chunk.len().min(chunk_len);
                data.extend_from_slice(&chunk[..take]);
                if chunk.len() < chunk_len {
                    *ended = true;
                }
                Step::Advance
            }
            (
                OpKind::Read {
                    space,
                    address,
                    data,
                    ..
                },
                McsReply::ReadFailed {
                    space: reply_space,
                    address: reply_address,
                    code,
                },
            ) if reply_space == *space
                && reply_address == address.wrapping_add(data.len() as u32) =>
            {
                Step::Fail(code)
            }
            (
                OpKind::Write {
                    space,
                    address,
                    written,
                    ..
                },
                McsReply::WriteOk {
                    space: reply_space,
                    address: reply_address,
                },
            ) if reply_space == *space
                && reply_address == address.wrapping_add(*written as u32) =>
            {
                *written += chunk_len;
                Step::Advance
            }
            (
                OpKind::Write {
                    space,
                    address,
                    written,
                    ..
                },
                McsReply::WriteFailed {
                    space: reply_space,
                    address: reply_address,
                    code,
                },
            ) if reply_space == *space
                && reply_address == address.wrapping_add(*written as u32) =>
            {
                Step::Fail(code)
            }
            (OpKind::SpaceInfo { space, info, .. }, McsReply::SpaceInfo(reported))
                if reported.space == *space =>
            {
                *info = Some(reported);
                Step::Advance
            }
            (_, other) => Step::Ignore(other),
        };
        match step {
            Step::Advance => self.settle(config),
            Step::Fail(code) => self.finish(Err(MemoryError::Rejected { code }), config),
            Step::Ignore(reply) => {
                debug!(peer = %peer, ?reply, "reply does not match active operation");
                Vec::new()
            }
        }
    }

    /// The active write chunk was acked without a pending reply.
    pub fn write_chunk_done(&mut self, config: &MemoryConfig) -> Vec<Action> {
        if let Some(Active {
            op: Operation {
                kind: OpKind::Write { written, .. },
                ..
            },
            chunk_len,
            ..
        }) = self.active.as_mut()
        {
            *written += *chunk_len;
        }
        self.settle(config)
    }
}
