//! Simulated remote node answering memory configuration requests over an
//! in-process bus.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use openlcb_core::protocols::memconfig::{McsReply, McsRequest, SpaceInfo, parse_request};
use openlcb_core::{Connection, DatagramService, Message, MessageBody, NodeId};
use parking_lot::Mutex;

pub const LOCAL: NodeId = NodeId::new([0x05, 0x01, 0x01, 0x01, 0x22, 0x00]);
pub const PEER: NodeId = NodeId::new([0x09, 0x00, 0x99, 0x03, 0x00, 0x11]);
/// A second remote node that is never answered.
pub const OTHER_PEER: NodeId = NodeId::new([0x09, 0x00, 0x99, 0x03, 0x00, 0x22]);

pub type Events = Arc<Mutex<Vec<String>>>;

/// Remote node holding one flat memory image for every space.
///
/// Messages it sends back are queued and only delivered by [`pump`].
pub struct SimulatedNode {
    memory: Mutex<Vec<u8>>,
    inbound: Mutex<VecDeque<Message>>,
    sent: Mutex<Vec<Message>>,
    silent: AtomicBool,
    pub events: Events,
}

impl SimulatedNode {
    pub fn new(memory: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            memory: Mutex::new(memory),
            inbound: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            silent: AtomicBool::new(false),
            events: Events::default(),
        })
    }

    /// Stop answering; requests are still recorded.
    pub fn go_silent(&self) {
        self.silent.store(true, Ordering::SeqCst);
    }

    pub fn memory(&self) -> Vec<u8> {
        self.memory.lock().clone()
    }

    /// Replace the memory image; answers already queued keep their data.
    pub fn set_memory(&self, memory: Vec<u8>) {
        *self.memory.lock() = memory;
    }

    /// Every message the local node put on the bus.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    pub fn requests(&self) -> Vec<McsRequest> {
        self.sent
            .lock()
            .iter()
            .filter_map(|message| match message.body() {
                MessageBody::Datagram { data } => parse_request(data).ok(),
                _ => None,
            })
            .collect()
    }

    /// Deliver queued answers until the bus is quiet.
    pub fn pump(&self, service: &DatagramService) {
        loop {
            let next = self.inbound.lock().pop_front();
            match next {
                Some(message) => service.handle_message(&message),
                None => break,
            }
        }
    }

    fn answer(&self, request: &McsRequest) -> McsReply {
        match request {
            McsRequest::Read {
                space,
                address,
                count,
            } => {
                let memory = self.memory.lock();
                let start = (*address as usize).min(memory.len());
                let end = (start + usize::from(*count)).min(memory.len());
                McsReply::ReadOk {
                    space: *space,
                    address: *address,
                    data: memory[start..end].to_vec(),
                }
            }
            McsRequest::Write {
                space,
                address,
                data,
            } => {
                let mut memory = self.memory.lock();
                let start = *address as usize;
                if memory.len() < start + data.len() {
                    memory.resize(start + data.len(), 0);
                }
                memory[start..start + data.len()].copy_from_slice(data);
                McsReply::WriteOk {
                    space: *space,
                    address: *address,
                }
            }
            McsRequest::GetSpaceInfo { space } => {
                let len = self.memory.lock().len() as u32;
                McsReply::SpaceInfo(SpaceInfo {
                    space: *space,
                    present: true,
                    highest_address: len.saturating_sub(1),
                    lowest_address: 0,
                    read_only: false,
                })
            }
        }
    }
}

impl Connection for SimulatedNode {
    fn put(&self, message: Message) {
        self.sent.lock().push(message.clone());
        if message.destination() != Some(PEER) || self.silent.load(Ordering::SeqCst) {
            return;
        }
        let MessageBody::Datagram { data } = message.body() else {
            return;
        };
        let Ok(request) = parse_request(data) else {
            return;
        };
        let address = match &request {
            McsRequest::Read { address, .. } | McsRequest::Write { address, .. } => *address,
            McsRequest::GetSpaceInfo { .. } => 0,
        };
        self.events.lock().push(format!("request {address}"));

        let reply = self.answer(&request);
        let reply = Message::datagram(PEER, LOCAL, reply.encode()).expect("reply datagram");
        let mut inbound = self.inbound.lock();
        inbound.push_back(Message::datagram_received_ok(PEER, LOCAL, 0x80));
        inbound.push_back(reply);
    }
}
