//! Streaming reader for a node's configuration description (CDI).
//!
//! The document is read in bounded chunks from address 0 of the CDI space,
//! each request starting where the bytes actually returned ended. Loading
//! stops at the first zero byte, at a short chunk, or when the known total
//! size is reached. Chunks flow through an unbounded channel, so the reading
//! side never stalls the network side and parsing can start before the last
//! chunk arrived.

use std::io;
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::identity::NodeId;
use crate::memory::{MemoryError, MemoryReader, ReadData};
use crate::protocols::memconfig::layout::MAX_TRANSFER_LEN;
use crate::protocols::memconfig::space;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CdiError {
    #[error("reading CDI at 0x{address:08X} failed: {source}")]
    Read {
        address: u32,
        #[source]
        source: MemoryError,
    },
}

type Progress = Box<dyn FnMut(u64, Option<u64>) + Send>;
type Chunk = Result<Vec<u8>, CdiError>;

/// Builder for one CDI loading session.
///
/// # Examples
/// ```
/// use std::io::Read;
/// use std::sync::Arc;
///
/// use openlcb_core::NodeId;
/// use openlcb_core::cdi::CdiLoader;
/// use openlcb_core::memory::{MemoryReader, ReadData, ReadHandler};
///
/// struct Stored(Vec<u8>);
///
/// impl MemoryReader for Stored {
///     fn read(&self, peer: NodeId, space: u8, address: u32, length: usize, handler: ReadHandler) {
///         let start = (address as usize).min(self.0.len());
///         let end = (start + length).min(self.0.len());
///         handler(Ok(ReadData {
///             peer,
///             space,
///             address,
///             requested: length,
///             data: self.0[start..end].to_vec(),
///         }));
///     }
/// }
///
/// let node = NodeId::new([0, 0, 0, 0, 0, 2]);
/// let mut stream = CdiLoader::new(Arc::new(Stored(b"<cdi/>\0".to_vec())), node).start(|_, _| {});
/// let mut text = String::new();
/// stream.read_to_string(&mut text)?;
/// assert_eq!(text, "<cdi/>");
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct CdiLoader {
    reader: Arc<dyn MemoryReader>,
    peer: NodeId,
    space: u8,
    chunk_size: usize,
    total_size: Option<u64>,
}

impl CdiLoader {
    pub fn new(reader: Arc<dyn MemoryReader>, peer: NodeId) -> Self {
        Self {
            reader,
            peer,
            space: space::CDI,
            chunk_size: MAX_TRANSFER_LEN,
            total_size: None,
        }
    }

    pub fn space(mut self, space: u8) -> Self {
        self.space = space;
        self
    }

    /// Bytes per read request, clamped to `1..=64`.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_TRANSFER_LEN);
        self
    }

    /// Document size when known, for example from an address space
    /// information query. Reported as the progress total and used as a
    /// hard upper bound.
    pub fn total_size(mut self, total_size: u64) -> Self {
        self.total_size = Some(total_size);
        self
    }

    /// Start loading. `progress` receives `(bytes_read, total_bytes)` after
    /// every successful chunk.
    pub fn start<P>(self, progress: P) -> CdiStream
    where
        P: FnMut(u64, Option<u64>) + Send + 'static,
    {
        let (sender, receiver) = channel::unbounded();
        let session = Arc::new(Session {
            reader: self.reader,
            peer: self.peer,
            space: self.space,
            chunk_size: self.chunk_size,
            total_size: self.total_size,
            progress: Mutex::new(Box::new(progress)),
            driver: Mutex::new(Driver::default()),
            chunks: sender,
        });
        debug!(peer = %session.peer, space = session.space, "CDI load started");
        Session::request(session, 0);
        CdiStream {
            chunks: receiver,
            current: Vec::new(),
            position: 0,
            finished: false,
        }
    }
}

struct Session {
    reader: Arc<dyn MemoryReader>,
    peer: NodeId,
    space: u8,
    chunk_size: usize,
    total_size: Option<u64>,
    progress: Mutex<Progress>,
    driver: Mutex<Driver>,
    // Dropping the last session reference closes the stream.
    chunks: Sender<Chunk>,
}

/// Hand-off between the request loop and read handlers.
///
/// A reader that answers on the caller's stack only records the next
/// address; the loop already running further up issues it.
#[derive(Default)]
struct Driver {
    running: bool,
    next: Option<u32>,
}

impl Session {
    fn request(session: Arc<Session>, address: u32) {
        {
            let mut driver = session.driver.lock();
            driver.next = Some(address);
            if driver.running {
                return;
            }
            driver.running = true;
        }
        loop {
            let next = {
                let mut driver = session.driver.lock();
                let next = driver.next.take();
                if next.is_none() {
                    driver.running = false;
                }
                next
            };
            match next {
                Some(address) => Session::issue(session.clone(), address),
                None => return,
            }
        }
    }

    fn issue(session: Arc<Session>, address: u32) {
        let length = match session.total_size {
            Some(total) => {
                let remaining = total.saturating_sub(u64::from(address));
                (session.chunk_size as u64).min(remaining) as usize
            }
            None => session.chunk_size,
        };
        if length == 0 {
            trace!(peer = %session.peer, "CDI load reached the announced size");
            return;
        }
        let reader = session.reader.clone();
        let (peer, space) = (session.peer, session.space);
        reader.read(
            peer,
            space,
            address,
            length,
            Box::new(move |result| Session::deliver(session, address, length, result)),
        );
    }

    fn deliver(
        session: Arc<Session>,
        address: u32,
        length: usize,
        result: Result<ReadData, MemoryError>,
    ) {
        let read = match result {
            Ok(read) => read,
            Err(source) => {
                debug!(peer = %session.peer, address, %source, "CDI load failed");
                // A closed channel means nobody is reading any more.
                let _ = session.chunks.send(Err(CdiError::Read { address, source }));
                return;
            }
        };

        let terminator = read.data.iter().position(|&byte| byte == 0);
        let bytes = &read.data[..terminator.unwrap_or(read.data.len())];
        if !bytes.is_empty() && session.chunks.send(Ok(bytes.to_vec())).is_err() {
            debug!(peer = %session.peer, "CDI stream dropped, loading stopped");
            return;
        }
        let delivered = u64::from(address) + bytes.len() as u64;
        if !bytes.is_empty() {
            let mut progress = session.progress.lock();
            (*progress)(delivered, session.total_size);
        }

        if terminator.is_some() || read.data.len() < length {
            trace!(peer = %session.peer, bytes = delivered, "CDI load complete");
            return;
        }
        match u32::try_from(read.data.len())
            .ok()
            .and_then(|len| address.checked_add(len))
        {
            Some(next) => Session::request(session, next),
            None => debug!(peer = %session.peer, "CDI load reached the end of the address space"),
        }
    }
}

/// Incrementally produced CDI bytes.
///
/// Reads block until the next chunk arrives. The stream ends after the
/// document, or after the first error, and cannot be restarted.
pub struct CdiStream {
    chunks: Receiver<Chunk>,
    current: Vec<u8>,
    position: usize,
    finished: bool,
}

impl CdiStream {
    /// Next chunk of document bytes; `None` once the document ended.
    pub fn next_chunk(&mut self) -> Option<Chunk> {
        if self.position < self.current.len() {
            let rest = self.current.split_off(self.position);
            self.current.clear();
            self.position = 0;
            return Some(Ok(rest));
        }
        if self.finished {
            return None;
        }
        match self.chunks.recv() {
            Ok(Ok(chunk)) => Some(Ok(chunk)),
            Ok(Err(err)) => {
                self.finished = true;
                Some(Err(err))
            }
            Err(_) => {
                self.finished = true;
                None
            }
        }
    }

    /// Collect the whole document.
    pub fn read_all(mut self) -> Result<Vec<u8>, CdiError> {
        let mut document = Vec::new();
        while let Some(chunk) = self.next_chunk() {
            document.extend_from_slice(&chunk?);
        }
        Ok(document)
    }
}

impl Iterator for CdiStream {
    type Item = Chunk;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk()
    }
}

impl io::Read for CdiStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.position >= self.current.len() {
            match self.next_chunk() {
                None => return Ok(0),
                Some(Ok(chunk)) => {
                    self.current = chunk;
                    self.position = 0;
                }
                Some(Err(err)) => return Err(io::Error::other(err)),
            }
        }
        let available = &self.current[self.position..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.position += count;
        Ok(count)
    }
}
