//! In-memory baseband links
//!
//! A link is a pair of one-way [`Pipe`]s. Each endpoint reads from one and
//! writes to the other. Closing an endpoint closes both pipes: the peer
//! drains what was already queued and then sees end-of-stream, and its
//! writes fail with `ConnectionClosed`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Error, Result};
use crate::gap::BdAddr;
use crate::sync::lock;

use super::types::SecurityLevel;

#[derive(Debug, Default)]
struct PipeState {
    frames: VecDeque<Vec<u8>>,
    closed: bool,
}

/// One direction of a link, carrying whole frames
#[derive(Debug, Default)]
pub(crate) struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

impl Pipe {
    fn push(&self, frame: Vec<u8>) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(Error::ConnectionClosed);
        }
        state.frames.push_back(frame);
        self.readable.notify_one();
        Ok(())
    }

    /// Blocks until a frame is queued. `None` once closed and drained.
    fn pop(&self) -> Option<Vec<u8>> {
        let mut state = lock(&self.state);
        loop {
            if let Some(frame) = state.frames.pop_front() {
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            state = self
                .readable
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Stream read: copies up to `buf.len()` bytes from the head frame,
    /// putting any remainder back. Returns 0 at end-of-stream.
    fn read_into(&self, buf: &mut [u8]) -> usize {
        let mut state = lock(&self.state);
        loop {
            if let Some(mut frame) = state.frames.pop_front() {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                if n < frame.len() {
                    state.frames.push_front(frame.split_off(n));
                }
                return n;
            }
            if state.closed {
                return 0;
            }
            state = self
                .readable
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    fn available(&self) -> usize {
        lock(&self.state).frames.iter().map(Vec::len).sum()
    }

    fn has_frame(&self) -> bool {
        !lock(&self.state).frames.is_empty()
    }

    fn close(&self) {
        let mut state = lock(&self.state);
        state.closed = true;
        self.readable.notify_all();
    }

    fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

/// One side of a link
#[derive(Debug)]
pub(crate) struct LinkEnd {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    closed_locally: AtomicBool,
}

/// Creates both ends of a fresh link
pub(crate) fn link_pair() -> (LinkEnd, LinkEnd) {
    let a_to_b = Arc::new(Pipe::default());
    let b_to_a = Arc::new(Pipe::default());
    (
        LinkEnd::new(Arc::clone(&b_to_a), Arc::clone(&a_to_b)),
        LinkEnd::new(a_to_b, b_to_a),
    )
}

impl LinkEnd {
    fn new(rx: Arc<Pipe>, tx: Arc<Pipe>) -> Self {
        Self {
            rx,
            tx,
            closed_locally: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed_locally.load(Ordering::SeqCst) {
            Err(Error::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn send(&self, frame: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        self.tx.push(frame)
    }

    /// Byte-stream read, 0 at end-of-stream
    pub(crate) fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.rx.read_into(buf);
        // Woken by our own close rather than by the peer
        if n == 0 {
            self.ensure_open()?;
        }
        Ok(n)
    }

    /// Packet read, `None` at end-of-stream
    pub(crate) fn receive(&self) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        let frame = self.rx.pop();
        if frame.is_none() {
            self.ensure_open()?;
        }
        Ok(frame)
    }

    pub(crate) fn available(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.rx.available())
    }

    pub(crate) fn ready(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.rx.has_frame() || self.rx.is_closed())
    }

    /// Fails once either side has closed the link
    pub(crate) fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        if self.tx.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.closed_locally.store(true, Ordering::SeqCst);
        self.tx.close();
        self.rx.close();
    }
}

/// A client waiting in a server's backlog
#[derive(Debug)]
pub(crate) struct Incoming {
    pub remote: BdAddr,
    pub end: LinkEnd,
    pub security: SecurityLevel,
    /// Peer's receive MTU, meaningful for L2CAP only
    pub peer_receive_mtu: u16,
}

#[derive(Debug, Default)]
struct PortState {
    backlog: VecDeque<Incoming>,
    closed: bool,
}

/// Listening side of a server: queue of connected clients awaiting accept
#[derive(Debug, Default)]
pub(crate) struct ServerPort {
    state: Mutex<PortState>,
    arrived: Condvar,
}

impl ServerPort {
    pub(crate) fn offer(&self, incoming: Incoming) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(Error::ConnectionRefused);
        }
        state.backlog.push_back(incoming);
        self.arrived.notify_one();
        Ok(())
    }

    /// Blocks until a client connects or the server closes
    pub(crate) fn accept(&self) -> Result<Incoming> {
        let mut state = lock(&self.state);
        loop {
            if state.closed {
                return Err(Error::ConnectionClosed);
            }
            if let Some(incoming) = state.backlog.pop_front() {
                return Ok(incoming);
            }
            state = self
                .arrived
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Refuses further clients and hangs up on those still queued
    pub(crate) fn close(&self) {
        let pending = {
            let mut state = lock(&self.state);
            state.closed = true;
            self.arrived.notify_all();
            std::mem::take(&mut state.backlog)
        };
        for incoming in pending {
            incoming.end.close();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}
