//! In-memory transport for driving the connection FSM from a test.
//!
//! [`MockListener`] hands out [`MockLink`]s created by a [`Connector`];
//! the test keeps the matching [`MockPeer`] to type commands, hang up and
//! inspect everything the node wrote.

use core::cell::{Cell, RefCell};
use core::net::SocketAddr;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use futures_lite::future;

use propnode::app::events::NodeEvent;
use propnode::app::ports::EventSink;
use propnode::error::CommsError;
use propnode::rpc::transport::{Link, Listener};

type Inbox = Channel<NoopRawMutex, Vec<u8>, 16>;

const MAX_FRAMES: usize = 100_000;

// ── Link ──────────────────────────────────────────────────────

pub struct MockLink {
    inbox: Rc<Inbox>,
    /// Tail of a chunk that did not fit the caller's buffer.
    leftover: RefCell<Vec<u8>>,
    written: Rc<RefCell<Vec<String>>>,
    closed: Rc<Cell<bool>>,
}

impl Link for MockLink {
    async fn read(&self, buf: &mut [u8]) -> Result<usize, CommsError> {
        if self.closed.get() {
            return Ok(0);
        }
        let mut chunk = self.leftover.take();
        if chunk.is_empty() {
            chunk = self.inbox.receive().await;
        }
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        *self.leftover.borrow_mut() = chunk.split_off(n);
        Ok(n)
    }

    async fn write_all(&self, data: &[u8]) -> Result<(), CommsError> {
        if self.closed.get() {
            return Err(CommsError::PeerClosed);
        }
        let mut written = self.written.borrow_mut();
        // A stream that starves the rest of the executor never stops writing.
        assert!(written.len() < MAX_FRAMES, "link flooded with {MAX_FRAMES} frames");
        written.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn close(&self) {
        self.closed.set(true);
    }
}

// ── Peer (test side) ──────────────────────────────────────────

pub struct MockPeer {
    inbox: Rc<Inbox>,
    written: Rc<RefCell<Vec<String>>>,
    closed: Rc<Cell<bool>>,
}

#[allow(dead_code)]
impl MockPeer {
    /// Deliver raw bytes as one read.
    pub fn send(&self, bytes: &str) {
        assert!(
            self.inbox.try_send(bytes.as_bytes().to_vec()).is_ok(),
            "mock inbox full"
        );
    }

    /// Deliver end-of-stream.
    pub fn hang_up(&self) {
        assert!(self.inbox.try_send(Vec::new()).is_ok(), "mock inbox full");
    }

    /// Every frame the node wrote, in order.
    pub fn written(&self) -> Vec<String> {
        self.written.borrow().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.written.borrow().last().cloned()
    }

    pub fn stream_frames(&self) -> usize {
        self.written
            .borrow()
            .iter()
            .filter(|f| f.starts_with("STRM "))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

// ── Listener ──────────────────────────────────────────────────

type Backlog = Channel<NoopRawMutex, (MockLink, SocketAddr), 4>;

pub struct MockListener {
    backlog: Rc<Backlog>,
}

pub struct Connector {
    backlog: Rc<Backlog>,
    next_port: Cell<u16>,
}

pub fn listener() -> (MockListener, Connector) {
    let backlog = Rc::new(Backlog::new());
    (
        MockListener {
            backlog: Rc::clone(&backlog),
        },
        Connector {
            backlog,
            next_port: Cell::new(40_000),
        },
    )
}

impl Listener for MockListener {
    type Link = MockLink;

    async fn accept(&mut self) -> Result<(MockLink, SocketAddr), CommsError> {
        Ok(self.backlog.receive().await)
    }
}

impl Connector {
    /// Queue a new client for the next accept.
    pub fn connect(&self) -> MockPeer {
        let port = self.next_port.get();
        self.next_port.set(port + 1);
        let inbox = Rc::new(Inbox::new());
        let written = Rc::new(RefCell::new(Vec::new()));
        let closed = Rc::new(Cell::new(false));
        let link = MockLink {
            inbox: Rc::clone(&inbox),
            leftover: RefCell::new(Vec::new()),
            written: Rc::clone(&written),
            closed: Rc::clone(&closed),
        };
        let addr = SocketAddr::from(([192, 168, 4, 2], port));
        assert!(self.backlog.try_send((link, addr)).is_ok(), "backlog full");
        MockPeer {
            inbox,
            written,
            closed,
        }
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<NodeEvent>,
}

impl EventSink for Recorder {
    fn emit(&mut self, event: &NodeEvent) {
        self.events.push(event.clone());
    }
}

/// Let spawned tasks run for `n` scheduler turns.
pub async fn settle(n: usize) {
    for _ in 0..n {
        future::yield_now().await;
    }
}
