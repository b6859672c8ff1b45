//! Transport abstraction — a listener handing out byte-stream links.
//!
//! Concrete implementations:
//! - TCP over Wi-Fi ([`crate::adapters::tcp`])
//! - in-memory pipes (integration tests)
//!
//! The connection FSM is generic over `Listener`, so the same state
//! handling runs against a real socket or a scripted peer.

use core::net::SocketAddr;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;

use crate::error::CommsError;

/// One accepted client connection.
///
/// Methods take `&self`: the FSM's read loop and the stream task hold the
/// same link at once.
#[allow(async_fn_in_trait)]
pub trait Link {
    /// Read whatever is available, waiting for at least one byte.
    /// `Ok(0)` means the peer closed the connection.
    async fn read(&self, buf: &mut [u8]) -> Result<usize, CommsError>;

    /// Write the whole buffer.
    async fn write_all(&self, data: &[u8]) -> Result<(), CommsError>;

    /// Shut the connection down; pending and later I/O fails.
    fn close(&self);
}

/// Source of new connections.
#[allow(async_fn_in_trait)]
pub trait Listener {
    type Link: Link;

    async fn accept(&mut self) -> Result<(Self::Link, SocketAddr), CommsError>;
}

/// Cloneable handle to a link whose writes are whole lines.
///
/// Replies and `STRM` frames come from different tasks; the write lock
/// keeps one line from being spliced into another when a write suspends
/// half way.
pub struct SharedLink<L> {
    link: Rc<L>,
    write_lock: Rc<Mutex<NoopRawMutex, ()>>,
}

impl<L> Clone for SharedLink<L> {
    fn clone(&self) -> Self {
        Self {
            link: Rc::clone(&self.link),
            write_lock: Rc::clone(&self.write_lock),
        }
    }
}

impl<L: Link> SharedLink<L> {
    pub fn new(link: L) -> Self {
        Self {
            link: Rc::new(link),
            write_lock: Rc::new(Mutex::new(())),
        }
    }

    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, CommsError> {
        self.link.read(buf).await
    }

    /// Write one complete frame (already newline terminated).
    pub async fn send(&self, frame: &str) -> Result<(), CommsError> {
        let _guard = self.write_lock.lock().await;
        self.link.write_all(frame.as_bytes()).await
    }

    pub fn close(&self) {
        self.link.close();
    }
}
