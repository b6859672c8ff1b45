//! State shared by every connection-state handler.
//!
//! [`FsmContext`] is threaded through the handlers in [`super::states`]
//! the same way on every step; [`Connection`] is the per-client record
//! that exists between accept and the ERROR cleanup.

use core::cell::RefCell;
use core::net::SocketAddr;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::app::ports::EventSink;
use crate::app::service::NodeService;
use crate::rpc::codec::LineDecoder;
use crate::rpc::stream::{Executor, StreamHandle};
use crate::rpc::transport::{Link, Listener, SharedLink};

// ---------------------------------------------------------------------------
// Connection record
// ---------------------------------------------------------------------------

/// The single client being served.
pub struct Connection<L> {
    pub link: SharedLink<L>,
    pub remote: SocketAddr,
    pub decoder: LineDecoder,
    /// Complete lines received but not yet dispatched.
    pub pending: VecDeque<String>,
    pub stream: Option<StreamHandle>,
}

impl<L: Link> Connection<L> {
    pub fn new(link: L, remote: SocketAddr) -> Self {
        Self {
            link: SharedLink::new(link),
            remote,
            decoder: LineDecoder::new(),
            pending: VecDeque::new(),
            stream: None,
        }
    }

    /// A stream task exists and has not exited on its own.
    pub fn is_streaming(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Cancel and await the stream task.  Returns whether one was running.
    pub async fn stop_stream(&mut self) -> bool {
        let Some(stream) = self.stream.take() else {
            return false;
        };
        let live = !stream.is_finished();
        stream.stop().await;
        live
    }

    /// Close the socket, then reap the stream task.  Closing first makes a
    /// stream blocked in a write fail out instead of waiting on the peer.
    pub async fn teardown(mut self) {
        self.link.close();
        self.stop_stream().await;
    }
}

// ---------------------------------------------------------------------------
// Handler context
// ---------------------------------------------------------------------------

pub struct FsmContext<'e, 'a, T: Listener, P, S> {
    pub executor: &'e Executor<'a>,
    pub listener: T,
    pub node: Rc<RefCell<NodeService<P>>>,
    pub sink: S,
    /// `CONF<json>\n`, rendered once at boot.
    pub conf_frame: String,
    pub conn: Option<Connection<T::Link>>,
    /// Why the last handler moved to ERROR.
    pub error: Option<String>,
}

impl<T: Listener, P, S: EventSink> FsmContext<'_, '_, T, P, S> {
    pub fn is_streaming(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::is_streaming)
    }
}
