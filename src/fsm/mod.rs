//! Connection state machine — one client at a time over one listener.
//!
//! ```text
//!            ┌──────┐
//!            │ Init │
//!            └──┬───┘
//!               ▼
//!          ┌─────────┐  accept + CONF   ┌───────┐  STREAM  ┌───────────┐
//!   ┌────▶ │ Waiting │ ───────────────▶ │ Ready │ ◀──────▶ │ Streaming │
//!   │      └────┬────┘                  └───┬───┘   STOP   └─────┬─────┘
//!   │           │ accept/send failure       │ EOF, socket or     │
//!   │           ▼                           ▼ malformed input    │
//!   │      ┌─────────┐ ◀────────────────────┴────────────────────┘
//!   └──────│  Error  │  close link, stop stream, clear message
//!          └─────────┘
//! ```
//!
//! Each [`ConnectionFsm::step`] awaits the current state's handler (see
//! [`states`]) and applies the state it returns.  Ready and Streaming are
//! served by the same handler; Streaming only reports that a stream task
//! is alive next to the command loop.

pub mod context;
pub mod states;

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use context::FsmContext;
use embedded_hal::digital::StatefulOutputPin;
use futures_lite::future;
use log::info;

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;
use crate::app::service::NodeService;
use crate::rpc::stream::Executor;
use crate::rpc::transport::Listener;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnState {
    Init,
    Waiting,
    Ready,
    Streaming,
    Error,
}

impl ConnState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Waiting => "WAITING",
            Self::Ready => "READY",
            Self::Streaming => "STREAMING",
            Self::Error => "ERROR",
        }
    }

    /// A client is connected in this state.
    pub const fn is_serving(self) -> bool {
        matches!(self, Self::Ready | Self::Streaming)
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct ConnectionFsm<'e, 'a, T: Listener, P, S> {
    ctx: FsmContext<'e, 'a, T, P, S>,
    state: ConnState,
}

impl<'e, 'a, T, P, S> ConnectionFsm<'e, 'a, T, P, S>
where
    T: Listener,
    T::Link: 'a,
    P: StatefulOutputPin + 'a,
    S: EventSink,
{
    /// `conf_frame` is the complete `CONF<json>\n` greeting.
    pub fn new(
        executor: &'e Executor<'a>,
        listener: T,
        node: Rc<RefCell<NodeService<P>>>,
        sink: S,
        conf_frame: String,
    ) -> Self {
        Self {
            ctx: FsmContext {
                executor,
                listener,
                node,
                sink,
                conf_frame,
                conn: None,
                error: None,
            },
            state: ConnState::Init,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn node(&self) -> &Rc<RefCell<NodeService<P>>> {
        &self.ctx.node
    }

    pub fn sink(&self) -> &S {
        &self.ctx.sink
    }

    /// Run the current state's handler once and move to the state it
    /// returns.
    pub async fn step(&mut self) -> ConnState {
        let ctx = &mut self.ctx;
        let next = match self.state {
            ConnState::Init => states::on_init(ctx).await,
            ConnState::Waiting => states::on_waiting(ctx).await,
            ConnState::Ready | ConnState::Streaming => states::on_serving(ctx).await,
            ConnState::Error => states::on_error(ctx).await,
        };
        if next != self.state {
            self.transition(next);
        }
        next
    }

    /// Serve clients forever.
    pub async fn run(&mut self) {
        loop {
            self.step().await;
        }
    }

    /// Serve until `stop` completes, then [`shutdown`](Self::shutdown).
    ///
    /// Run this as a task on the FSM's executor: an unthrottled stream
    /// keeps the run queue busy and the future handed to
    /// `Executor::run` is only polled once the queue drains.
    pub async fn run_until(&mut self, stop: impl Future<Output = ()>) {
        future::or(self.run(), stop).await;
        self.shutdown().await;
    }

    /// Operator stop: close the client, reap the stream and go back to
    /// INIT.
    pub async fn shutdown(&mut self) {
        info!("Shutting down connection server");
        if let Some(conn) = self.ctx.conn.take() {
            conn.teardown().await;
            self.ctx.sink.emit(&NodeEvent::ClientDropped {
                reason: "Shutdown".into(),
            });
        }
        self.ctx.error = None;
        if self.state != ConnState::Init {
            self.transition(ConnState::Init);
        }
    }

    fn transition(&mut self, next: ConnState) {
        info!("FSM transition: {} -> {}", self.state, next);
        self.ctx.sink.emit(&NodeEvent::StateChanged {
            from: self.state,
            to: next,
        });
        self.state = next;
    }
}
