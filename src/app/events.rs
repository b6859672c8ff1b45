//! Outbound node events.
//!
//! Emitted by the connection FSM through the
//! [`EventSink`](super::ports::EventSink) port.

use std::net::SocketAddr;

use crate::control::ValveState;
use crate::fsm::ConnState;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// Boot finished; the server is about to listen.
    Started {
        device: String,
        sensors: usize,
        controls: usize,
        adcs: usize,
    },

    /// The connection FSM moved between states.
    StateChanged { from: ConnState, to: ConnState },

    /// A client connected and was sent the CONF frame.
    ClientConnected(SocketAddr),

    /// The client connection was torn down by the ERROR state.
    ClientDropped { reason: String },

    /// A stream task was spawned (`None` = as fast as possible).
    StreamStarted { freq_hz: Option<f32> },

    /// A stream task was cancelled and has finished.
    StreamStopped,

    /// A line with an unrecognised first token was dropped.
    CommandIgnored(String),

    /// A control changed state.
    ControlActuated { name: String, state: ValveState },
}
