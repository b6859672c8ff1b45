//! Node core — sensors, controls and the command vocabulary, no sockets.
//!
//! Everything a client can ask for is answered here; the connection FSM
//! only moves lines between the socket and this layer.  Observers hang off
//! the [`ports::EventSink`] port.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
