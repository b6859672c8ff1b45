//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing node events through the `log`
//! facade (ESP-IDF logger on the device, `env_logger` on the host).

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`NodeEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        match event {
            NodeEvent::Started {
                device,
                sensors,
                controls,
                adcs,
            } => {
                info!("START | device='{device}' sensors={sensors} controls={controls} adcs={adcs}");
            }
            NodeEvent::StateChanged { from, to } => {
                info!("STATE | {from} -> {to}");
            }
            NodeEvent::ClientConnected(addr) => {
                info!("CLIENT | connected {addr}");
            }
            NodeEvent::ClientDropped { reason } => {
                warn!("CLIENT | dropped: {reason}");
            }
            NodeEvent::StreamStarted { freq_hz: Some(f) } => {
                info!("STREAM | started at {f} Hz");
            }
            NodeEvent::StreamStarted { freq_hz: None } => {
                info!("STREAM | started, unthrottled");
            }
            NodeEvent::StreamStopped => {
                info!("STREAM | stopped");
            }
            NodeEvent::CommandIgnored(line) => {
                warn!("CMD | ignored '{line}'");
            }
            NodeEvent::ControlActuated { name, state } => {
                info!("CONTROL | {name} -> {state}");
            }
        }
    }
}
