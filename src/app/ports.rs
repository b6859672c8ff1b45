//! Port traits — the boundary between the node core and its observers.
//!
//! ```text
//!   ConnectionFsm / NodeService ──▶ EventSink ──▶ adapter (log, ...)
//! ```

use super::events::NodeEvent;

/// The core emits structured [`NodeEvent`]s through this port.  Adapters
/// decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &NodeEvent);
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &NodeEvent) {}
}
