//! Command engine — turns parsed request commands into reply frames.
//!
//! Stateless and transport-free: the connection FSM feeds a
//! [`Command`] and gets back the frame to write, if any.  Every reply
//! echoes the command token:
//!
//! ```text
//!   GETS              → GETS <uptime_ms> PT1:512.3 LC1:ERR ...
//!   STATUS            → STATUS {"VALVE1":"OPEN","VENT":"CLOSED"}
//!   CONTROL V1 OPEN   → CONTROL V1 opened | V1 already open | Unknown control: V1
//! ```
//!
//! `STREAM` and `STOP` own task state and are answered by the FSM.

use embedded_hal::digital::StatefulOutputPin;
use log::info;

use crate::app::commands::Command;
use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;
use crate::app::service::NodeService;
use crate::control::{Actuation, ValveState};
use crate::error::ControlError;

/// `<token> <payload>\n`.
pub fn reply(token: &str, payload: &str) -> String {
    format!("{token} {payload}\n")
}

/// Answer `cmd`.  Returns `None` for commands the engine does not own.
pub fn dispatch<P: StatefulOutputPin>(
    cmd: &Command,
    node: &mut NodeService<P>,
    sink: &mut impl EventSink,
) -> Option<String> {
    let payload = match cmd {
        Command::Gets => node.gets_payload(),
        Command::Status => node.status_json(),
        Command::Control { name, action } => control(node, name, action, sink),
        Command::Stream { .. } | Command::Stop => return None,
    };
    Some(reply(cmd.token(), &payload))
}

fn control<P: StatefulOutputPin>(
    node: &mut NodeService<P>,
    name: &str,
    action: &str,
    sink: &mut impl EventSink,
) -> String {
    let upper = name.to_ascii_uppercase();
    match node.actuate(name, action) {
        Ok(Actuation::Changed(state)) => {
            sink.emit(&NodeEvent::ControlActuated {
                name: upper.clone(),
                state,
            });
            match state {
                ValveState::Open => format!("{upper} opened"),
                ValveState::Closed => format!("{upper} closed"),
            }
        }
        Ok(Actuation::Unchanged(state)) => {
            info!("control {upper}: already {state}");
            match state {
                ValveState::Open => format!("{upper} already open"),
                ValveState::Closed => format!("{upper} already closed"),
            }
        }
        Err(ControlError::UnknownControl) => format!("Unknown control: {name}"),
        Err(ControlError::InvalidAction) => format!("Invalid action: {action}"),
        Err(ControlError::PinWriteFailed) => format!("{upper} GPIO write failed"),
    }
}
