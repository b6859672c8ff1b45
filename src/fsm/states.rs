//! Connection state handlers.
//!
//! One async handler per state; each awaits the I/O it needs and returns
//! the state to enter.
//!
//! | State     | Handler      | Next                                    |
//! |-----------|--------------|-----------------------------------------|
//! | Init      | [`on_init`]  | Waiting                                 |
//! | Waiting   | [`on_waiting`]| Ready, or Error on accept/CONF failure |
//! | Ready     | [`on_serving`]| Ready/Streaming, or Error              |
//! | Streaming | [`on_serving`]| Ready/Streaming, or Error              |
//! | Error     | [`on_error`] | Waiting                                 |

use std::rc::Rc;

use embedded_hal::digital::StatefulOutputPin;
use log::{info, warn};

use super::ConnState;
use super::context::{Connection, FsmContext};
use crate::app::commands::{self, Command, ParseError};
use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;
use crate::error::CommsError;
use crate::rpc::codec::MAX_LINE;
use crate::rpc::engine;
use crate::rpc::stream::StreamHandle;
use crate::rpc::transport::Listener;

type Ctx<'c, 'e, 'a, T, P, S> = &'c mut FsmContext<'e, 'a, T, P, S>;

fn socket_error(e: CommsError) -> String {
    format!("Socket error: {e}")
}

// ── INIT ──────────────────────────────────────────────────────

pub async fn on_init<T, P, S>(ctx: Ctx<'_, '_, '_, T, P, S>) -> ConnState
where
    T: Listener,
    P: StatefulOutputPin,
    S: EventSink,
{
    ctx.conn = None;
    ctx.error = None;
    let started = {
        let node = ctx.node.borrow();
        NodeEvent::Started {
            device: node.device_name().to_owned(),
            sensors: node.sensors().len(),
            controls: node.controls().len(),
            adcs: node.adc_count(),
        }
    };
    ctx.sink.emit(&started);
    ConnState::Waiting
}

// ── WAITING ───────────────────────────────────────────────────

pub async fn on_waiting<T, P, S>(ctx: Ctx<'_, '_, '_, T, P, S>) -> ConnState
where
    T: Listener,
    S: EventSink,
{
    match accept(ctx).await {
        Ok(()) => ConnState::Ready,
        Err(msg) => {
            ctx.error = Some(msg);
            ConnState::Error
        }
    }
}

async fn accept<T, P, S>(ctx: Ctx<'_, '_, '_, T, P, S>) -> Result<(), String>
where
    T: Listener,
    S: EventSink,
{
    let (link, remote) = ctx
        .listener
        .accept()
        .await
        .map_err(|e| format!("Accept failed: {e}"))?;
    info!("Client connected: {remote}");

    // Stored before the CONF send so a failed send is cleaned up by ERROR.
    let conn = ctx.conn.insert(Connection::new(link, remote));
    conn.link.send(&ctx.conf_frame).await.map_err(socket_error)?;
    ctx.sink.emit(&NodeEvent::ClientConnected(remote));
    Ok(())
}

// ── READY / STREAMING ─────────────────────────────────────────

pub async fn on_serving<'a, T, P, S>(ctx: Ctx<'_, '_, 'a, T, P, S>) -> ConnState
where
    T: Listener,
    T::Link: 'a,
    P: StatefulOutputPin + 'a,
    S: EventSink,
{
    match serve(ctx).await {
        Ok(()) if ctx.is_streaming() => ConnState::Streaming,
        Ok(()) => ConnState::Ready,
        Err(msg) => {
            ctx.error = Some(msg);
            ConnState::Error
        }
    }
}

/// Read once, then dispatch every complete line.
async fn serve<'a, T, P, S>(ctx: Ctx<'_, '_, 'a, T, P, S>) -> Result<(), String>
where
    T: Listener,
    T::Link: 'a,
    P: StatefulOutputPin + 'a,
    S: EventSink,
{
    let FsmContext {
        executor,
        node,
        sink,
        conn,
        ..
    } = ctx;
    let conn = conn.as_mut().ok_or("No client connection")?;

    if conn.pending.is_empty() {
        let mut buf = [0u8; MAX_LINE];
        let n = conn.link.read(&mut buf).await.map_err(socket_error)?;
        if n == 0 {
            return Err("Connection closed by client.".into());
        }
        let lines = conn
            .decoder
            .feed(&buf[..n])
            .map_err(|e| format!("Malformed command: {e}"))?;
        conn.pending.extend(lines);
    }

    while let Some(line) = conn.pending.pop_front() {
        let cmd = match commands::parse(&line) {
            Ok(cmd) => cmd,
            Err(ParseError::Unknown(token)) => {
                warn!("Ignoring unknown command: {token}");
                sink.emit(&NodeEvent::CommandIgnored(line));
                continue;
            }
            Err(ParseError::BadArgs { token, reason }) => {
                conn.link
                    .send(&engine::reply(token, &reason))
                    .await
                    .map_err(socket_error)?;
                continue;
            }
        };

        match cmd {
            Command::Stream { freq_hz } => {
                if conn.stop_stream().await {
                    sink.emit(&NodeEvent::StreamStopped);
                }
                conn.stream = Some(StreamHandle::spawn(
                    *executor,
                    conn.link.clone(),
                    Rc::clone(node),
                    freq_hz,
                ));
                sink.emit(&NodeEvent::StreamStarted { freq_hz });
            }
            Command::Stop => {
                let payload = if conn.stop_stream().await {
                    sink.emit(&NodeEvent::StreamStopped);
                    "Streaming stopped"
                } else {
                    "No active stream"
                };
                conn.link
                    .send(&engine::reply("STOP", payload))
                    .await
                    .map_err(socket_error)?;
            }
            cmd => {
                let reply = engine::dispatch(&cmd, &mut *node.borrow_mut(), sink);
                if let Some(reply) = reply {
                    conn.link.send(&reply).await.map_err(socket_error)?;
                }
            }
        }
    }
    Ok(())
}

// ── ERROR ─────────────────────────────────────────────────────

pub async fn on_error<T, P, S>(ctx: Ctx<'_, '_, '_, T, P, S>) -> ConnState
where
    T: Listener,
    S: EventSink,
{
    let reason = ctx.error.take().unwrap_or_else(|| "Unknown error".into());
    warn!("Connection error: {reason}");
    if let Some(conn) = ctx.conn.take() {
        let remote = conn.remote;
        conn.teardown().await;
        info!("Client {remote} disconnected");
    }
    ctx.sink.emit(&NodeEvent::ClientDropped { reason });
    ConnState::Waiting
}
