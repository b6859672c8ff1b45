//! Connection FSM driven end to end over the in-memory transport.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use async_io_mini::Timer;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future::block_on;

use propnode::adapters::sim::SimPin;
use propnode::app::events::NodeEvent;
use propnode::fsm::{ConnState, ConnectionFsm};
use propnode::rpc::stream::Executor;

use crate::fixtures::{bench, conf_frame};
use crate::mock_link::{self, Connector, MockListener, MockPeer, Recorder, settle};

type Fsm<'a> = ConnectionFsm<'a, 'a, MockListener, SimPin, Recorder>;

fn make_fsm<'a>(executor: &'a Executor<'a>) -> (Fsm<'a>, Connector) {
    let (listener, connector) = mock_link::listener();
    let node = Rc::new(RefCell::new(bench().node));
    let fsm = ConnectionFsm::new(executor, listener, node, Recorder::default(), conf_frame());
    (fsm, connector)
}

/// Run `body` as a task next to the ones it spawns, like the firmware's
/// main loop, and hand back its result.
fn drive<'a, T: 'a>(executor: &Executor<'a>, body: impl Future<Output = T> + 'a) -> T {
    block_on(executor.run(executor.spawn(body)))
}

/// INIT → WAITING → READY with one client attached.
async fn connect(fsm: &mut Fsm<'_>, connector: &Connector) -> MockPeer {
    if fsm.state() == ConnState::Init {
        assert_eq!(fsm.step().await, ConnState::Waiting);
    }
    let peer = connector.connect();
    assert_eq!(fsm.step().await, ConnState::Ready);
    peer
}

/// Deliver `line` and run one serving step.
async fn command(fsm: &mut Fsm<'_>, peer: &MockPeer, line: &str) -> ConnState {
    peer.send(line);
    fsm.step().await
}

fn events<'f>(fsm: &'f Fsm<'_>) -> &'f [NodeEvent] {
    &fsm.sink().events
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn conf_frame_is_first_thing_sent() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    let fsm = drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        let written = peer.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0], conf_frame());
        assert!(written[0].starts_with("CONF{\"deviceName\":\"Bench Node\""));
        fsm
    });
    assert!(matches!(events(&fsm)[0], NodeEvent::Started { sensors: 4, controls: 2, adcs: 2, .. }));
    assert!(
        events(&fsm)
            .iter()
            .any(|e| matches!(e, NodeEvent::ClientConnected(a) if a.port() == 40_000))
    );
}

#[test]
fn disconnect_goes_through_error_back_to_waiting() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    let fsm = drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        peer.hang_up();
        assert_eq!(fsm.step().await, ConnState::Error);
        assert_eq!(fsm.step().await, ConnState::Waiting);
        assert!(peer.is_closed());
        fsm
    });
    assert!(events(&fsm).contains(&NodeEvent::ClientDropped {
        reason: "Connection closed by client.".into()
    }));
    assert!(events(&fsm).contains(&NodeEvent::StateChanged {
        from: ConnState::Error,
        to: ConnState::Waiting
    }));
}

#[test]
fn next_client_is_served_after_error() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    drive(&executor, async move {
        let first = connect(&mut fsm, &connector).await;
        first.hang_up();
        fsm.step().await;
        fsm.step().await;

        let second = connect(&mut fsm, &connector).await;
        assert_eq!(second.written(), [conf_frame()]);
        assert_eq!(command(&mut fsm, &second, "STATUS\n").await, ConnState::Ready);
        assert!(second.last().unwrap().starts_with("STATUS "));
        assert_eq!(first.written().len(), 1);
    });
}

#[test]
fn overlong_line_drops_the_client() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        let junk = "A".repeat(300);
        // The first read only fills the line buffer; the second overflows it.
        let mut state = command(&mut fsm, &peer, &junk).await;
        if state == ConnState::Ready {
            state = fsm.step().await;
        }
        assert_eq!(state, ConnState::Error);
        assert_eq!(fsm.step().await, ConnState::Waiting);
        assert!(peer.is_closed());
    });
}

#[test]
fn shutdown_closes_client_and_returns_to_init() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        command(&mut fsm, &peer, "STREAM\n").await;
        fsm.shutdown().await;
        assert!(peer.is_closed());
        assert_eq!(fsm.state(), ConnState::Init);
    });
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn gets_reports_every_sensor() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        assert_eq!(command(&mut fsm, &peer, "GETS\n").await, ConnState::Ready);
        let reply = peer.last().unwrap();
        let mut fields = reply.trim_end().split(' ');
        assert_eq!(fields.next(), Some("GETS"));
        assert!(fields.next().unwrap().parse::<u64>().is_ok());
        let names: Vec<&str> = fields.map(|f| f.split(':').next().unwrap()).collect();
        assert_eq!(names, ["TC1", "PT1", "LC1", "IS1"]);
    });
}

#[test]
fn control_already_open_is_reported_not_redriven() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    let fsm = drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        command(&mut fsm, &peer, "CONTROL VALVE1 OPEN\n").await;
        assert_eq!(peer.last().unwrap(), "CONTROL VALVE1 opened\n");
        command(&mut fsm, &peer, "CONTROL VALVE1 OPEN\n").await;
        assert_eq!(peer.last().unwrap(), "CONTROL VALVE1 already open\n");
        command(&mut fsm, &peer, "STATUS\n").await;
        assert_eq!(
            peer.last().unwrap(),
            "STATUS {\"VALVE1\":\"OPEN\",\"VENT\":\"OPEN\"}\n"
        );
        fsm
    });
    let actuations = events(&fsm)
        .iter()
        .filter(|e| matches!(e, NodeEvent::ControlActuated { .. }))
        .count();
    assert_eq!(actuations, 1);
}

#[test]
fn control_usage_and_unknown_names() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        command(&mut fsm, &peer, "CONTROL VALVE1\n").await;
        assert_eq!(
            peer.last().unwrap(),
            "CONTROL Usage: CONTROL <name> <OPEN|CLOSE>\n"
        );
        command(&mut fsm, &peer, "CONTROL PUMP OPEN\n").await;
        assert_eq!(peer.last().unwrap(), "CONTROL Unknown control: PUMP\n");
        assert_eq!(fsm.state(), ConnState::Ready);
    });
}

#[test]
fn unknown_command_gets_no_response() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    let fsm = drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        let before = peer.written().len();
        assert_eq!(command(&mut fsm, &peer, "HELLO there\n").await, ConnState::Ready);
        assert_eq!(peer.written().len(), before);
        assert!(!peer.is_closed());
        fsm
    });
    assert!(events(&fsm).contains(&NodeEvent::CommandIgnored("HELLO there".into())));
}

#[test]
fn several_commands_in_one_read() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        command(&mut fsm, &peer, "STATUS\r\nSTOP\n").await;
        let written = peer.written();
        assert!(written[1].starts_with("STATUS {"));
        assert_eq!(written[2], "STOP No active stream\n");
    });
}

// ── Streaming ─────────────────────────────────────────────────

#[test]
fn stream_then_stop() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    let fsm = drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        assert_eq!(command(&mut fsm, &peer, "STREAM 50\n").await, ConnState::Streaming);
        settle(10).await;
        assert!(peer.stream_frames() >= 1);
        assert!(peer.written()[1].starts_with("STRM "));

        assert_eq!(command(&mut fsm, &peer, "STOP\n").await, ConnState::Ready);
        assert_eq!(peer.last().unwrap(), "STOP Streaming stopped\n");
        let frames = peer.stream_frames();
        settle(50).await;
        assert_eq!(peer.stream_frames(), frames);
        fsm
    });
    assert!(events(&fsm).contains(&NodeEvent::StreamStarted { freq_hz: Some(50.0) }));
    assert!(events(&fsm).contains(&NodeEvent::StreamStopped));
}

#[test]
fn invalid_stream_frequency_is_rejected() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        assert_eq!(command(&mut fsm, &peer, "STREAM fast\n").await, ConnState::Ready);
        assert_eq!(peer.last().unwrap(), "STREAM Invalid frequency: fast\n");
    });
}

#[test]
fn disconnect_cancels_running_stream() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        assert_eq!(command(&mut fsm, &peer, "STREAM\n").await, ConnState::Streaming);
        settle(10).await;
        assert!(peer.stream_frames() > 1);

        peer.hang_up();
        assert_eq!(fsm.step().await, ConnState::Error);
        assert_eq!(fsm.step().await, ConnState::Waiting);

        let frames = peer.stream_frames();
        settle(50).await;
        assert_eq!(peer.stream_frames(), frames, "no writes after cancellation");
    });
}

#[test]
fn second_stream_replaces_the_first() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    let fsm = drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        command(&mut fsm, &peer, "STREAM\n").await;
        settle(5).await;
        command(&mut fsm, &peer, "STREAM 20\n").await;
        settle(5).await;

        // One STOP ends all streaming: there was only ever one task alive.
        command(&mut fsm, &peer, "STOP\n").await;
        assert_eq!(peer.last().unwrap(), "STOP Streaming stopped\n");
        let frames = peer.stream_frames();
        settle(50).await;
        assert_eq!(peer.stream_frames(), frames);

        command(&mut fsm, &peer, "STOP\n").await;
        assert_eq!(peer.last().unwrap(), "STOP No active stream\n");
        fsm
    });
    let stopped = events(&fsm)
        .iter()
        .filter(|e| **e == NodeEvent::StreamStopped)
        .count();
    assert_eq!(stopped, 2);
}

#[test]
fn unthrottled_stream_leaves_room_for_commands() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        assert_eq!(command(&mut fsm, &peer, "STREAM\n").await, ConnState::Streaming);
        settle(20).await;

        let state = command(&mut fsm, &peer, "CONTROL VALVE1 OPEN\n").await;
        assert_eq!(state, ConnState::Streaming);
        assert!(peer.written().iter().any(|f| f == "CONTROL VALVE1 opened\n"));
        settle(20).await;

        assert_eq!(command(&mut fsm, &peer, "STOP\n").await, ConnState::Ready);
        assert_eq!(peer.last().unwrap(), "STOP Streaming stopped\n");
    });
}

#[test]
fn idle_server_task_hears_stop_over_a_busy_stream() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    let shutdown = Rc::new(Signal::<NoopRawMutex, ()>::new());
    let peer = connector.connect();

    let server = {
        let shutdown = Rc::clone(&shutdown);
        executor.spawn(async move {
            fsm.run_until(shutdown.wait()).await;
            fsm
        })
    };
    drive(&executor, async {
        settle(5).await;
        assert_eq!(peer.written(), [conf_frame()]);

        // The server task is parked on its next read while the stream
        // keeps the run queue full.
        peer.send("STREAM\n");
        settle(20).await;
        assert!(peer.stream_frames() > 1);
        peer.send("STOP\n");
        settle(10).await;
        assert_eq!(peer.last().unwrap(), "STOP Streaming stopped\n");
        let frames = peer.stream_frames();
        settle(20).await;
        assert_eq!(peer.stream_frames(), frames);

        shutdown.signal(());
        let fsm = server.await;
        assert_eq!(fsm.state(), ConnState::Init);
    });
    assert!(peer.is_closed());
}

#[test]
fn operator_stop_tears_down_a_streaming_client() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    let interrupt = Rc::new(Signal::<NoopRawMutex, ()>::new());
    let peer = connector.connect();

    let server = {
        let interrupt = Rc::clone(&interrupt);
        executor.spawn(async move {
            fsm.run_until(interrupt.wait()).await;
            fsm
        })
    };
    let fsm = drive(&executor, async {
        peer.send("STREAM 200\n");
        settle(10).await;
        assert!(peer.stream_frames() >= 1);

        interrupt.signal(());
        server.await
    });

    assert!(peer.is_closed());
    assert_eq!(fsm.state(), ConnState::Init);
    assert!(events(&fsm).contains(&NodeEvent::ClientDropped {
        reason: "Shutdown".into()
    }));
    let frames = peer.stream_frames();
    drive(&executor, settle(20));
    assert_eq!(peer.stream_frames(), frames);
}

#[test]
fn timed_stream_is_paced_by_the_clock() {
    let executor = Executor::new();
    let (mut fsm, connector) = make_fsm(&executor);
    drive(&executor, async move {
        let peer = connect(&mut fsm, &connector).await;
        assert_eq!(command(&mut fsm, &peer, "STREAM 100\n").await, ConnState::Streaming);
        Timer::after(Duration::from_millis(100)).await;

        // Roughly one frame per 10 ms, never a back-to-back flood.
        let frames = peer.stream_frames();
        assert!((2..=20).contains(&frames), "{frames} frames in 100 ms");

        assert_eq!(command(&mut fsm, &peer, "STOP\n").await, ConnState::Ready);
    });
}
