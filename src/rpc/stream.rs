//! Background sensor stream (`STREAM [freq_hz]`).
//!
//! ```text
//!   ┌───────────── stream task ─────────────┐
//!   │ loop:                                 │
//!   │   stop signalled?  ── yes ──▶ exit    │
//!   │   send "STRM <gets payload>\n"        │──▶ SharedLink
//!   │   race(stop.wait, sleep 1/f | yield)  │
//!   └───────────────────────────────────────┘
//! ```
//!
//! At most one stream exists per connection; its [`StreamHandle`] lives in
//! the FSM's connection record.  Cancellation is cooperative: the task sees
//! the stop signal at its next suspension point and exits between two
//! frames, never in the middle of one.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use edge_executor::Task;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use embedded_hal::digital::StatefulOutputPin;
use futures_lite::future;
use log::{debug, info};

use super::transport::{Link, SharedLink};
use crate::app::service::NodeService;

/// Executor shared by the connection FSM, the stream task and the SSDP
/// responder.
pub type Executor<'a> = edge_executor::LocalExecutor<'a, 8>;

type StopSignal = Signal<NoopRawMutex, ()>;

/// Slowest frame interval; tiny rates are clamped to it.
const MAX_PERIOD: Duration = Duration::from_secs(3600);

pub struct StreamHandle {
    stop: Rc<StopSignal>,
    task: Task<()>,
}

impl StreamHandle {
    /// Spawn the stream task.  `None` streams back to back, yielding to the
    /// executor between frames; the caller must itself run as a task on
    /// `executor` so the two share its run queue.
    pub fn spawn<'a, L, P>(
        executor: &Executor<'a>,
        link: SharedLink<L>,
        node: Rc<RefCell<NodeService<P>>>,
        freq_hz: Option<f32>,
    ) -> Self
    where
        L: Link + 'a,
        P: StatefulOutputPin + 'a,
    {
        let stop = Rc::new(StopSignal::new());
        let period = freq_hz.map(frame_period);
        let task = executor.spawn(run(link, node, Rc::clone(&stop), period));
        info!("stream started ({})", describe(freq_hz));
        Self { stop, task }
    }

    /// The task exited on its own (write failure).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task and wait for it to finish.
    pub async fn stop(self) {
        self.stop.signal(());
        self.task.await;
        info!("stream stopped");
    }
}

async fn run<L: Link, P: StatefulOutputPin>(
    link: SharedLink<L>,
    node: Rc<RefCell<NodeService<P>>>,
    stop: Rc<StopSignal>,
    period: Option<Duration>,
) {
    loop {
        if stop.signaled() {
            break;
        }
        let frame = format!("STRM {}\n", node.borrow_mut().gets_payload());
        if let Err(e) = link.send(&frame).await {
            debug!("stream write failed: {e}");
            break;
        }
        let stopped = future::or(
            async {
                stop.wait().await;
                true
            },
            async {
                match period {
                    Some(period) => {
                        async_io_mini::Timer::after(period).await;
                    }
                    None => future::yield_now().await,
                }
                false
            },
        )
        .await;
        if stopped {
            break;
        }
    }
}

/// Interval between frames at `freq_hz`, never longer than [`MAX_PERIOD`].
fn frame_period(freq_hz: f32) -> Duration {
    Duration::try_from_secs_f32(1.0 / freq_hz).map_or(MAX_PERIOD, |p| p.min(MAX_PERIOD))
}

fn describe(freq_hz: Option<f32>) -> String {
    freq_hz.map_or_else(|| "unthrottled".into(), |f| format!("{f} Hz"))
}
