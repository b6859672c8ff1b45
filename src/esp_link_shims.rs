//! ESP-IDF time driver for `embassy-time`, which backs the stream's
//! `async_io_mini::Timer`.

use core::task::Waker;
use core::time::Duration;

/// Microseconds since boot; the driver ticks at 1 MHz.
#[unsafe(no_mangle)]
fn _embassy_time_now() -> u64 {
    // SAFETY: esp_timer is started by the IDF before `main`.
    unsafe { esp_idf_svc::sys::esp_timer_get_time() as u64 }
}

/// Wake `waker` once `at` has passed.
#[unsafe(no_mangle)]
fn _embassy_time_schedule_wake(at: u64, waker: &Waker) {
    let waker = waker.clone();
    std::thread::spawn(move || {
        let now = _embassy_time_now();
        if at > now {
            std::thread::sleep(Duration::from_micros(at - now));
        }
        waker.wake();
    });
}
