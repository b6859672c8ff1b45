//! Monotonic uptime clock.
//!
//! - **`target_os = "espidf"`** — `esp_timer_get_time()` (µs since boot).
//! - **otherwise** — `std::time::Instant` captured at construction.
//!
//! Used for the timestamp that prefixes every GETS/STRM payload.

pub struct Uptime {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Uptime {
    fn default() -> Self {
        Self::new()
    }
}

impl Uptime {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn millis(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since this clock was created.
    #[cfg(not(target_os = "espidf"))]
    pub fn millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
