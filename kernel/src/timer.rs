//! Monotonic and realtime clocks, and the one-shot deadline timer (spec §3
//! "Timer", §4.9).
//!
//! The teacher reads the x86 TSC/PIT directly from ring 0; this host-side
//! kernel has no such access and uses `std::time` instead, the same
//! substitution the rest of this crate makes wherever the teacher's code
//! assumed bare-metal hardware access.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Timer {
    boot: Instant,
    /// Wall-clock time at construction, captured once (spec §3:
    /// "boot_time_ns (captured at init)").
    boot_time_ns: u64,
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        let boot_time_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_nanos() as u64;
        Self {
            boot: Instant::now(),
            boot_time_ns,
            deadline: None,
        }
    }

    /// Nanoseconds since this kernel's boot. Never goes backwards.
    pub fn monotonic_now_nanos(&self) -> u64 {
        self.boot.elapsed().as_nanos() as u64
    }

    /// `boot_time_ns + monotonic_ns` (spec §4.9), always `>= boot_time_ns`.
    pub fn realtime_now_nanos(&self) -> u64 {
        self.boot_time_ns + self.monotonic_now_nanos()
    }

    /// Arm a one-shot deadline `delay_nanos` from now.
    pub fn set_timer(&mut self, delay_nanos: u64) {
        self.deadline = Some(Instant::now() + Duration::from_nanos(delay_nanos));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether the armed deadline has passed. `false` if no deadline is set.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
