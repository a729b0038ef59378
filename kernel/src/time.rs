//! Monotonic kernel clock
//!
//! Backed by the periodic timer interrupt: every tick advances the global
//! counter, and [`now_ns`] converts ticks to nanoseconds since boot. All
//! deadline arithmetic in the kernel uses saturating operations on these
//! values.

use core::sync::atomic::{AtomicU64, Ordering};

/// Timer interrupt frequency the PIT is programmed for.
pub const TIMER_HZ: u64 = 1000;

/// Nanoseconds represented by one timer tick.
pub const NS_PER_TICK: u64 = 1_000_000_000 / TIMER_HZ;

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Advance the clock by one tick. Called from the timer IRQ handler.
pub fn tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Ticks elapsed since boot.
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Nanoseconds elapsed since boot.
pub fn now_ns() -> u64 {
    ticks().saturating_mul(NS_PER_TICK)
}
