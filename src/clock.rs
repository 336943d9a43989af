//! Wall clocks measured in tics.
//!
//! The engine only ever reads a monotonically increasing tic count; it never
//! sleeps. [`WallClock`] derives the count from real time, [`ManualClock`] is
//! advanced by hand and is what tests and replays use.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use web_time::Instant;

/// Default tic rate in Hz (the reference engine's 35 Hz timer).
pub const DEFAULT_TIC_RATE: u32 = 35;

/// A source of elapsed wall time in clock tics.
pub trait Clock {
    /// Clock tics elapsed since some fixed origin. Must never decrease.
    fn tics(&self) -> i32;
}

/// Real-time clock counting `rate` tics per second since construction.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
    rate: u32,
}

impl WallClock {
    /// Creates a clock ticking `rate` times per second, starting at 0 now.
    ///
    /// A rate of 0 is treated as 1.
    #[must_use]
    pub fn new(rate: u32) -> Self {
        Self {
            origin: Instant::now(),
            rate: rate.max(1),
        }
    }

    /// Tics per second.
    #[must_use]
    pub fn rate(&self) -> u32 {
        self.rate
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIC_RATE)
    }
}

impl Clock for WallClock {
    fn tics(&self) -> i32 {
        let elapsed = self.origin.elapsed();
        let tics = elapsed.as_micros() * u128::from(self.rate) / 1_000_000;
        i32::try_from(tics).unwrap_or(i32::MAX)
    }
}

/// Hand-driven clock. Clones share the same counter.
///
/// With an auto-advance step set, every read moves the clock forward by that
/// many tics after reporting it, which emulates time passing while the frame
/// scheduler busy-waits.
///
/// # Example
///
/// ```
/// use lockstep_tics::{Clock, ManualClock};
///
/// let clock = ManualClock::new(10);
/// let handle = clock.clone();
/// handle.advance(5);
/// assert_eq!(clock.tics(), 15);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI32>,
    auto_advance: Arc<AtomicI32>,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    #[must_use]
    pub fn new(start: i32) -> Self {
        Self {
            now: Arc::new(AtomicI32::new(start)),
            auto_advance: Arc::new(AtomicI32::new(0)),
        }
    }

    /// Moves the clock forward by `tics`.
    pub fn advance(&self, tics: i32) {
        self.now.fetch_add(tics.max(0), Ordering::SeqCst);
    }

    /// Sets the clock to `tics`. Ignored if that would move it backwards.
    pub fn set(&self, tics: i32) {
        self.now.fetch_max(tics, Ordering::SeqCst);
    }

    /// Makes every subsequent read advance the clock by `step` tics.
    pub fn set_auto_advance(&self, step: i32) {
        self.auto_advance.store(step.max(0), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn tics(&self) -> i32 {
        let step = self.auto_advance.load(Ordering::SeqCst);
        self.now.fetch_add(step, Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn tics(&self) -> i32 {
        (**self).tics()
    }
}
