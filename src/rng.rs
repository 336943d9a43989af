//! Small PCG32 generator for fault injection.
//!
//! Only [`ChaosTransport`](crate::ChaosTransport) draws random numbers; the
//! engine itself is fully deterministic. A fixed seed reproduces the exact same
//! sequence of drops, duplicates and reorders on every run.
//!
//! ```rust
//! use lockstep_tics::rng::{Pcg32, Rng, SeedableRng};
//!
//! let mut rng = Pcg32::seed_from_u64(12345);
//! let value = rng.gen_range(0..100);
//! assert!(value < 100);
//! ```

use crate::{
    report_violation,
    telemetry::{ViolationKind, ViolationSeverity},
};

/// PCG32 random number generator (PCG-XSH-RR, 64-bit state).
///
/// Not cryptographically secure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

/// Default increment for single-stream PCG32.
const PCG_DEFAULT_INCREMENT: u64 = 1442695040888963407;

/// Multiplier of the underlying LCG.
const PCG_MULTIPLIER: u64 = 6364136223846793005;

impl Pcg32 {
    /// Creates a generator from an initial state and a stream selector.
    #[must_use]
    pub const fn new(state: u64, stream: u64) -> Self {
        let inc = (stream << 1) | 1;
        let mut pcg = Self { state: 0, inc };
        pcg.state = pcg.state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(pcg.inc);
        pcg.state = pcg.state.wrapping_add(state);
        pcg.state = pcg.state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(pcg.inc);
        pcg
    }

    /// Generates the next 32-bit random value.
    #[inline]
    #[must_use]
    pub fn next_u32(&mut self) -> u32 {
        let old_state = self.state;
        self.state = old_state
            .wrapping_mul(PCG_MULTIPLIER)
            .wrapping_add(self.inc);
        let xorshifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Generates the next 64-bit random value from two 32-bit draws.
    #[inline]
    #[must_use]
    pub fn next_u64(&mut self) -> u64 {
        let high = u64::from(self.next_u32());
        let low = u64::from(self.next_u32());
        (high << 32) | low
    }
}

/// Construction of generators from seeds.
pub trait SeedableRng: Sized {
    /// Creates a generator seeded from a 64-bit value.
    #[must_use]
    fn seed_from_u64(seed: u64) -> Self;

    /// Creates a generator seeded from the system clock. Not reproducible.
    #[must_use]
    fn from_entropy() -> Self;
}

impl SeedableRng for Pcg32 {
    fn seed_from_u64(seed: u64) -> Self {
        Self::new(seed, PCG_DEFAULT_INCREMENT)
    }

    fn from_entropy() -> Self {
        Self::seed_from_u64(timing_entropy_seed())
    }
}

/// Random draws on top of a 32/64-bit source.
pub trait Rng {
    /// Returns the next 32-bit random value.
    fn next_u32(&mut self) -> u32;

    /// Returns the next 64-bit random value.
    fn next_u64(&mut self) -> u64;

    /// Generates a `u32` in `[low, high)` without modulo bias.
    ///
    /// # Empty Range Behavior
    /// If `range.is_empty()`, reports a violation via telemetry and returns `range.start`.
    fn gen_range(&mut self, range: std::ops::Range<u32>) -> u32 {
        let span = range.end.wrapping_sub(range.start);
        if range.is_empty() || span == 0 {
            report_violation!(
                ViolationSeverity::Error,
                ViolationKind::Configuration,
                "gen_range called with empty range [{}..{})",
                range.start,
                range.end
            );
            return range.start;
        }

        let threshold = span.wrapping_neg() % span;
        loop {
            let random_value = self.next_u32();
            if random_value >= threshold {
                return range.start.wrapping_add(random_value % span);
            }
        }
    }

    /// Returns `true` with the given probability, clamped to `[0.0, 1.0]`.
    fn gen_bool(&mut self, probability: f64) -> bool {
        let p = probability.clamp(0.0, 1.0);
        if p >= 1.0 {
            return true;
        }
        let threshold = (p * f64::from(u32::MAX)) as u32;
        self.next_u32() < threshold
    }
}

impl Rng for Pcg32 {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        Self::next_u32(self)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        Self::next_u64(self)
    }
}

/// Seed from the wall clock mixed with a splitmix64 finalizer.
fn timing_entropy_seed() -> u64 {
    use web_time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9e3779b97f4a7c15);

    let mut z = nanos.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}
