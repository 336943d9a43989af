//! Pacing configuration for lock-step sessions.
//!
//! | Preset | ticdup | history | single tics |
//! |--------|--------|---------|-------------|
//! | `lan()` / default | 1 | 12 | no |
//! | `modem()` | 2 | 24 | no |
//! | `single_step()` | 1 | 12 | yes |
//!
//! # Example
//!
//! ```
//! use lockstep_tics::PacingConfig;
//!
//! let pacing = PacingConfig {
//!     stall_timeout_tics: 40,
//!     ..PacingConfig::modem()
//! };
//! assert!(pacing.validate().is_ok());
//! ```

use crate::command_history::{
    run_ahead_for, DEFAULT_HISTORY_CAPACITY, MAX_HISTORY_CAPACITY, MIN_HISTORY_CAPACITY,
};
use crate::LockstepError;

/// Largest supported duplication factor.
pub const MAX_TICDUP: i32 = 9;

/// Default spin bail-out bound, in ticdup-scaled clock tics.
pub const DEFAULT_STALL_TIMEOUT_TICS: i32 = 20;

/// How a session paces tic production and simulation.
///
/// # Forward Compatibility
///
/// New fields may be added to this struct in future versions. Construct it with
/// `..PacingConfig::default()` to keep compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "PacingConfig has no effect unless passed to SessionBuilder::with_pacing()"]
pub struct PacingConfig {
    /// Simulation steps per network tic. Each command drives this many steps.
    ///
    /// Default: 1
    pub ticdup: i32,

    /// Slots in the command history. Local production may run at most
    /// `history_capacity / 2 - 1` tics ahead of the simulation.
    ///
    /// Default: 12
    pub history_capacity: usize,

    /// How long [`FrameScheduler::tick`](crate::FrameScheduler::tick) busy-polls
    /// for consensus before giving the frame back to the caller.
    ///
    /// Default: 20
    pub stall_timeout_tics: i32,

    /// Synchronous local mode: every tick runs exactly one tic of locally
    /// produced commands and nothing is sent.
    ///
    /// Default: false
    pub single_tics: bool,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            ticdup: 1,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            stall_timeout_tics: DEFAULT_STALL_TIMEOUT_TICS,
            single_tics: false,
        }
    }
}

impl PacingConfig {
    /// Creates a new `PacingConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Low-latency networks: one command per simulation step.
    pub fn lan() -> Self {
        Self::default()
    }

    /// Slow links: every command drives two steps, halving the packet rate,
    /// with a deeper history to absorb jitter.
    pub fn modem() -> Self {
        Self {
            ticdup: 2,
            history_capacity: 24,
            ..Self::default()
        }
    }

    /// Local-only stepping, one tic per tick, without a transport.
    pub fn single_step() -> Self {
        Self {
            single_tics: true,
            ..Self::default()
        }
    }

    /// Checks every field against its supported range.
    pub fn validate(&self) -> Result<(), LockstepError> {
        if !(1..=MAX_TICDUP).contains(&self.ticdup) {
            return Err(LockstepError::InvalidConfig {
                info: format!("ticdup must be in 1..={}, got {}", MAX_TICDUP, self.ticdup),
            });
        }

        if !(MIN_HISTORY_CAPACITY..=MAX_HISTORY_CAPACITY).contains(&self.history_capacity) {
            return Err(LockstepError::InvalidConfig {
                info: format!(
                    "history_capacity must be in {}..={}, got {}",
                    MIN_HISTORY_CAPACITY, MAX_HISTORY_CAPACITY, self.history_capacity
                ),
            });
        }

        if self.stall_timeout_tics < 1 {
            return Err(LockstepError::InvalidConfig {
                info: format!(
                    "stall_timeout_tics must be at least 1, got {}",
                    self.stall_timeout_tics
                ),
            });
        }

        Ok(())
    }

    /// How far production may run ahead of the simulation under this config.
    ///
    /// Matches the bound the started session's command history enforces.
    #[must_use]
    pub fn max_run_ahead(&self) -> i32 {
        run_ahead_for(self.history_capacity)
    }
}
