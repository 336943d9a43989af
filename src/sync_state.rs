use crate::telemetry::{InvariantChecker, InvariantViolation};
use crate::Tic;

/// Counters shared by the outbound scheduler, packet ingest and frame scheduler.
///
/// One `SyncState` exists per session. It is created with every counter at 0
/// and lives until the session is dropped.
///
/// | field | unit | meaning |
/// |-------|------|---------|
/// | `maketic` | network tics | next tic to produce locally (exclusive upper bound) |
/// | `gametic` | simulation steps | step currently executed by the simulation |
/// | `resendto` | network tics | first tic of the next outbound window |
/// | `nettics` | network tics | consensus: first tic not yet known complete |
/// | `skiptics` | network tics | pacing debt that suppresses local production |
/// | `ticdup` | steps per tic | duplication factor |
///
/// # Note
///
/// This type is re-exported in [`__internal`](crate::__internal) for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    /// Highest locally produced tic, exclusive.
    pub maketic: Tic,
    /// Simulation step currently being executed.
    pub gametic: Tic,
    /// Base tic of the window that has not been sent yet.
    pub resendto: Tic,
    /// Lowest tic known complete across all tracked peers.
    pub nettics: Tic,
    /// Pending production debt.
    pub skiptics: i32,
    /// Simulation steps per network tic.
    pub ticdup: i32,
}

impl SyncState {
    /// Session-start state: all counters at 0.
    ///
    /// `ticdup` is clamped to at least 1.
    #[must_use]
    pub fn new(ticdup: i32) -> Self {
        Self {
            maketic: Tic::ZERO,
            gametic: Tic::ZERO,
            resendto: Tic::ZERO,
            nettics: Tic::ZERO,
            skiptics: 0,
            ticdup: ticdup.max(1),
        }
    }

    /// The simulated position in network tics (`gametic / ticdup`).
    #[inline]
    #[must_use]
    pub fn game_net_tic(&self) -> Tic {
        self.gametic.per_dup(self.ticdup)
    }

    /// How far local production runs ahead of the simulation, in network tics.
    #[inline]
    #[must_use]
    pub fn run_ahead(&self) -> i32 {
        self.maketic - self.game_net_tic()
    }

    /// Network tics that may be simulated now: `nettics - gametic / ticdup`.
    ///
    /// The local node is one of the tracked peers, so consensus never runs
    /// past `maketic` even when the remote side has produced further.
    #[inline]
    #[must_use]
    pub fn available_tics(&self) -> i32 {
        self.nettics.min(self.maketic) - self.game_net_tic()
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new(1)
    }
}

impl InvariantChecker for SyncState {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.ticdup < 1 {
            return Err(InvariantViolation::new("SyncState", "ticdup must be at least 1")
                .with_details(format!("ticdup={}", self.ticdup)));
        }
        if self.skiptics < 0 {
            return Err(InvariantViolation::new("SyncState", "skiptics went negative")
                .with_details(format!("skiptics={}", self.skiptics)));
        }
        if self.resendto > self.maketic {
            return Err(
                InvariantViolation::new("SyncState", "resendto ahead of maketic").with_details(
                    format!("resendto={}, maketic={}", self.resendto, self.maketic),
                ),
            );
        }
        if self.game_net_tic() > self.maketic {
            return Err(InvariantViolation::new(
                "SyncState",
                "simulation ran past local production",
            )
            .with_details(format!(
                "gametic={}, ticdup={}, maketic={}",
                self.gametic, self.ticdup, self.maketic
            )));
        }
        if self.game_net_tic() > self.nettics {
            return Err(InvariantViolation::new(
                "SyncState",
                "simulation ran past the consensus tic",
            )
            .with_details(format!(
                "gametic={}, ticdup={}, nettics={}",
                self.gametic, self.ticdup, self.nettics
            )));
        }
        Ok(())
    }
}
