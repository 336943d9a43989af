//! Per-frame pacing of the simulation.
//!
//! [`FrameScheduler::tick`] is the single entry point a game loop calls once
//! per rendered frame. It decides how many network tics the simulation may
//! advance, busy-polls the network until consensus covers them (bounded by the
//! stall timeout), and then drives the [`Simulator`] through `ticdup` steps per
//! tic.
//!
//! The step count follows wall time, nudged toward the consensus tic:
//!
//! | condition | tics run |
//! |-----------|----------|
//! | `real < available - 1` | `real + 1` (catch up) |
//! | `real < available` | `real` |
//! | otherwise | `available` |
//!
//! and never fewer than one, so a frame always either simulates or reports a stall.

use std::sync::Arc;

use crate::clock::Clock;
use crate::command_history::CommandHistory;
use crate::network::network_stats::NetworkStats;
use crate::outbound::{OutboundScheduler, OutboundWindow};
use crate::sessions::config::PacingConfig;
use crate::sync_state::SyncState;
use crate::telemetry::ViolationObserver;
use crate::{Config, Simulator, Tic, UiTicker};

/// What one [`FrameScheduler::tick`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[must_use = "TickOutcome reports whether the frame stalled"]
pub struct TickOutcome {
    /// Simulation steps executed (groups times `ticdup`).
    pub ran_steps: u32,
    /// The frame gave up waiting for consensus without simulating.
    pub stalled: bool,
}

impl TickOutcome {
    /// The outcome of a frame that timed out waiting for consensus.
    pub const STALLED: Self = Self {
        ran_steps: 0,
        stalled: true,
    };
}

/// Result of one iteration of the consensus wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpinStatus {
    /// Consensus covers every tic this frame wants to run.
    Ready,
    /// Still waiting; poll again.
    Continuing,
    /// The stall timeout elapsed.
    Stalled,
}

/// Owns the state of one lock-step session and paces it frame by frame.
///
/// Created by [`SessionBuilder::start_session`](crate::SessionBuilder::start_session).
///
/// # Liveness
///
/// The consensus wait is bounded by wall time only. A [`Clock`] that never
/// advances while consensus is missing keeps `tick` spinning; hand-driven
/// clocks in tests should use [`ManualClock::set_auto_advance`](crate::ManualClock::set_auto_advance).
pub struct FrameScheduler<T: Config> {
    state: SyncState,
    history: CommandHistory<T::Command>,
    outbound: OutboundScheduler<T>,
    clock: Box<dyn Clock>,
    pacing: PacingConfig,
    /// Ticdup-scaled clock reading at the start of the previous tick.
    last_enter_tic: i32,
}

impl<T: Config> FrameScheduler<T> {
    pub(crate) fn new(
        pacing: PacingConfig,
        clock: Box<dyn Clock>,
        outbound: OutboundScheduler<T>,
        history: CommandHistory<T::Command>,
        start_time: i32,
    ) -> Self {
        Self {
            state: SyncState::new(pacing.ticdup),
            history,
            outbound,
            clock,
            pacing,
            last_enter_tic: start_time,
        }
    }

    /// Advances the session by one rendered frame.
    ///
    /// Runs zero or more simulation steps. `ui.on_step()` is called before each
    /// step; `ui.on_stall()` is called once if the frame times out waiting for
    /// peers, in which case nothing is simulated.
    pub fn tick(&mut self, sim: &mut impl Simulator<T>, ui: &mut impl UiTicker) -> TickOutcome {
        if self.pacing.single_tics {
            return self.tick_single(sim, ui);
        }

        let ticdup = self.state.ticdup;
        let enter_tic = self.clock.tics() / ticdup;
        let real_tics = (enter_tic - self.last_enter_tic).max(0);
        self.last_enter_tic = enter_tic;

        self.net_update();

        let available = self.state.available_tics();
        let counts = Self::tics_to_run(real_tics, available);
        tracing::trace!(
            real_tics,
            available,
            counts,
            gametic = %self.state.gametic,
            nettics = %self.state.nettics,
            "frame pacing decided"
        );

        loop {
            match self.spin_once(enter_tic, counts) {
                SpinStatus::Ready => break,
                SpinStatus::Continuing => {},
                SpinStatus::Stalled => {
                    self.outbound.stats_mut().stalls += 1;
                    tracing::debug!(
                        gametic = %self.state.gametic,
                        nettics = %self.state.nettics,
                        wanted = counts,
                        "no consensus within the stall timeout, frame skipped"
                    );
                    ui.on_stall();
                    return TickOutcome::STALLED;
                },
            }
        }

        self.run_tics(counts, sim, ui)
    }

    /// Network tics to run this frame for `real_tics` of elapsed wall time
    /// when `available` tics are covered by consensus. Always at least 1.
    #[must_use]
    pub fn tics_to_run(real_tics: i32, available: i32) -> i32 {
        let counts = if real_tics < available - 1 {
            real_tics + 1
        } else if real_tics < available {
            real_tics
        } else {
            available
        };
        counts.max(1)
    }

    /// One iteration of the consensus wait for a frame entered at `enter_tic`
    /// that wants to run `counts` tics.
    ///
    /// Pulls fresh packets when consensus is short, then checks the stall
    /// timeout. Performs no UI work.
    pub fn spin_once(&mut self, enter_tic: i32, counts: i32) -> SpinStatus {
        if self.consensus_covers(counts) {
            return SpinStatus::Ready;
        }

        self.net_update();
        if self.consensus_covers(counts) {
            return SpinStatus::Ready;
        }

        let waited = self.clock.tics() / self.state.ticdup - enter_tic;
        if waited >= self.pacing.stall_timeout_tics {
            SpinStatus::Stalled
        } else {
            SpinStatus::Continuing
        }
    }

    fn consensus_covers(&self, counts: i32) -> bool {
        self.state.available_tics() >= counts
    }

    /// Synchronous local stepping: one tic per call, independent of the clock.
    fn tick_single(&mut self, sim: &mut impl Simulator<T>, ui: &mut impl UiTicker) -> TickOutcome {
        if self.state.maketic <= self.state.game_net_tic() {
            self.outbound
                .produce_now(&mut self.state, &mut self.history);
        }
        self.state.resendto = self.state.maketic;
        self.state.nettics = self.state.maketic;
        self.run_tics(1, sim, ui)
    }

    /// Runs `counts` groups of `ticdup` steps, refreshing the network after each group.
    fn run_tics(
        &mut self,
        counts: i32,
        sim: &mut impl Simulator<T>,
        ui: &mut impl UiTicker,
    ) -> TickOutcome {
        let ticdup = self.state.ticdup;
        let mut ran_steps = 0u32;

        for _ in 0..counts {
            let net_tic = self.state.game_net_tic();
            let command = self.history.command_at(net_tic);
            for _ in 0..ticdup {
                ui.on_step();
                sim.run_step(self.state.gametic, &command);
                self.state.gametic += 1;
                ran_steps += 1;
            }
            if !self.pacing.single_tics {
                self.net_update();
            }
        }

        self.outbound.stats_mut().steps_run += u64::from(ran_steps);
        crate::debug_check_invariants!(self.state, "after running tics");
        TickOutcome {
            ran_steps,
            stalled: false,
        }
    }

    /// Runs the outbound scheduler against the current clock outside of [`tick`](Self::tick).
    ///
    /// Render loops call this between frames to keep production and the
    /// network flowing. A no-op if no wall tic elapsed since the last update.
    pub fn net_update(&mut self) -> Option<OutboundWindow> {
        let clock_tics = self.clock.tics();
        self.outbound
            .update(&mut self.state, &mut self.history, clock_tics)
    }

    /// Adds `tics` of pacing debt: the next `tics` elapsed wall tics produce
    /// no commands. Negative values are ignored.
    pub fn skip_tics(&mut self, tics: i32) {
        self.state.skiptics += tics.max(0);
    }

    /// The session counters.
    #[must_use]
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Locally produced commands.
    #[must_use]
    pub fn history(&self) -> &CommandHistory<T::Command> {
        &self.history
    }

    /// The next simulation step to execute.
    #[must_use]
    pub fn current_tic(&self) -> Tic {
        self.state.gametic
    }

    /// The pacing this session was started with.
    #[must_use]
    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    /// Cumulative network and pacing counters.
    pub fn network_stats(&self) -> NetworkStats {
        self.outbound.stats()
    }

    /// The observer registered with
    /// [`SessionBuilder::with_violation_observer`](crate::SessionBuilder::with_violation_observer), if any.
    #[must_use]
    pub fn violation_observer(&self) -> Option<&Arc<dyn ViolationObserver>> {
        self.outbound.violation_observer()
    }
}

impl<T: Config> std::fmt::Debug for FrameScheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("state", &self.state)
            .field("pacing", &self.pacing)
            .field("last_enter_tic", &self.last_enter_tic)
            .field("outbound", &self.outbound)
            .finish_non_exhaustive()
    }
}
