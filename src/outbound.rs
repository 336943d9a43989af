//! Local tic production and outbound window framing.
//!
//! Called at least once per frame (and repeatedly while the frame scheduler
//! waits for consensus), [`OutboundScheduler::update`] does real work at most
//! once per elapsed wall tic:
//!
//! 1. turn elapsed wall time into a number of new tics,
//! 2. pay off any pacing debt (`skiptics`),
//! 3. sample input and append one command per new tic to the history, stopping
//!    at the run-ahead bound,
//! 4. frame everything produced since the last call as one window and send it,
//! 5. drain inbound packets into the consensus tic.

use std::sync::Arc;

use crate::command_history::CommandHistory;
use crate::network::codec;
use crate::network::messages::TicPacket;
use crate::network::network_stats::NetworkStats;
use crate::packet_ingest::ingest;
use crate::report_violation_to;
use crate::sync_state::SyncState;
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{Config, InputSource, Tic, Transport};

/// The window framed by one [`OutboundScheduler::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundWindow {
    /// First tic in the window (the previous `resendto`).
    pub start: Tic,
    /// Tics in the window (`maketic - resendto`).
    pub num_tics: i32,
}

impl OutboundWindow {
    /// One past the last tic in the window.
    #[must_use]
    pub fn end(&self) -> Tic {
        self.start + self.num_tics
    }
}

/// Produces local commands and frames outbound windows.
///
/// Owns the input source and the transport. There is no retry buffer: once a
/// window has been handed to the transport, `resendto` moves past it whether or
/// not a peer ever sees it.
pub struct OutboundScheduler<T: Config> {
    input: Box<dyn InputSource<T>>,
    transport: Option<Box<dyn Transport>>,
    /// Last wall time seen, in ticdup-scaled clock tics.
    game_time: i32,
    single_tics: bool,
    stats: NetworkStats,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config> OutboundScheduler<T> {
    /// Creates a scheduler whose wall time starts at `start_time` (already divided by ticdup).
    ///
    /// `transport` may only be `None` in single-tic mode; a networked session
    /// without a transport never frames anything.
    pub fn new(
        input: Box<dyn InputSource<T>>,
        transport: Option<Box<dyn Transport>>,
        start_time: i32,
        single_tics: bool,
    ) -> Self {
        Self {
            input,
            transport,
            game_time: start_time,
            single_tics,
            stats: NetworkStats::default(),
            violation_observer: None,
        }
    }

    /// Sends violations raised while framing windows to `observer` instead of
    /// the tracing observer.
    #[must_use]
    pub fn with_violation_observer(mut self, observer: Option<Arc<dyn ViolationObserver>>) -> Self {
        self.violation_observer = observer;
        self
    }

    /// The observer violations are reported to, if one was set.
    #[must_use]
    pub fn violation_observer(&self) -> Option<&Arc<dyn ViolationObserver>> {
        self.violation_observer.as_ref()
    }

    /// Counters collected so far.
    pub fn stats(&self) -> NetworkStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }

    /// Last wall time seen, in ticdup-scaled clock tics.
    #[must_use]
    pub fn game_time(&self) -> i32 {
        self.game_time
    }

    /// Runs one production/send/receive cycle for the wall clock reading `clock_tics`.
    ///
    /// A no-op when no whole ticdup-scaled tic has elapsed since the previous
    /// call, so it is safe to call every frame. Returns the window that was
    /// framed, or `None` if nothing was framed (no elapsed time, or single-tic mode).
    pub fn update(
        &mut self,
        state: &mut SyncState,
        history: &mut CommandHistory<T::Command>,
        clock_tics: i32,
    ) -> Option<OutboundWindow> {
        let now = clock_tics / state.ticdup;
        let mut new_tics = now - self.game_time;
        self.game_time = now;

        if new_tics <= 0 {
            return None;
        }

        if state.skiptics <= new_tics {
            new_tics -= state.skiptics;
            state.skiptics = 0;
        } else {
            state.skiptics -= new_tics;
            new_tics = 0;
        }

        self.produce(state, history, new_tics);

        if self.single_tics {
            return None;
        }

        let window = OutboundWindow {
            start: state.resendto,
            num_tics: state.maketic - state.resendto,
        };
        self.send_window(window, state, history);
        state.resendto = state.maketic;

        self.receive(state);
        crate::debug_check_invariants!(state, "after outbound update");
        Some(window)
    }

    /// Produces one tic immediately, ignoring wall time and pacing debt.
    ///
    /// Used by the synchronous single-tic path, which steps once per call.
    pub(crate) fn produce_now(
        &mut self,
        state: &mut SyncState,
        history: &mut CommandHistory<T::Command>,
    ) {
        self.produce(state, history, 1);
    }

    /// Samples input `new_tics` times, writing a command per tic unless the
    /// run-ahead bound is reached.
    fn produce(
        &mut self,
        state: &mut SyncState,
        history: &mut CommandHistory<T::Command>,
        new_tics: i32,
    ) {
        let game_net_tic = state.game_net_tic();
        let max_run_ahead = history.max_run_ahead();

        for _ in 0..new_tics {
            let events = self.input.poll();
            if state.maketic - game_net_tic >= max_run_ahead {
                self.stats.backpressure_stops += 1;
                tracing::debug!(
                    maketic = %state.maketic,
                    gametic = %state.gametic,
                    max_run_ahead,
                    "run-ahead bound reached, production paused"
                );
                break;
            }
            let command = self.input.build_command(events);
            history.insert(state.maketic, command);
            state.maketic += 1;
        }
    }

    fn send_window(
        &mut self,
        window: OutboundWindow,
        state: &SyncState,
        history: &CommandHistory<T::Command>,
    ) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        let Ok(num_tics) = u8::try_from(window.num_tics) else {
            report_violation_to!(
                self.violation_observer.as_ref(),
                ViolationSeverity::Error,
                ViolationKind::InternalError,
                "window of {} tics starting at {} does not fit the wire format",
                window.num_tics,
                window.start
            );
            return;
        };

        let mut bytes = Vec::new();
        for command in history.range(window.start, window.end()) {
            for _ in 0..state.ticdup {
                if let Err(e) = codec::encode_command(&command, &mut bytes) {
                    report_violation_to!(
                        self.violation_observer.as_ref(),
                        ViolationSeverity::Error,
                        ViolationKind::Network,
                        "failed to encode command for window at {}: {}",
                        window.start,
                        e
                    );
                    return;
                }
            }
        }

        let packet = TicPacket {
            start_tic_low: window.start.low_byte(),
            num_tics,
            bytes,
        };
        tracing::trace!(start = %window.start, num_tics, "sending window");
        transport.send(&packet);
        self.stats.packets_sent += 1;
        self.stats.tics_sent += u64::from(num_tics);
    }

    fn receive(&mut self, state: &mut SyncState) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        while let Some(packet) = transport.poll() {
            let outcome = ingest(&packet, state);
            self.stats.record_ingest(outcome);
        }
    }
}

impl<T: Config> std::fmt::Debug for OutboundScheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundScheduler")
            .field("game_time", &self.game_time)
            .field("single_tics", &self.single_tics)
            .field("has_transport", &self.transport.is_some())
            .field("has_violation_observer", &self.violation_observer.is_some())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
