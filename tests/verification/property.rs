//! Property-based tests for tic expansion, packet ingest and pacing.
//!
//! These tests use proptest to check invariants under random inputs, reaching
//! the components directly through the `__internal` module.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::stubs::{CountingUi, RecordingSim, ScriptedInput, StubConfig};
use crate::common::test_utils::loopback_session;
use lockstep_tics::__internal::{
    expand_tic, ingest, CommandHistory, IngestOutcome, OutboundScheduler, SyncState,
    EXPANSION_WINDOW,
};
use lockstep_tics::telemetry::InvariantChecker;
use lockstep_tics::{FrameScheduler, LoopbackTransport, ManualClock, PacingConfig, Tic, TicPacket};
use proptest::prelude::*;

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Reference tics spanning many laps of the low byte.
fn reference_strategy() -> impl Strategy<Value = i32> {
    0i32..2_000_000
}

fn capacity_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(8usize), Just(12), Just(24), Just(64)]
}

fn ticdup_strategy() -> impl Strategy<Value = i32> {
    1i32..=3
}

// ============================================================================
// Tic Expansion
// ============================================================================

proptest! {
    /// The expanded tic always carries the transmitted low byte and stays
    /// within one lap of the reference.
    #[test]
    fn prop_expansion_keeps_low_byte(low in any::<u8>(), reference in reference_strategy()) {
        let expanded = expand_tic(low, Tic::new(reference));
        prop_assert_eq!(expanded.low_byte(), low);
        prop_assert!((expanded - Tic::new(reference)).abs() < 256);
    }

    /// Any tic within the window of the reference is recovered exactly.
    #[test]
    fn prop_expansion_recovers_nearby_tics(
        reference in 64i32..2_000_000,
        offset in -EXPANSION_WINDOW..=EXPANSION_WINDOW,
    ) {
        let actual = Tic::new(reference + offset);
        prop_assert_eq!(expand_tic(actual.low_byte(), Tic::new(reference)), actual);
    }
}

// ============================================================================
// Packet Ingest
// ============================================================================

proptest! {
    /// A single ingest never moves consensus backwards and touches nothing else.
    #[test]
    fn prop_ingest_is_monotonic(
        maketic in reference_strategy(),
        behind in 0i32..64,
        start_low in any::<u8>(),
        num_tics in any::<u8>(),
    ) {
        let mut state = SyncState {
            maketic: Tic::new(maketic),
            resendto: Tic::new(maketic),
            nettics: Tic::new((maketic - behind).max(0)),
            ..SyncState::default()
        };
        let before = state;
        let outcome = ingest(&TicPacket::header_only(start_low, num_tics), &mut state);

        prop_assert!(state.nettics >= before.nettics);
        prop_assert_eq!(state.maketic, before.maketic);
        prop_assert_eq!(state.gametic, before.gametic);
        prop_assert_eq!(state.resendto, before.resendto);
        match outcome {
            IngestOutcome::Accepted { nettics, .. } => {
                prop_assert!(nettics > before.nettics);
                prop_assert_eq!(nettics, state.nettics);
            },
            _ => prop_assert_eq!(state.nettics, before.nettics),
        }
    }

    /// Consecutive windows delivered in order, with arbitrary repeats, add up
    /// to exactly the tics the sender produced.
    #[test]
    fn prop_in_order_windows_with_repeats_reach_the_total(
        base in reference_strategy(),
        windows in prop::collection::vec((0u8..=20, any::<bool>()), 1..40),
    ) {
        let mut state = SyncState {
            maketic: Tic::new(base),
            resendto: Tic::new(base),
            nettics: Tic::new(base),
            ..SyncState::default()
        };
        let mut sent = Tic::new(base);

        for (num_tics, repeat) in windows {
            let packet = TicPacket::header_only(sent.low_byte(), num_tics);
            sent += i32::from(num_tics);
            state.maketic = sent;

            let before = state.nettics;
            let _ = ingest(&packet, &mut state);
            prop_assert!(state.nettics >= before);
            if repeat {
                let outcome = ingest(&packet, &mut state);
                prop_assert!(!outcome.is_accepted());
            }
        }

        prop_assert_eq!(state.nettics, sent);
    }

    /// Once a non-empty window is lost, nothing after it is accepted.
    #[test]
    fn prop_a_missed_window_blocks_later_ones(
        base in reference_strategy(),
        lost in 1u8..=20,
        later in prop::collection::vec(1u8..=20, 1..10),
    ) {
        let mut state = SyncState {
            maketic: Tic::new(base),
            nettics: Tic::new(base),
            resendto: Tic::new(base),
            ..SyncState::default()
        };
        let mut sent = Tic::new(base) + i32::from(lost);

        for num_tics in later {
            let packet = TicPacket::header_only(sent.low_byte(), num_tics);
            sent += i32::from(num_tics);
            state.maketic = sent;
            let outcome = ingest(&packet, &mut state);
            prop_assert!(
                matches!(outcome, IngestOutcome::Gap { .. }),
                "expected a gap, got {:?}",
                outcome
            );
        }
        prop_assert_eq!(state.nettics, Tic::new(base));
    }
}

// ============================================================================
// Outbound Scheduling
// ============================================================================

proptest! {
    /// Local production never runs further ahead of the simulation than the
    /// history can hold, however time and consumption interleave.
    #[test]
    fn prop_run_ahead_is_bounded(
        capacity in capacity_strategy(),
        ticdup in ticdup_strategy(),
        rounds in prop::collection::vec((0i32..12, 0i32..6), 1..60),
    ) {
        let mut history = CommandHistory::with_capacity(capacity).expect("history");
        let mut state = SyncState::new(ticdup);
        let mut outbound = OutboundScheduler::<StubConfig>::new(
            Box::new(ScriptedInput::default()),
            Some(Box::new(LoopbackTransport::new())),
            0,
            false,
        );
        let mut clock = 0;

        for (elapsed, consume) in rounds {
            clock += elapsed;
            let _ = outbound.update(&mut state, &mut history, clock);
            prop_assert!(state.run_ahead() <= history.max_run_ahead());
            prop_assert!(state.check_invariants().is_ok());

            let runnable = consume.min(state.available_tics()).max(0);
            state.gametic += runnable * ticdup;
            prop_assert!(state.check_invariants().is_ok());
        }
    }

    /// Production plus pacing debt always accounts for the elapsed wall time
    /// when the run-ahead bound is never reached.
    #[test]
    fn prop_pacing_debt_is_paid_before_production(
        debt in 0i32..20,
        steps in prop::collection::vec(0i32..4, 1..30),
    ) {
        let mut history = CommandHistory::with_capacity(128).expect("history");
        let mut state = SyncState::new(1);
        state.skiptics = debt;
        let mut outbound = OutboundScheduler::<StubConfig>::new(
            Box::new(ScriptedInput::default()),
            Some(Box::new(LoopbackTransport::new())),
            0,
            false,
        );
        let mut clock = 0;

        for elapsed in steps {
            clock += elapsed;
            let _ = outbound.update(&mut state, &mut history, clock);
            // keep the simulation caught up so backpressure never engages
            state.gametic = state.nettics;
            prop_assert_eq!(state.maketic.as_i32(), (clock - debt).max(0));
            prop_assert_eq!(state.skiptics, (debt - clock).max(0));
        }
    }
}

// ============================================================================
// Frame Scheduling
// ============================================================================

proptest! {
    /// The per-frame tic count is at least one, never exceeds the covered
    /// tics when any are covered, and never exceeds elapsed time plus one.
    #[test]
    fn prop_tics_to_run_bounds(real in 0i32..100, available in -5i32..100) {
        let counts = FrameScheduler::<StubConfig>::tics_to_run(real, available);
        prop_assert!(counts >= 1);
        if available >= 1 {
            prop_assert!(counts <= available);
        }
        prop_assert!(counts <= (real + 1).max(1));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever the frame timing, a loopback session simulates every produced
    /// command once, in order, without passing consensus.
    #[test]
    fn prop_loopback_session_steps_in_order(
        ticdup in ticdup_strategy(),
        steps in prop::collection::vec(0i32..8, 1..40),
    ) {
        let pacing = PacingConfig { ticdup, ..PacingConfig::lan() };
        let clock = ManualClock::new(0);
        let mut session = loopback_session(pacing, &clock);
        clock.set_auto_advance(1);
        let mut sim = RecordingSim::default();
        let mut ui = CountingUi::default();

        for step in steps {
            clock.advance(step);
            let outcome = session.tick(&mut sim, &mut ui);
            prop_assert_eq!(outcome.ran_steps % ticdup as u32, 0);
            prop_assert!(session.state().check_invariants().is_ok());
            prop_assert!(session.history().check_invariants().is_ok());
        }

        let groups: Vec<u16> = sim.sequence_numbers().chunks(ticdup as usize).map(|g| g[0]).collect();
        let expected: Vec<u16> = (1..=groups.len() as u16).collect();
        prop_assert_eq!(groups, expected);
        prop_assert_eq!(ui.stalls, 0);
    }
}
