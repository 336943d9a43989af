//! Synchronous sessions: one tic per `tick`, no transport, no wall clock.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::init_tracing;
use crate::common::stubs::{CountingUi, RecordingSim, ScriptedInput, StubConfig};
use lockstep_tics::{LockstepError, PacingConfig, SessionBuilder, Tic};

#[test]
fn steps_once_per_tick_with_the_default_clock() {
    init_tracing();
    let mut session = SessionBuilder::<StubConfig>::new()
        .with_pacing(PacingConfig::single_step())
        .with_input_source(ScriptedInput::default())
        .start_session()
        .expect("single-step sessions need no transport");
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    for _ in 0..100 {
        let outcome = session.tick(&mut sim, &mut ui);
        assert_eq!(outcome.ran_steps, 1);
        assert!(!outcome.stalled);
    }

    assert_eq!(sim.sequence_numbers(), (1..=100).collect::<Vec<u16>>());
    assert_eq!(session.state().nettics, Tic::new(100));
    assert_eq!(session.state().resendto, Tic::new(100));
    assert_eq!(ui.stalls, 0);

    let stats = session.network_stats();
    assert_eq!(stats.packets_sent, 0);
    assert_eq!(stats.steps_run, 100);
}

#[test]
fn ticdup_runs_a_group_per_tick() {
    init_tracing();
    let pacing = PacingConfig {
        ticdup: 3,
        ..PacingConfig::single_step()
    };
    let mut session = SessionBuilder::<StubConfig>::new()
        .with_pacing(pacing)
        .with_input_source(ScriptedInput::default())
        .start_session()
        .unwrap();
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    for _ in 0..4 {
        assert_eq!(session.tick(&mut sim, &mut ui).ran_steps, 3);
    }

    let expected: Vec<u16> = (1..=4).flat_map(|seq| [seq; 3]).collect();
    assert_eq!(sim.sequence_numbers(), expected);
    assert_eq!(session.current_tic(), Tic::new(12));
}

#[test]
fn net_update_never_frames_a_window() {
    init_tracing();
    let mut session = SessionBuilder::<StubConfig>::new()
        .with_pacing(PacingConfig::single_step())
        .with_input_source(ScriptedInput::default())
        .start_session()
        .unwrap();

    assert_eq!(session.net_update(), None);
    assert_eq!(session.network_stats().packets_sent, 0);
}

#[test]
fn networked_session_without_transport_is_rejected() {
    let result = SessionBuilder::<StubConfig>::new()
        .with_pacing(PacingConfig::lan())
        .with_input_source(ScriptedInput::default())
        .start_session();
    assert!(matches!(result, Err(LockstepError::TransportUnavailable { .. })));
}
