//! A single node whose windows come straight back through a loopback transport.
//!
//! With the echo arriving inside the same update, consensus always equals local
//! production, so these tests isolate frame pacing and run-ahead behavior.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::stubs::{CountingUi, RecordingSim};
use crate::common::{init_tracing, loopback_session, run_frames};
use lockstep_tics::{ManualClock, PacingConfig, Tic};

#[test]
fn steady_clock_runs_one_step_per_frame() {
    init_tracing();
    let clock = ManualClock::new(0);
    let mut session = loopback_session(PacingConfig::lan(), &clock);
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    let outcomes = run_frames(&mut session, &clock, 50, 1, &mut sim, &mut ui);

    assert!(outcomes.iter().all(|o| o.ran_steps == 1 && !o.stalled));
    assert_eq!(sim.sequence_numbers(), (1..=50).collect::<Vec<u16>>());
    assert_eq!(sim.steps.first().map(|(t, _)| *t), Some(Tic::ZERO));
    assert_eq!(session.current_tic(), Tic::new(50));
    assert_eq!(ui.steps, 50);
    assert_eq!(ui.stalls, 0);

    let stats = session.network_stats();
    assert_eq!(stats.packets_sent, 50);
    assert_eq!(stats.tics_sent, 50);
    assert_eq!(stats.packets_accepted, 50);
    assert_eq!(stats.packets_discarded(), 0);
    assert_eq!(stats.steps_run, 50);
}

#[test]
fn elapsed_tics_are_caught_up_in_one_frame() {
    init_tracing();
    let clock = ManualClock::new(0);
    let mut session = loopback_session(PacingConfig::lan(), &clock);
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    let outcomes = run_frames(&mut session, &clock, 10, 3, &mut sim, &mut ui);

    assert!(outcomes.iter().all(|o| o.ran_steps == 3));
    assert_eq!(sim.steps.len(), 30);
    assert_eq!(sim.sequence_numbers(), (1..=30).collect::<Vec<u16>>());
}

#[test]
fn clock_jump_is_capped_by_run_ahead_bound() {
    init_tracing();
    let clock = ManualClock::new(0);
    let pacing = PacingConfig::lan();
    let mut session = loopback_session(pacing, &clock);
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    clock.advance(7);
    let outcome = session.tick(&mut sim, &mut ui);
    assert_eq!(outcome.ran_steps as i32, pacing.max_run_ahead());
    assert_eq!(session.network_stats().backpressure_stops, 1);

    // The tics dropped at the bound are not produced later.
    let outcomes = run_frames(&mut session, &clock, 3, 1, &mut sim, &mut ui);
    assert!(outcomes.iter().all(|o| o.ran_steps == 1));
    assert_eq!(session.state().maketic, Tic::new(pacing.max_run_ahead() + 3));
    assert_eq!(
        sim.sequence_numbers(),
        (1..=(pacing.max_run_ahead() as u16 + 3)).collect::<Vec<u16>>()
    );
}

#[test]
fn ticdup_repeats_each_command_over_several_steps() {
    init_tracing();
    let clock = ManualClock::new(0);
    let mut session = loopback_session(PacingConfig::modem(), &clock);
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    let outcomes = run_frames(&mut session, &clock, 10, 2, &mut sim, &mut ui);

    assert!(outcomes.iter().all(|o| o.ran_steps == 2));
    let expected: Vec<u16> = (1..=10).flat_map(|seq| [seq, seq]).collect();
    assert_eq!(sim.sequence_numbers(), expected);
    assert_eq!(session.state().maketic, Tic::new(10));
    assert_eq!(session.current_tic(), Tic::new(20));
}

#[test]
fn pacing_debt_suppresses_production() {
    init_tracing();
    let clock = ManualClock::new(0);
    let mut session = loopback_session(PacingConfig::lan(), &clock);
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    session.skip_tics(3);
    clock.advance(5);
    let window = session.net_update().expect("a wall tic elapsed");
    assert_eq!(window.num_tics, 2);
    assert_eq!(session.state().skiptics, 0);

    let outcome = session.tick(&mut sim, &mut ui);
    assert_eq!(outcome.ran_steps, 2);
    assert_eq!(sim.sequence_numbers(), vec![1, 2]);
}

#[test]
fn steps_never_outrun_consensus() {
    init_tracing();
    let clock = ManualClock::new(0);
    let mut session = loopback_session(PacingConfig::lan(), &clock);
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    for step in [1, 0, 4, 2, 9, 1, 1, 3] {
        clock.advance(step);
        // A frame with no elapsed time waits on consensus; let time move.
        clock.set_auto_advance(1);
        let _ = session.tick(&mut sim, &mut ui);
        clock.set_auto_advance(0);

        let state = session.state();
        assert!(state.game_net_tic() <= state.nettics);
        assert!(state.run_ahead() <= session.pacing().max_run_ahead());
    }
}
