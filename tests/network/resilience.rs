//! Sessions over a lossy transport.
//!
//! Duplicates are harmless. A lost window is never retransmitted, so consensus
//! stops at the hole; the stall timeout keeps every frame returning.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::init_tracing;
use crate::common::run_frames;
use crate::common::stubs::{CountingUi, RecordingSim};
use crate::common::test_utils::session_with;
use lockstep_tics::{
    ChaosConfig, ChaosTransport, LoopbackTransport, ManualClock, PacingConfig, Tic,
};

#[test]
fn duplicated_windows_are_discarded() {
    init_tracing();
    let clock = ManualClock::new(0);
    let chaos = ChaosTransport::new(
        LoopbackTransport::new(),
        ChaosConfig::builder()
            .duplication_rate(0.5)
            .seed(7)
            .build(),
    );
    let mut session = session_with(PacingConfig::lan(), &clock, chaos);
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    let outcomes = run_frames(&mut session, &clock, 40, 1, &mut sim, &mut ui);

    assert!(outcomes.iter().all(|o| o.ran_steps == 1));
    assert_eq!(sim.sequence_numbers(), (1..=40).collect::<Vec<u16>>());
    let stats = session.network_stats();
    assert_eq!(stats.packets_accepted, 40);
    assert!(stats.duplicate_packets > 0);
    assert_eq!(stats.gap_packets, 0);
    assert_eq!(stats.stale_packets, 0);
}

#[test]
fn total_loss_stalls_every_frame_but_returns() {
    init_tracing();
    let clock = ManualClock::new(0);
    let chaos = ChaosTransport::new(
        LoopbackTransport::new(),
        ChaosConfig::builder().send_loss_rate(1.0).build(),
    );
    let mut session = session_with(PacingConfig::lan(), &clock, chaos);
    clock.set_auto_advance(1);
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    let outcomes = run_frames(&mut session, &clock, 5, 1, &mut sim, &mut ui);

    assert!(outcomes.iter().all(|o| o.stalled && o.ran_steps == 0));
    assert_eq!(ui.stalls, 5);
    assert!(sim.steps.is_empty());
    assert_eq!(session.state().nettics, Tic::ZERO);
    assert_eq!(
        session.state().maketic,
        Tic::new(session.pacing().max_run_ahead())
    );
    assert_eq!(session.network_stats().stalls, 5);
}

#[test]
fn a_lost_window_freezes_consensus() {
    init_tracing();
    let clock = ManualClock::new(0);
    let chaos = ChaosTransport::new(
        LoopbackTransport::new(),
        ChaosConfig::builder().send_loss_rate(0.3).seed(11).build(),
    );
    let mut session = session_with(PacingConfig::lan(), &clock, chaos);
    clock.set_auto_advance(1);
    let mut sim = RecordingSim::default();
    let mut ui = CountingUi::default();

    let _ = run_frames(&mut session, &clock, 30, 1, &mut sim, &mut ui);
    let frozen = session.state().nettics;
    let outcomes = run_frames(&mut session, &clock, 10, 1, &mut sim, &mut ui);

    assert!(outcomes.iter().all(|o| o.stalled));
    assert_eq!(session.state().nettics, frozen);
    assert_eq!(session.current_tic(), frozen);
    let stats = session.network_stats();
    assert!(stats.gap_packets > 0);
    assert!(stats.stalls >= 10);
}
