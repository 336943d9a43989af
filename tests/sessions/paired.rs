//! Two nodes connected by an in-memory transport pair.
//!
//! Both nodes run on one thread and take turns ticking, so while one node
//! waits for consensus the other cannot answer. Clocks auto-advance so those
//! waits end in a stall instead of spinning forever.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::init_tracing;
use crate::common::stubs::{CountingUi, RecordingSim, StubConfig};
use crate::common::test_utils::session_with;
use lockstep_tics::{FrameScheduler, LoopbackTransport, ManualClock, PacingConfig, Tic};

struct Node {
    clock: ManualClock,
    session: FrameScheduler<StubConfig>,
    sim: RecordingSim,
    ui: CountingUi,
}

impl Node {
    fn frame(&mut self) {
        self.clock.advance(1);
        let _ = self.session.tick(&mut self.sim, &mut self.ui);
    }
}

fn paired_nodes(pacing: PacingConfig) -> (Node, Node) {
    let (a, b) = LoopbackTransport::pair();
    let make = |transport: LoopbackTransport| {
        let clock = ManualClock::new(0);
        let session = session_with(pacing, &clock, transport);
        clock.set_auto_advance(1);
        Node {
            clock,
            session,
            sim: RecordingSim::default(),
            ui: CountingUi::default(),
        }
    };
    (make(a), make(b))
}

#[test]
fn first_frame_stalls_until_the_peer_speaks() {
    init_tracing();
    let (mut a, mut b) = paired_nodes(PacingConfig::lan());

    a.frame();
    assert_eq!(a.ui.stalls, 1);
    assert!(a.sim.steps.is_empty());
    assert_eq!(a.session.state().nettics, Tic::ZERO);
    // Production kept going while waiting, up to the run-ahead bound.
    assert_eq!(
        a.session.state().maketic,
        Tic::new(a.session.pacing().max_run_ahead())
    );

    b.frame();
    assert!(b.session.state().nettics > Tic::ZERO);
    assert!(!b.sim.steps.is_empty());
    assert_eq!(b.ui.stalls, 0);
}

#[test]
fn nodes_converge_and_keep_stepping() {
    init_tracing();
    let (mut a, mut b) = paired_nodes(PacingConfig::lan());

    for _ in 0..60 {
        a.frame();
        b.frame();

        // Neither node may simulate a tic its peer has not produced.
        for (node, peer) in [(&a, &b), (&b, &a)] {
            let state = node.session.state();
            assert!(state.nettics <= peer.session.state().maketic);
            assert!(state.game_net_tic() <= state.nettics);
            assert!(state.run_ahead() <= node.session.pacing().max_run_ahead());
        }
    }

    assert!(a.sim.steps.len() > 20, "a ran {} steps", a.sim.steps.len());
    assert!(b.sim.steps.len() > 20, "b ran {} steps", b.sim.steps.len());
    assert!(a.ui.stalls <= 2, "a stalled {} times", a.ui.stalls);
    assert!(b.ui.stalls <= 2, "b stalled {} times", b.ui.stalls);

    let gap = (a.session.current_tic() - b.session.current_tic()).abs();
    assert!(gap <= 2 * a.session.pacing().max_run_ahead());
}

#[test]
fn each_node_simulates_its_commands_in_order() {
    init_tracing();
    let (mut a, mut b) = paired_nodes(PacingConfig::lan());

    for _ in 0..40 {
        a.frame();
        b.frame();
    }

    for node in [&a, &b] {
        let expected: Vec<u16> = (1..=node.sim.steps.len() as u16).collect();
        assert_eq!(node.sim.sequence_numbers(), expected);
        assert_eq!(node.ui.steps as usize, node.sim.steps.len());
    }
}

#[test]
fn ticdup_nodes_agree_on_step_numbering() {
    init_tracing();
    let (mut a, mut b) = paired_nodes(PacingConfig::modem());

    for _ in 0..40 {
        a.frame();
        b.frame();
    }

    for node in [&a, &b] {
        assert_eq!(node.sim.steps.len() % 2, 0);
        assert_eq!(
            node.session.current_tic(),
            Tic::new(node.sim.steps.len() as i32)
        );
        for pair in node.sim.steps.chunks(2) {
            assert_eq!(pair[0].1, pair[1].1);
        }
    }
    assert!(!a.sim.steps.is_empty());
    assert!(!b.sim.steps.is_empty());
}
