//! Two sessions talking over real UDP sockets on localhost.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::common::stubs::{CountingUi, RecordingSim};
use crate::common::test_utils::session_with;
use crate::common::{init_tracing, PortAllocator};
use lockstep_tics::{ManualClock, PacingConfig, UdpTransport};
use serial_test::serial;

fn localhost(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

#[test]
#[serial]
#[cfg(not(miri))]
fn sessions_step_together_over_udp() {
    init_tracing();
    let port_a = PortAllocator::next_port();
    let port_b = PortAllocator::next_port();
    let transport_a = UdpTransport::bind(port_a, localhost(port_b)).unwrap();
    let transport_b = UdpTransport::bind(port_b, localhost(port_a)).unwrap();

    let clock_a = ManualClock::new(0);
    let clock_b = ManualClock::new(0);
    let mut a = session_with(PacingConfig::lan(), &clock_a, transport_a);
    let mut b = session_with(PacingConfig::lan(), &clock_b, transport_b);
    clock_a.set_auto_advance(1);
    clock_b.set_auto_advance(1);

    let (mut sim_a, mut sim_b) = (RecordingSim::default(), RecordingSim::default());
    let (mut ui_a, mut ui_b) = (CountingUi::default(), CountingUi::default());

    for _ in 0..100 {
        clock_a.advance(1);
        let _ = a.tick(&mut sim_a, &mut ui_a);
        std::thread::sleep(Duration::from_millis(1));
        clock_b.advance(1);
        let _ = b.tick(&mut sim_b, &mut ui_b);
        std::thread::sleep(Duration::from_millis(1));
    }

    assert!(sim_a.steps.len() > 10, "a ran {} steps", sim_a.steps.len());
    assert!(sim_b.steps.len() > 10, "b ran {} steps", sim_b.steps.len());
    for sim in [&sim_a, &sim_b] {
        let expected: Vec<u16> = (1..=sim.steps.len() as u16).collect();
        assert_eq!(sim.sequence_numbers(), expected);
    }
    assert!(a.state().nettics <= b.state().maketic);
    assert!(b.state().nettics <= a.state().maketic);
    assert!(a.network_stats().packets_accepted > 0);
    assert!(b.network_stats().packets_accepted > 0);
}
