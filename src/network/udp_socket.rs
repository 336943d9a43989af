use std::{
    io::ErrorKind,
    net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket},
    sync::Arc,
};

use crate::network::codec;
use crate::network::messages::TicPacket;
use crate::report_violation_to;
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{LockstepError, Transport};

const RECV_BUFFER_SIZE: usize = 4096;
/// Size of the pre-allocated send buffer. Windows hold at most 63 tics (half the
/// largest history, minus one), which fits here for commands up to 32 bytes at
/// ticdup 1. Larger windows fall back to an allocation.
const SEND_BUFFER_SIZE: usize = 2048;
/// A packet larger than this may be fragmented, so ideally we wouldn't send packets larger than
/// this.
/// Source: <https://stackoverflow.com/a/35697810/775982>
const IDEAL_MAX_UDP_PACKET_SIZE: usize = 508;

/// A non-blocking UDP transport talking to exactly one peer.
///
/// Listens on 0.0.0.0 at the given port. Datagrams from any address other than
/// the peer are ignored, as are datagrams shorter than the two byte header.
///
/// Oversized, failed and malformed datagrams are reported as
/// [`ViolationKind::Network`] violations, to the tracing observer unless
/// [`with_violation_observer`](Self::with_violation_observer) set another.
///
/// # Performance
///
/// Send and receive buffers are allocated once and reused across calls.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    /// Receive buffer - reused across recv_from calls
    recv_buffer: [u8; RECV_BUFFER_SIZE],
    /// Send buffer - reused across send calls to avoid allocation
    send_buffer: [u8; SEND_BUFFER_SIZE],
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("socket", &self.socket)
            .field("peer", &self.peer)
            .field("has_violation_observer", &self.violation_observer.is_some())
            .finish_non_exhaustive()
    }
}

impl UdpTransport {
    /// Binds an UDP socket to 0.0.0.0:port, sets it to non-blocking mode and
    /// sends every window to `peer`.
    pub fn bind(port: u16, peer: SocketAddr) -> Result<Self, LockstepError> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        tracing::debug!(%addr, %peer, "udp transport bound");
        Ok(Self {
            socket,
            peer,
            recv_buffer: [0; RECV_BUFFER_SIZE],
            send_buffer: [0; SEND_BUFFER_SIZE],
            violation_observer: None,
        })
    }

    /// Reports this transport's violations to `observer`.
    #[must_use]
    pub fn with_violation_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.violation_observer = Some(observer);
        self
    }

    /// The address this transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, LockstepError> {
        Ok(self.socket.local_addr()?)
    }

    /// The peer windows are sent to.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn send_encoded(&self, buf: &[u8]) {
        // Large windows only happen after long stalls; they are worth knowing
        // about but still likely to arrive.
        if buf.len() > IDEAL_MAX_UDP_PACKET_SIZE {
            report_violation_to!(
                self.violation_observer.as_ref(),
                ViolationSeverity::Warning,
                ViolationKind::Network,
                "Sending UDP packet of size {} bytes, which is larger than ideal ({})",
                buf.len(),
                IDEAL_MAX_UDP_PACKET_SIZE
            );
        }

        // UDP is best-effort; a failed send is the same as a lost packet.
        if let Err(e) = self.socket.send_to(buf, self.peer) {
            report_violation_to!(
                self.violation_observer.as_ref(),
                ViolationSeverity::Warning,
                ViolationKind::Network,
                "Failed to send UDP packet to {}: {}",
                self.peer,
                e
            );
        }
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, packet: &TicPacket) {
        match codec::encode_packet_into(packet, &mut self.send_buffer) {
            Ok(len) => {
                let buf = self.send_buffer.get(..len).unwrap_or(&[]);
                self.send_encoded(buf);
            },
            Err(codec::CodecError::BufferTooSmall { required, .. }) => {
                report_violation_to!(
                    self.violation_observer.as_ref(),
                    ViolationSeverity::Warning,
                    ViolationKind::Network,
                    "Window too large for send buffer ({} bytes), falling back to allocation",
                    required
                );
                let wire = codec::encode_packet(packet);
                self.send_encoded(&wire);
            },
            Err(e) => {
                report_violation_to!(
                    self.violation_observer.as_ref(),
                    ViolationSeverity::Error,
                    ViolationKind::Network,
                    "Failed to encode packet: {}",
                    e
                );
            },
        }
    }

    fn poll(&mut self) -> Option<TicPacket> {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((number_of_bytes, src_addr)) => {
                    if src_addr != self.peer {
                        tracing::trace!(%src_addr, "ignoring datagram from unknown address");
                        continue;
                    }
                    let Some(buf) = self.recv_buffer.get(..number_of_bytes) else {
                        report_violation_to!(
                            self.violation_observer.as_ref(),
                            ViolationSeverity::Error,
                            ViolationKind::Network,
                            "Received {} bytes but buffer is only {} bytes",
                            number_of_bytes,
                            RECV_BUFFER_SIZE
                        );
                        continue;
                    };
                    match codec::decode_packet(buf) {
                        Ok(packet) => return Some(packet),
                        Err(e) => {
                            report_violation_to!(
                                self.violation_observer.as_ref(),
                                ViolationSeverity::Warning,
                                ViolationKind::Network,
                                "Dropping malformed datagram from {}: {}",
                                src_addr,
                                e
                            );
                        },
                    }
                },
                // there are no more datagrams
                Err(ref err) if err.kind() == ErrorKind::WouldBlock => return None,
                // datagram sockets sometimes get this error as a result of calling send_to
                Err(ref err) if err.kind() == ErrorKind::ConnectionReset => continue,
                Err(err) => {
                    report_violation_to!(
                        self.violation_observer.as_ref(),
                        ViolationSeverity::Error,
                        ViolationKind::Network,
                        "Unexpected socket error: {:?}: {}",
                        err.kind(),
                        err
                    );
                    return None;
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn loopback(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    // UDP delivery timing varies across platforms, so poll with retries.
    #[track_caller]
    fn wait_for_packet(transport: &mut UdpTransport, max_retries: u32) -> Option<TicPacket> {
        for _ in 0..max_retries {
            if let Some(packet) = transport.poll() {
                return Some(packet);
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        None
    }

    /// Two transports bound to OS-assigned ports, each pointed at the other.
    fn connected_pair() -> (UdpTransport, UdpTransport) {
        let reserve_a = UdpSocket::bind(loopback(0)).unwrap();
        let reserve_b = UdpSocket::bind(loopback(0)).unwrap();
        let port_a = reserve_a.local_addr().unwrap().port();
        let port_b = reserve_b.local_addr().unwrap().port();
        drop(reserve_a);
        drop(reserve_b);

        let a = UdpTransport::bind(port_a, loopback(port_b)).unwrap();
        let b = UdpTransport::bind(port_b, loopback(port_a)).unwrap();
        (a, b)
    }

    #[test]
    #[cfg(not(miri))]
    fn test_poll_is_non_blocking() {
        let mut transport = UdpTransport::bind(0, loopback(9)).unwrap();
        assert_eq!(transport.poll(), None);
    }

    #[test]
    #[cfg(not(miri))]
    fn test_send_and_receive_window() {
        let (mut a, mut b) = connected_pair();
        let packet = TicPacket {
            start_tic_low: 200,
            num_tics: 2,
            bytes: vec![1, 2, 3, 4],
        };
        a.send(&packet);
        assert_eq!(wait_for_packet(&mut b, 20), Some(packet));
    }

    #[test]
    #[cfg(not(miri))]
    fn test_short_datagram_is_dropped() {
        use crate::telemetry::CollectingObserver;

        let (a, b) = connected_pair();
        let collector = Arc::new(CollectingObserver::new());
        let mut b = b.with_violation_observer(collector.clone());
        a.socket.send_to(&[7], a.peer).unwrap();
        a.send_encoded(&[5, 0]);
        let packet = wait_for_packet(&mut b, 20).unwrap();
        assert_eq!(packet, TicPacket::header_only(5, 0));

        let violations = collector.violations_of_kind(ViolationKind::Network);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("malformed datagram"));
        assert!(format!("{b:?}").contains("has_violation_observer: true"));
    }

    #[test]
    #[cfg(not(miri))]
    fn test_oversized_window_falls_back_to_allocation() {
        let (mut a, mut b) = connected_pair();
        let packet = TicPacket {
            start_tic_low: 1,
            num_tics: 255,
            bytes: vec![0xab; SEND_BUFFER_SIZE + 10],
        };
        a.send(&packet);
        let received = wait_for_packet(&mut b, 20).unwrap();
        assert_eq!(received.bytes.len(), SEND_BUFFER_SIZE + 10);
    }

    #[test]
    #[cfg(not(miri))]
    fn test_peer_accessor() {
        let transport = UdpTransport::bind(0, loopback(4000)).unwrap();
        assert_eq!(transport.peer(), loopback(4000));
        assert!(transport.local_addr().is_ok());
    }
}
