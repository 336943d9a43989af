//! In-process transport.
//!
//! [`LoopbackTransport::new`] echoes every packet back to its sender, which is
//! how a single node runs the full network path against itself.
//! [`LoopbackTransport::pair`] links two endpoints so two sessions in one
//! process can drive each other. Delivery is reliable and in order.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::network::messages::TicPacket;
use crate::Transport;

type Queue = Arc<Mutex<VecDeque<TicPacket>>>;

/// Reliable in-memory transport. Clones share the same queues.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
    outbox: Queue,
    inbox: Queue,
}

impl LoopbackTransport {
    /// An endpoint that receives its own packets.
    #[must_use]
    pub fn new() -> Self {
        let queue = Queue::default();
        Self {
            outbox: queue.clone(),
            inbox: queue,
        }
    }

    /// Two endpoints; whatever one sends, the other receives.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let a_to_b = Queue::default();
        let b_to_a = Queue::default();
        (
            Self {
                outbox: a_to_b.clone(),
                inbox: b_to_a.clone(),
            },
            Self {
                outbox: b_to_a,
                inbox: a_to_b,
            },
        )
    }

    /// Packets waiting to be polled on this endpoint.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inbox.lock().len()
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, packet: &TicPacket) {
        self.outbox.lock().push_back(packet.clone());
    }

    fn poll(&mut self) -> Option<TicPacket> {
        self.inbox.lock().pop_front()
    }
}
