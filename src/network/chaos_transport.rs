//! A configurable transport wrapper for network fault injection testing.
//!
//! [`ChaosTransport`] wraps any [`Transport`] to drop, duplicate and reorder
//! whole packets. The engine never retransmits, so this is how tests show what
//! lock-step pacing does under a lossy link: duplicates and reordered stale
//! windows are absorbed, while a lost window stalls consensus until the frame
//! scheduler's timeout hands control back.
//!
//! # Example
//!
//! ```rust
//! use lockstep_tics::{ChaosConfig, ChaosTransport, LoopbackTransport};
//!
//! let config = ChaosConfig::builder()
//!     .packet_loss_rate(0.05)
//!     .duplication_rate(0.1)
//!     .seed(42)
//!     .build();
//! let transport = ChaosTransport::new(LoopbackTransport::new(), config);
//! assert_eq!(transport.stats().packets_sent, 0);
//! ```

use std::collections::VecDeque;

use crate::network::messages::TicPacket;
use crate::rng::{Pcg32, Rng, SeedableRng};
use crate::Transport;

/// Configuration for packet-level chaos.
///
/// Use [`ChaosConfig::builder()`] for a fluent configuration API.
/// All rates default to 0.0 (no effect).
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosConfig {
    /// Probability of dropping a packet on send (0.0 - 1.0, default: 0.0)
    pub send_loss_rate: f64,

    /// Probability of dropping a packet on receive (0.0 - 1.0, default: 0.0)
    pub receive_loss_rate: f64,

    /// Probability of sending a packet twice (0.0 - 1.0, default: 0.0)
    pub duplication_rate: f64,

    /// Number of received packets to hold before releasing them, possibly
    /// shuffled (default: 0, no reordering)
    pub reorder_buffer_size: usize,

    /// Probability of swapping each held packet with another (0.0 - 1.0, default: 0.0)
    pub reorder_rate: f64,

    /// Probability of starting a burst loss event on send (0.0 - 1.0, default: 0.0)
    pub burst_loss_probability: f64,

    /// Consecutive sends dropped by one burst (default: 0)
    pub burst_loss_length: usize,

    /// Random seed for reproducible runs (default: seeded from the clock)
    pub seed: Option<u64>,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            send_loss_rate: 0.0,
            receive_loss_rate: 0.0,
            duplication_rate: 0.0,
            reorder_buffer_size: 0,
            reorder_rate: 0.0,
            burst_loss_probability: 0.0,
            burst_loss_length: 0,
            seed: None,
        }
    }
}

impl ChaosConfig {
    /// Creates a new builder for fluent configuration.
    pub fn builder() -> ChaosConfigBuilder {
        ChaosConfigBuilder::new()
    }

    /// No chaos at all.
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// The same loss rate on send and receive.
    pub fn lossy(loss_rate: f64) -> Self {
        Self {
            send_loss_rate: loss_rate.clamp(0.0, 1.0),
            receive_loss_rate: loss_rate.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    /// Duplicates and reorders but never loses anything.
    pub fn jittery() -> Self {
        Self {
            duplication_rate: 0.2,
            reorder_buffer_size: 3,
            reorder_rate: 0.3,
            ..Default::default()
        }
    }
}

/// Builder for [`ChaosConfig`].
#[derive(Debug, Clone, Default)]
pub struct ChaosConfigBuilder {
    config: ChaosConfig,
}

impl ChaosConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets packet loss rate for both send and receive.
    pub fn packet_loss_rate(mut self, rate: f64) -> Self {
        self.config.send_loss_rate = rate.clamp(0.0, 1.0);
        self.config.receive_loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets packet loss rate for sending only.
    pub fn send_loss_rate(mut self, rate: f64) -> Self {
        self.config.send_loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets packet loss rate for receiving only.
    pub fn receive_loss_rate(mut self, rate: f64) -> Self {
        self.config.receive_loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the packet duplication rate.
    pub fn duplication_rate(mut self, rate: f64) -> Self {
        self.config.duplication_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the reorder buffer size and swap probability.
    pub fn reorder(mut self, buffer_size: usize, rate: f64) -> Self {
        self.config.reorder_buffer_size = buffer_size;
        self.config.reorder_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets burst loss parameters.
    ///
    /// When a burst is triggered (with `probability`), `length` consecutive
    /// sends are dropped.
    pub fn burst_loss(mut self, probability: f64, length: usize) -> Self {
        self.config.burst_loss_probability = probability.clamp(0.0, 1.0);
        self.config.burst_loss_length = length;
        self
    }

    /// Sets the random seed for deterministic behavior.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ChaosConfig {
        self.config
    }
}

/// Statistics about chaos transport behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChaosStats {
    /// Packets handed to `send`
    pub packets_sent: u64,
    /// Packets dropped on send
    pub packets_dropped_send: u64,
    /// Extra copies sent
    pub packets_duplicated: u64,
    /// Packets handed back from `poll`
    pub packets_received: u64,
    /// Packets dropped on receive
    pub packets_dropped_receive: u64,
    /// Swaps performed in the reorder buffer
    pub packets_reordered: u64,
    /// Burst loss events triggered
    pub burst_loss_events: u64,
    /// Packets dropped by bursts
    pub packets_dropped_burst: u64,
}

/// A transport wrapper that injects configurable packet chaos.
pub struct ChaosTransport<Tr: Transport> {
    inner: Tr,
    config: ChaosConfig,
    rng: Pcg32,
    /// Received packets waiting to be reordered.
    reorder_buffer: Vec<TicPacket>,
    /// Packets ready to be returned by `poll`.
    ready: VecDeque<TicPacket>,
    burst_loss_remaining: usize,
    stats: ChaosStats,
}

impl<Tr: Transport> ChaosTransport<Tr> {
    /// Wraps `inner`.
    pub fn new(inner: Tr, config: ChaosConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_entropy(),
        };

        Self {
            inner,
            config,
            rng,
            reorder_buffer: Vec::new(),
            ready: VecDeque::new(),
            burst_loss_remaining: 0,
            stats: ChaosStats::default(),
        }
    }

    /// Returns a reference to the inner transport.
    pub fn inner(&self) -> &Tr {
        &self.inner
    }

    /// Consumes the wrapper and returns the inner transport.
    pub fn into_inner(self) -> Tr {
        self.inner
    }

    /// Returns the current chaos configuration.
    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    /// Replaces the chaos configuration. The RNG keeps its current sequence.
    pub fn set_config(&mut self, config: ChaosConfig) {
        self.config = config;
    }

    /// Returns statistics about chaos behavior.
    pub fn stats(&self) -> ChaosStats {
        self.stats
    }

    /// Received packets held back by the reorder buffer.
    pub fn packets_held(&self) -> usize {
        self.reorder_buffer.len()
    }

    fn roll(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            false
        } else if rate >= 1.0 {
            true
        } else {
            self.rng.gen_bool(rate)
        }
    }

    fn should_drop_burst(&mut self) -> bool {
        if self.burst_loss_remaining > 0 {
            self.burst_loss_remaining -= 1;
            self.stats.packets_dropped_burst += 1;
            return true;
        }

        if self.config.burst_loss_length > 0 && self.roll(self.config.burst_loss_probability) {
            self.stats.burst_loss_events += 1;
            self.burst_loss_remaining = self.config.burst_loss_length.saturating_sub(1);
            self.stats.packets_dropped_burst += 1;
            return true;
        }

        false
    }

    /// Moves everything the inner transport has into the ready queue,
    /// applying receive loss and reordering on the way.
    fn pull_inner(&mut self) {
        while let Some(packet) = self.inner.poll() {
            if self.roll(self.config.receive_loss_rate) {
                self.stats.packets_dropped_receive += 1;
                tracing::trace!(?packet, "chaos dropped inbound packet");
                continue;
            }
            if self.config.reorder_buffer_size == 0 || self.config.reorder_rate <= 0.0 {
                self.ready.push_back(packet);
            } else {
                self.reorder_buffer.push(packet);
            }
        }

        if !self.reorder_buffer.is_empty()
            && self.reorder_buffer.len() >= self.config.reorder_buffer_size
        {
            let len = self.reorder_buffer.len() as u32;
            for i in 0..self.reorder_buffer.len() {
                if self.roll(self.config.reorder_rate) {
                    let j = self.rng.gen_range(0..len) as usize;
                    if i != j {
                        self.reorder_buffer.swap(i, j);
                        self.stats.packets_reordered += 1;
                    }
                }
            }
            self.ready.extend(self.reorder_buffer.drain(..));
        }
    }
}

impl<Tr: Transport> Transport for ChaosTransport<Tr> {
    fn send(&mut self, packet: &TicPacket) {
        self.stats.packets_sent += 1;

        if self.should_drop_burst() {
            return;
        }

        if self.roll(self.config.send_loss_rate) {
            self.stats.packets_dropped_send += 1;
            tracing::trace!(?packet, "chaos dropped outbound packet");
            return;
        }

        self.inner.send(packet);

        if self.roll(self.config.duplication_rate) {
            self.stats.packets_duplicated += 1;
            self.inner.send(packet);
        }
    }

    fn poll(&mut self) -> Option<TicPacket> {
        if self.ready.is_empty() {
            self.pull_inner();
        }
        let packet = self.ready.pop_front()?;
        self.stats.packets_received += 1;
        Some(packet)
    }
}

impl<Tr: Transport> std::fmt::Debug for ChaosTransport<Tr> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosTransport")
            .field("config", &self.config)
            .field("held", &self.reorder_buffer.len())
            .field("ready", &self.ready.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
