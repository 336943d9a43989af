//! # Lockstep Tics
//!
//! A deterministic lock-step synchronization engine for real-time multiplayer
//! simulations. Every participant advances through the same sequence of discrete
//! simulation steps ("tics"), while only the low byte of each tic number travels
//! on the wire.
//!
//! The engine is a single cooperative loop. Once per rendered frame the caller
//! invokes [`FrameScheduler::tick`], which
//!
//! 1. samples local input and frames an outbound window ([`OutboundScheduler`]),
//! 2. folds inbound windows into the consensus tic ([`packet_ingest`]),
//! 3. decides how many simulation steps may run and drives the [`Simulator`].
//!
//! ```text
//! clock ─► OutboundScheduler ─► Transport ─► peer ─► Transport ─► PacketIngest
//!                                                                   │
//!          Simulator ◄── FrameScheduler ◄── consensus tic (nettics) ◄┘
//! ```
//!
//! # Example
//!
//! ```
//! use lockstep_tics::{
//!     Config, InputSource, LoopbackTransport, ManualClock, PacingConfig, SessionBuilder,
//!     Simulator, Tic,
//! };
//!
//! struct Game;
//! impl Config for Game {
//!     type Command = u8;
//!     type Event = u8;
//! }
//!
//! struct Keys;
//! impl InputSource<Game> for Keys {
//!     fn poll(&mut self) -> Vec<u8> { vec![1] }
//!     fn build_command(&mut self, events: Vec<u8>) -> u8 { events.iter().sum() }
//! }
//!
//! #[derive(Default)]
//! struct World { steps: Vec<(Tic, u8)> }
//! impl Simulator<Game> for World {
//!     fn run_step(&mut self, tic: Tic, command: &u8) { self.steps.push((tic, *command)); }
//! }
//!
//! let clock = ManualClock::new(0);
//! let mut session = SessionBuilder::<Game>::new()
//!     .with_pacing(PacingConfig::lan())
//!     .with_clock(clock.clone())
//!     .with_input_source(Keys)
//!     .with_transport(LoopbackTransport::new())
//!     .start_session()
//!     .expect("valid session");
//!
//! let mut world = World::default();
//! clock.advance(1);
//! let outcome = session.tick(&mut world, &mut ());
//! assert!(!outcome.stalled);
//! assert_eq!(world.steps, vec![(Tic::new(0), 1)]);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

pub use clock::{Clock, ManualClock, WallClock, DEFAULT_TIC_RATE};
pub use command_history::{CommandHistory, DEFAULT_HISTORY_CAPACITY};
pub use error::LockstepError;
pub use frame_scheduler::{FrameScheduler, SpinStatus, TickOutcome};
pub use network::chaos_transport::{ChaosConfig, ChaosTransport};
pub use network::loopback::LoopbackTransport;
pub use network::messages::TicPacket;
pub use network::network_stats::NetworkStats;
pub use network::udp_socket::UdpTransport;
pub use outbound::{OutboundScheduler, OutboundWindow};
pub use packet_ingest::IngestOutcome;
pub use sessions::builder::SessionBuilder;
pub use sessions::config::PacingConfig;
pub use sync_state::SyncState;
pub use tic_expand::expand_tic;

pub mod clock;
#[doc(hidden)]
pub mod command_history;
#[doc(hidden)]
pub mod error;
pub mod frame_scheduler;
#[doc(hidden)]
pub mod outbound;
#[doc(hidden)]
pub mod packet_ingest;
/// Deterministic PCG32 random number generator used for fault injection.
pub mod rng;
#[doc(hidden)]
pub mod sync_state;
pub mod telemetry;
pub mod tic_expand;
#[doc(hidden)]
pub mod sessions {
    #[doc(hidden)]
    pub mod builder;
    pub mod config;
}
#[doc(hidden)]
pub mod network {
    pub mod chaos_transport;
    pub mod codec;
    pub mod loopback;
    #[doc(hidden)]
    pub mod messages;
    #[doc(hidden)]
    pub mod network_stats;
    #[doc(hidden)]
    pub mod udp_socket;
}

/// Internal components exposed for integration tests, property tests and benches.
///
/// # ⚠️ WARNING: No Stability Guarantees
///
/// Nothing in this module is covered by semver. Game code should drive the
/// engine through [`SessionBuilder`] and [`FrameScheduler`] only.
#[doc(hidden)]
pub mod __internal {
    pub use crate::command_history::CommandHistory;
    pub use crate::network::codec::{decode_packet, encode_packet};
    pub use crate::outbound::{OutboundScheduler, OutboundWindow};
    pub use crate::packet_ingest::{ingest, IngestOutcome};
    pub use crate::sync_state::SyncState;
    pub use crate::tic_expand::{expand_tic, EXPANSION_WINDOW};
}

// #############
// #   TICS    #
// #############

/// A tic is one discrete unit of simulated time.
///
/// The same type counts network tics (`maketic`, `nettics`, `resendto`) and
/// executed simulation steps (`gametic`); the two differ by the duplication
/// factor `ticdup`. Tics start at 0 and only move forward during a session.
///
/// # Examples
///
/// ```
/// use lockstep_tics::Tic;
///
/// let tic = Tic::new(1000);
/// assert_eq!(tic.low_byte(), 232);
/// assert_eq!(tic.high_bits(), Tic::new(768));
/// assert_eq!((tic + 3) - tic, 3);
/// ```
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Tic(i32);

impl Tic {
    /// The first tic of every session.
    pub const ZERO: Tic = Tic(0);

    /// Creates a new `Tic` from an `i32` value.
    #[inline]
    #[must_use]
    pub const fn new(tic: i32) -> Self {
        Tic(tic)
    }

    /// Returns the underlying `i32` value.
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// The 8 bits that are actually transmitted.
    #[inline]
    #[must_use]
    pub const fn low_byte(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    /// This tic with the low byte cleared.
    #[inline]
    #[must_use]
    pub const fn high_bits(self) -> Tic {
        Tic(self.0 & !0xff)
    }

    /// Index of this tic in a ring of `capacity` slots.
    ///
    /// Uses euclidean remainder so a (never expected) negative tic still maps
    /// into `0..capacity`.
    #[inline]
    #[must_use]
    pub const fn slot(self, capacity: usize) -> usize {
        self.0.rem_euclid(capacity as i32) as usize
    }

    /// Converts a simulation-step count into network tics (`self / ticdup`).
    #[inline]
    #[must_use]
    pub const fn per_dup(self, ticdup: i32) -> Tic {
        Tic(self.0 / ticdup)
    }
}

impl std::fmt::Display for Tic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add<i32> for Tic {
    type Output = Tic;

    #[inline]
    fn add(self, rhs: i32) -> Self::Output {
        Tic(self.0 + rhs)
    }
}

impl std::ops::AddAssign<i32> for Tic {
    #[inline]
    fn add_assign(&mut self, rhs: i32) {
        self.0 += rhs;
    }
}

impl std::ops::Sub<i32> for Tic {
    type Output = Tic;

    #[inline]
    fn sub(self, rhs: i32) -> Self::Output {
        Tic(self.0 - rhs)
    }
}

impl std::ops::Sub<Tic> for Tic {
    type Output = i32;

    #[inline]
    fn sub(self, rhs: Tic) -> Self::Output {
        self.0 - rhs.0
    }
}

impl From<i32> for Tic {
    #[inline]
    fn from(value: i32) -> Self {
        Tic(value)
    }
}

impl From<Tic> for i32 {
    #[inline]
    fn from(tic: Tic) -> Self {
        tic.0
    }
}

impl PartialEq<i32> for Tic {
    #[inline]
    fn eq(&self, other: &i32) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<i32> for Tic {
    #[inline]
    fn partial_cmp(&self, other: &i32) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

// #############
// #  TRAITS   #
// #############

/// Compile time parameterization for sessions.
///
/// Bundles the generic types of a session. Implement this on a marker struct.
///
/// # Example
///
/// ```
/// use lockstep_tics::Config;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Copy, Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
/// struct TicCmd {
///     forward: i8,
///     side: i8,
///     buttons: u8,
/// }
///
/// enum KeyEvent { Down(u8), Up(u8) }
///
/// struct GameConfig;
///
/// impl Config for GameConfig {
///     type Command = TicCmd;
///     type Event = KeyEvent;
/// }
/// ```
pub trait Config: 'static {
    /// One tic worth of structured input. This is the only game data sent on the wire.
    ///
    /// [`Default`] fills the command history before anything has been produced.
    type Command: Copy + Clone + PartialEq + Default + Debug + Serialize + DeserializeOwned;

    /// A raw input event, as queued by the device layer.
    type Event;
}

/// Local input capture.
///
/// `poll` is called once per produced tic, even when run-ahead backpressure
/// then prevents a command from being written, so the device queue is always drained.
pub trait InputSource<T: Config> {
    /// Drains the raw events queued since the last call.
    fn poll(&mut self) -> Vec<T::Event>;

    /// Translates the drained events into one structured command.
    fn build_command(&mut self, events: Vec<T::Event>) -> T::Command;
}

/// Packet transport.
///
/// Delivery may drop or reorder whole packets; the engine's ingest policy copes
/// with duplicates and stale windows but does not retransmit.
pub trait Transport {
    /// Sends one outbound window.
    fn send(&mut self, packet: &TicPacket);

    /// Returns the next inbound packet, if one is waiting. Must not block.
    fn poll(&mut self) -> Option<TicPacket>;
}

/// The deterministic simulation driven by the engine.
pub trait Simulator<T: Config> {
    /// Executes exactly one simulation step.
    ///
    /// `tic` is the step number (`gametic`). With a duplication factor above 1,
    /// consecutive steps receive the same command.
    fn run_step(&mut self, tic: Tic, command: &T::Command);
}

/// UI/menu hooks that must keep running even when the simulation cannot.
pub trait UiTicker {
    /// Called once when [`FrameScheduler::tick`] gives up waiting for consensus.
    fn on_stall(&mut self);

    /// Called before every simulation step.
    fn on_step(&mut self) {}
}

impl UiTicker for () {
    fn on_stall(&mut self) {}
}

// ###################
// # UNIT TESTS      #
// ###################
