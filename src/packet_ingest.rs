//! Folding inbound windows into the consensus tic.
//!
//! Each inbound [`TicPacket`] announces the low byte of its first tic and how
//! many tics it carries. The full window is rebuilt against the local
//! `maketic`, and `nettics` advances only when the window contiguously covers
//! the current consensus point. Everything else is dropped silently: the
//! engine waits for the peer to resend instead of skipping ahead.

use crate::network::messages::TicPacket;
use crate::sync_state::SyncState;
use crate::tic_expand::expand_tic;
use crate::Tic;

/// What [`ingest`] did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The window covered `nettics`; consensus moved forward.
    Accepted {
        /// Consensus before the packet.
        previous: Tic,
        /// Consensus after the packet (the window's end).
        nettics: Tic,
    },
    /// The window ends exactly at `nettics`: a repeat or an empty window.
    Duplicate,
    /// The window ends before `nettics`: an old, out-of-order packet.
    Stale,
    /// The window starts after `nettics`: a packet in between was missed.
    Gap {
        /// First tic the packet claimed to carry.
        start: Tic,
    },
}

impl IngestOutcome {
    /// Whether consensus advanced.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted { .. })
    }
}

/// Applies one inbound window to `state`, touching only `state.nettics`.
///
/// Checks, in order:
/// 1. `end == nettics` → [`IngestOutcome::Duplicate`]
/// 2. `end < nettics` → [`IngestOutcome::Stale`]
/// 3. `start > nettics` → [`IngestOutcome::Gap`]
/// 4. otherwise `nettics = end` → [`IngestOutcome::Accepted`]
///
/// `nettics` never decreases.
pub fn ingest(packet: &TicPacket, state: &mut SyncState) -> IngestOutcome {
    let start = expand_tic(packet.start_tic_low, state.maketic);
    let end = start + i32::from(packet.num_tics);

    if end == state.nettics {
        tracing::trace!(%start, %end, "duplicate or empty window");
        return IngestOutcome::Duplicate;
    }

    if end < state.nettics {
        tracing::trace!(%start, %end, nettics = %state.nettics, "stale window");
        return IngestOutcome::Stale;
    }

    if start > state.nettics {
        tracing::debug!(
            %start,
            %end,
            nettics = %state.nettics,
            "missed window, waiting for resend"
        );
        return IngestOutcome::Gap { start };
    }

    let previous = state.nettics;
    state.nettics = end;
    tracing::trace!(%previous, nettics = %end, "consensus advanced");
    IngestOutcome::Accepted {
        previous,
        nettics: end,
    }
}
