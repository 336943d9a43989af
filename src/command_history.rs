use std::sync::Arc;

use crate::report_violation_to;
use crate::telemetry::{
    InvariantChecker, InvariantViolation, ViolationKind, ViolationObserver, ViolationSeverity,
};
use crate::Tic;

/// Default number of command slots (the reference engine's `BACKUPTICS`).
///
/// Production may run at most `capacity / 2 - 1` tics ahead of the simulation,
/// so at the default that is 5 tics.
pub const DEFAULT_HISTORY_CAPACITY: usize = 12;

/// Smallest capacity that still allows one tic of run-ahead.
pub const MIN_HISTORY_CAPACITY: usize = 4;

/// Largest capacity for which the run-ahead bound stays inside the ±64 tic
/// expansion window and a window's tic count fits in a `u8`.
pub const MAX_HISTORY_CAPACITY: usize = 128;

/// How many tics production may run ahead of the simulation with a history of
/// `capacity` slots.
#[must_use]
pub const fn run_ahead_for(capacity: usize) -> i32 {
    (capacity / 2) as i32 - 1
}

/// Locally produced commands, one per tic, in a fixed ring addressed by `tic mod capacity`.
///
/// The ring is allocated once and never resized. It does not protect slots by
/// itself: callers bound production to [`max_run_ahead`](Self::max_run_ahead)
/// tics ahead of the simulated tic so a slot is never overwritten before the
/// simulation has consumed it.
///
/// # Note
///
/// This type is re-exported in [`__internal`](crate::__internal) for testing.
/// It is not part of the stable public API.
#[derive(Debug, Clone)]
pub struct CommandHistory<C> {
    slots: Vec<C>,
    /// Tic stored in each slot, `None` while the slot was never written.
    tics: Vec<Option<Tic>>,
}

impl<C: Copy + Default> CommandHistory<C> {
    /// Creates a history of `capacity` slots filled with `C::default()`.
    ///
    /// # Returns
    /// Returns `None` if `capacity` is outside
    /// [`MIN_HISTORY_CAPACITY`]`..=`[`MAX_HISTORY_CAPACITY`].
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Option<Self> {
        Self::with_capacity_observed(capacity, None)
    }

    /// Like [`with_capacity`](Self::with_capacity), but a rejected capacity is
    /// reported to `observer` instead of the tracing observer.
    #[must_use]
    pub fn with_capacity_observed(
        capacity: usize,
        observer: Option<&Arc<dyn ViolationObserver>>,
    ) -> Option<Self> {
        if !(MIN_HISTORY_CAPACITY..=MAX_HISTORY_CAPACITY).contains(&capacity) {
            report_violation_to!(
                observer,
                ViolationSeverity::Error,
                ViolationKind::CommandHistory,
                "history capacity must be in {}..={}, got {}",
                MIN_HISTORY_CAPACITY,
                MAX_HISTORY_CAPACITY,
                capacity
            );
            return None;
        }
        Some(Self {
            slots: vec![C::default(); capacity],
            tics: vec![None; capacity],
        })
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// How many tics production may run ahead of the simulation: `capacity / 2 - 1`.
    #[must_use]
    pub fn max_run_ahead(&self) -> i32 {
        run_ahead_for(self.capacity())
    }

    /// Stores the command produced for `tic` in slot `tic mod capacity`.
    pub fn insert(&mut self, tic: Tic, command: C) {
        let slot = tic.slot(self.capacity());
        self.slots[slot] = command;
        self.tics[slot] = Some(tic);
    }

    /// The command stored for `tic`, if that slot still holds `tic` and not an
    /// older or newer lap.
    #[must_use]
    pub fn get(&self, tic: Tic) -> Option<&C> {
        let slot = tic.slot(self.capacity());
        (self.tics[slot] == Some(tic)).then(|| &self.slots[slot])
    }

    /// The command in the slot `tic` maps to, whatever lap wrote it.
    ///
    /// Falls back to the default command if the slot was never written, which
    /// only happens when the simulation is forced to step with nothing produced.
    #[must_use]
    pub fn command_at(&self, tic: Tic) -> C {
        let slot = tic.slot(self.capacity());
        if self.tics[slot] != Some(tic) {
            tracing::trace!(%tic, stored = ?self.tics[slot], "command slot holds another lap");
        }
        self.slots[slot]
    }

    /// Commands for the half-open tic range `start..end`, oldest first.
    pub fn range(&self, start: Tic, end: Tic) -> impl Iterator<Item = C> + '_ {
        (start.as_i32()..end.as_i32()).map(move |t| self.command_at(Tic::new(t)))
    }
}

impl<C> InvariantChecker for CommandHistory<C> {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let capacity = self.slots.len();
        if self.tics.len() != capacity {
            return Err(InvariantViolation::new(
                "CommandHistory",
                "slot and tic bookkeeping lengths differ",
            )
            .with_details(format!("slots={}, tics={}", capacity, self.tics.len())));
        }
        for (index, stored) in self.tics.iter().enumerate() {
            if let Some(tic) = stored {
                if tic.slot(capacity) != index {
                    return Err(InvariantViolation::new(
                        "CommandHistory",
                        "tic stored in the wrong slot",
                    )
                    .with_details(format!("tic={}, slot={}", tic, index)));
                }
            }
        }
        Ok(())
    }
}
