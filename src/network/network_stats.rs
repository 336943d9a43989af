use crate::packet_ingest::IngestOutcome;

/// Counters describing how a session has been exchanging and consuming tics.
///
/// Everything here is cumulative since the session started.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "NetworkStats should be inspected or used after being queried"]
pub struct NetworkStats {
    /// Outbound windows handed to the transport (including empty ones).
    pub packets_sent: u64,
    /// Tics carried by those windows.
    pub tics_sent: u64,
    /// Inbound windows that advanced the consensus tic.
    pub packets_accepted: u64,
    /// Inbound windows ending exactly at the consensus tic.
    pub duplicate_packets: u64,
    /// Inbound windows ending before the consensus tic.
    pub stale_packets: u64,
    /// Inbound windows starting after the consensus tic (a missed packet).
    pub gap_packets: u64,
    /// Times local production stopped at the run-ahead bound.
    pub backpressure_stops: u64,
    /// Frames where the scheduler gave up waiting for consensus.
    pub stalls: u64,
    /// Simulation steps executed.
    pub steps_run: u64,
}

impl NetworkStats {
    /// Creates a new `NetworkStats` instance with all counters at 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_ingest(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Accepted { .. } => self.packets_accepted += 1,
            IngestOutcome::Duplicate => self.duplicate_packets += 1,
            IngestOutcome::Stale => self.stale_packets += 1,
            IngestOutcome::Gap { .. } => self.gap_packets += 1,
        }
    }

    /// Inbound windows that were dropped for any reason.
    #[must_use]
    pub fn packets_discarded(&self) -> u64 {
        self.duplicate_packets + self.stale_packets + self.gap_packets
    }
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure to ensure all fields are included when new fields are added.
        let Self {
            packets_sent,
            tics_sent,
            packets_accepted,
            duplicate_packets,
            stale_packets,
            gap_packets,
            backpressure_stops,
            stalls,
            steps_run,
        } = self;

        write!(
            f,
            "NetworkStats {{ sent: {} ({} tics), accepted: {}, duplicate: {}, stale: {}, gap: {}, backpressure: {}, stalls: {}, steps: {} }}",
            packets_sent,
            tics_sent,
            packets_accepted,
            duplicate_packets,
            stale_packets,
            gap_packets,
            backpressure_stops,
            stalls,
            steps_run
        )
    }
}
