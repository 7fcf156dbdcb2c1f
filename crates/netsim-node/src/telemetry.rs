//! Telemetry — counts what the network delivered, forwarded, and dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Why a frame (or a whole message) was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    /// Frame failed to decode: bad checksum, bad length, garbage fields.
    Decode,
    /// A message's fragments did not line up at the receiver.
    Reassembly,
    /// Router had no forwarding entry for (source, destination).
    NoRoute,
    /// Destination queue was full.
    Backpressure,
    /// Link segment exceeded the receiving interface's MTU.
    SegmentTooLarge,
    /// Traffic reached an interface with no link attached.
    Unlinked,
    /// Datagram could not be split for the outgoing MTU.
    Fragment,
}

impl DropReason {
    pub const ALL: [DropReason; 7] = [
        DropReason::Decode,
        DropReason::Reassembly,
        DropReason::NoRoute,
        DropReason::Backpressure,
        DropReason::SegmentTooLarge,
        DropReason::Unlinked,
        DropReason::Fragment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::Decode => "decode",
            DropReason::Reassembly => "reassembly",
            DropReason::NoRoute => "no_route",
            DropReason::Backpressure => "backpressure",
            DropReason::SegmentTooLarge => "segment_too_large",
            DropReason::Unlinked => "unlinked",
            DropReason::Fragment => "fragment",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared counters. Cloning is cheap; all clones see the same numbers.
#[derive(Clone, Default)]
pub struct Telemetry {
    drops: Arc<DashMap<DropReason, u64>>,
    delivered: Arc<AtomicU64>,
    forwarded: Arc<AtomicU64>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_drop(&self, reason: DropReason) {
        *self.drops.entry(reason).or_insert(0) += 1;
    }

    pub fn drops(&self, reason: DropReason) -> u64 {
        self.drops.get(&reason).map(|n| *n).unwrap_or(0)
    }

    pub fn total_drops(&self) -> u64 {
        self.drops.iter().map(|entry| *entry.value()).sum()
    }

    /// A message reached its destination application.
    pub fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// A router placed `frames` datagrams on an outbound queue.
    pub fn record_forward(&self, frames: usize) {
        self.forwarded.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Log a summary line plus one line per non-zero drop reason.
    pub fn print_stats(&self) {
        tracing::info!(
            delivered = self.delivered(),
            forwarded = self.forwarded(),
            dropped = self.total_drops(),
            "network stats"
        );

        for reason in DropReason::ALL {
            let count = self.drops(reason);
            if count > 0 {
                tracing::info!(reason = %reason, count, "drops");
            }
        }
    }
}
