//! Links — point-to-point byte carriers between interfaces.
//!
//! A link moves encoded frames from one node's outbound queue to another
//! node's inbound queue. It knows nothing about headers: each frame is cut
//! into segments of at most the link MTU and every segment is offered to the
//! destination separately. Routers and hosts already size datagrams to the
//! MTU, so in a correctly configured network every frame is one segment.

use std::sync::Arc;

use bytes::Bytes;

use crate::channel::Interface;
use crate::scheduler::Quantum;
use crate::telemetry::{DropReason, Telemetry};

/// Split `frame` into pieces no longer than `mtu`. An empty frame yields
/// one empty segment.
pub fn segment(frame: &Bytes, mtu: usize) -> Vec<Bytes> {
    if frame.is_empty() || mtu == 0 {
        return vec![frame.clone()];
    }
    (0..frame.len())
        .step_by(mtu)
        .map(|start| frame.slice(start..(start + mtu).min(frame.len())))
        .collect()
}

/// What one `transmit_one` call moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    pub segments: usize,
    pub delivered: usize,
    /// Segments lost to a full destination queue.
    pub dropped: usize,
}

pub struct Link {
    label: String,
    source: Arc<Interface>,
    destination: Arc<Interface>,
    mtu: usize,
    telemetry: Telemetry,
}

impl Link {
    /// Bind `source` to `destination` and set both endpoints' MTU.
    pub fn new(
        label: impl Into<String>,
        source: Arc<Interface>,
        destination: Arc<Interface>,
        mtu: usize,
        telemetry: Telemetry,
    ) -> Self {
        source.set_mtu(mtu);
        destination.set_mtu(mtu);
        Self {
            label: label.into(),
            source,
            destination,
            mtu,
            telemetry,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Move at most one frame across the link. `Ok(None)` means the source
    /// queue was empty.
    ///
    /// If any segment is larger than the destination will accept, nothing
    /// is sent. Segments refused by a full destination are dropped, counted,
    /// and the rest are still offered.
    pub fn transmit_one(&self) -> Result<Option<Transmission>, LinkError> {
        let Some(frame) = self.source.try_get() else {
            return Ok(None);
        };

        let limit = self.destination.mtu().ok_or(LinkError::Unlinked)?;
        let segments = segment(&frame, self.mtu);
        if let Some(oversized) = segments.iter().find(|s| s.len() > limit) {
            return Err(LinkError::SegmentTooLarge {
                len: oversized.len(),
                mtu: limit,
            });
        }

        let mut sent = Transmission {
            segments: segments.len(),
            delivered: 0,
            dropped: 0,
        };
        for piece in segments {
            match self.destination.try_put(piece) {
                Ok(()) => sent.delivered += 1,
                Err(e) => {
                    sent.dropped += 1;
                    self.telemetry.record_drop(DropReason::Backpressure);
                    tracing::warn!(link = %self.label, error = %e, "segment lost");
                }
            }
        }

        tracing::debug!(
            link = %self.label,
            bytes = frame.len(),
            segments = sent.segments,
            dropped = sent.dropped,
            "frame carried"
        );
        Ok(Some(sent))
    }
}

/// Every link in the network, serviced together as one scheduling unit.
pub struct LinkLayer {
    links: Vec<Link>,
    telemetry: Telemetry,
}

impl LinkLayer {
    pub fn new(telemetry: Telemetry) -> Self {
        Self {
            links: Vec::new(),
            telemetry,
        }
    }

    pub fn add_link(&mut self, link: Link) {
        tracing::debug!(link = %link.label, mtu = link.mtu, "link added");
        self.links.push(link);
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// One pass over every link, moving at most one frame on each.
    /// Returns the number of segments delivered.
    pub fn transfer(&self) -> usize {
        let mut delivered = 0;
        for link in &self.links {
            match link.transmit_one() {
                Ok(Some(t)) => delivered += t.delivered,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(link = %link.label, error = %e, "frame dropped");
                    self.telemetry.record_drop(e.drop_reason());
                }
            }
        }
        delivered
    }
}

impl Quantum for LinkLayer {
    fn name(&self) -> String {
        "link-layer".into()
    }

    fn quantum(&self) {
        self.transfer();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("segment of {len} bytes exceeds destination mtu {mtu}")]
    SegmentTooLarge { len: usize, mtu: usize },
    #[error("destination interface has no mtu")]
    Unlinked,
}

impl LinkError {
    pub fn drop_reason(&self) -> DropReason {
        match self {
            LinkError::SegmentTooLarge { .. } => DropReason::SegmentTooLarge,
            LinkError::Unlinked => DropReason::Unlinked,
        }
    }
}
