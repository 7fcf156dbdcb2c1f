//! Host — the endpoint that originates and consumes application messages.
//!
//! A host owns one interface pair. On send it fragments the payload for the
//! outbound MTU and enqueues every encoded datagram in order. Each quantum
//! it takes at most one frame from the inbound queue, decodes it, and feeds
//! the reassembler; completed messages are published on the delivery sink.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc;

use netsim_core::{
    fragment_message, Address, Assembly, Datagram, FragmentError, Message, Reassembler,
    ReassemblyError, WireError, HEADER_LEN,
};

use crate::channel::{ChannelError, Interface};
use crate::scheduler::Quantum;
use crate::telemetry::{DropReason, Telemetry};

/// A message handed to the application at its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub host: Address,
    pub message: Message,
}

pub type DeliverySink = mpsc::UnboundedSender<Delivery>;

/// Outcome of one `receive_one` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Inbound queue was empty.
    Idle,
    /// A datagram was buffered; its message is not complete yet.
    Buffered,
    Delivered(Delivery),
}

pub struct Host {
    address: Address,
    inbound: Arc<Interface>,
    outbound: Arc<Interface>,
    reassembler: Mutex<Reassembler>,
    deliveries: Option<DeliverySink>,
    telemetry: Telemetry,
}

impl Host {
    pub fn new(address: Address, queue_capacity: usize, telemetry: Telemetry) -> Self {
        Self {
            address,
            inbound: Arc::new(Interface::new(queue_capacity)),
            outbound: Arc::new(Interface::new(queue_capacity)),
            reassembler: Mutex::new(Reassembler::new()),
            deliveries: None,
            telemetry,
        }
    }

    /// Publish completed messages on `sink` in addition to returning them.
    pub fn with_deliveries(mut self, sink: DeliverySink) -> Self {
        self.deliveries = Some(sink);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn inbound(&self) -> &Arc<Interface> {
        &self.inbound
    }

    pub fn outbound(&self) -> &Arc<Interface> {
        &self.outbound
    }

    /// Fragment `payload` and enqueue every datagram without waiting.
    ///
    /// Returns the number of datagrams queued. The message is queued whole
    /// or not at all: every datagram is encoded and the free room checked
    /// before the first is enqueued. The host is the queue's only producer,
    /// so room can only grow in between. A full outbound queue means the
    /// host was sized too small for its traffic.
    pub fn send(
        &self,
        destination: Address,
        payload: impl Into<Bytes>,
    ) -> Result<usize, HostError> {
        let frames = self.prepare(destination, payload.into())?;
        let count = frames.len();
        if let Some(depth) = self.outbound.depth() {
            if self.outbound.len() + count > depth {
                return Err(ChannelError::Full { capacity: depth }.into());
            }
        }
        for frame in frames {
            self.outbound.try_put(frame)?;
        }
        Ok(count)
    }

    /// Like [`send`](Self::send), but waits for room on the outbound queue.
    pub async fn send_wait(
        &self,
        destination: Address,
        payload: impl Into<Bytes>,
    ) -> Result<usize, HostError> {
        let frames = self.prepare(destination, payload.into())?;
        let count = frames.len();
        for frame in frames {
            self.outbound.put(frame).await;
        }
        Ok(count)
    }

    fn prepare(&self, destination: Address, payload: Bytes) -> Result<Vec<Bytes>, HostError> {
        let mtu = self.outbound.mtu().ok_or(HostError::Unlinked)?;
        let datagrams = fragment_message(self.address, destination, payload, mtu)?;
        let frames = datagrams
            .iter()
            .map(Datagram::encode)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            host = self.address,
            destination,
            fragments = frames.len(),
            mtu,
            "message fragmented"
        );
        Ok(frames)
    }

    /// Process at most one inbound frame. Never waits.
    pub fn receive_one(&self) -> Result<Received, HostError> {
        let Some(frame) = self.inbound.try_get() else {
            return Ok(Received::Idle);
        };

        let datagram = Datagram::decode(&frame).map_err(|e| {
            tracing::debug!(
                host = self.address,
                header = hex::encode(&frame[..frame.len().min(HEADER_LEN)]),
                "undecodable frame"
            );
            HostError::Wire(e)
        })?;
        tracing::debug!(host = self.address, datagram = %datagram, "datagram received");

        let assembly = self
            .reassembler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accept(datagram)?;

        match assembly {
            Assembly::Incomplete => Ok(Received::Buffered),
            Assembly::Complete(message) => {
                let delivery = Delivery {
                    host: self.address,
                    message,
                };
                self.telemetry.record_delivery();
                tracing::info!(
                    host = self.address,
                    source = delivery.message.source,
                    bytes = delivery.message.payload.len(),
                    "message delivered"
                );
                if let Some(sink) = &self.deliveries {
                    // A closed sink only means nobody is observing any more.
                    let _ = sink.send(delivery.clone());
                }
                Ok(Received::Delivered(delivery))
            }
        }
    }
}

impl Quantum for Host {
    fn name(&self) -> String {
        format!("host-{}", self.address)
    }

    fn quantum(&self) {
        if let Err(e) = self.receive_one() {
            tracing::warn!(host = self.address, error = %e, "inbound datagram dropped");
            self.telemetry.record_drop(e.drop_reason());
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("host interface has no link attached")]
    Unlinked,
    #[error("fragmentation failed: {0}")]
    Fragment(#[from] FragmentError),
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    #[error("outbound queue full: {0}")]
    Full(#[from] ChannelError),
    #[error("reassembly failed: {0}")]
    Reassembly(#[from] ReassemblyError),
}

impl HostError {
    pub fn drop_reason(&self) -> DropReason {
        match self {
            HostError::Unlinked => DropReason::Unlinked,
            HostError::Fragment(_) => DropReason::Fragment,
            HostError::Wire(_) => DropReason::Decode,
            HostError::Full(_) => DropReason::Backpressure,
            HostError::Reassembly(_) => DropReason::Reassembly,
        }
    }
}
