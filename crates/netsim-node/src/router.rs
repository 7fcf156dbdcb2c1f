//! Router — table-driven forwarding between interfaces.
//!
//! One `forward` pass takes at most one frame from each inbound queue, in
//! interface order. A frame is decoded, its outgoing interface looked up by
//! (source, destination), refragmented for that interface's MTU, and every
//! resulting datagram offered to the outbound queue without waiting. Any
//! failure drops the unit and is reported; the pass always moves on to the
//! next interface.

use std::sync::Arc;

use bytes::Bytes;

use netsim_core::{refragment, Address, Datagram, ForwardingTable, FragmentError, WireError};

use crate::channel::Interface;
use crate::scheduler::Quantum;
use crate::telemetry::{DropReason, Telemetry};

/// An inbound/outbound queue pair on one router port.
struct Port {
    inbound: Arc<Interface>,
    outbound: Arc<Interface>,
}

pub struct Router {
    name: String,
    ports: Vec<Port>,
    table: ForwardingTable,
    telemetry: Telemetry,
}

impl Router {
    /// Build a router with `interfaces` ports whose queues hold at most
    /// `queue_capacity` frames (0 = unbounded).
    ///
    /// Fails if any route points past the last interface.
    pub fn new(
        name: impl Into<String>,
        interfaces: usize,
        queue_capacity: usize,
        table: ForwardingTable,
        telemetry: Telemetry,
    ) -> Result<Self, RouteError> {
        if let Some((_, _, interface)) = table.entries().find(|&(_, _, i)| i >= interfaces) {
            return Err(RouteError::InterfaceOutOfRange {
                interface,
                count: interfaces,
            });
        }
        let ports = (0..interfaces)
            .map(|_| Port {
                inbound: Arc::new(Interface::new(queue_capacity)),
                outbound: Arc::new(Interface::new(queue_capacity)),
            })
            .collect();
        Ok(Self {
            name: name.into(),
            ports,
            table,
            telemetry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interface_count(&self) -> usize {
        self.ports.len()
    }

    pub fn inbound(&self, interface: usize) -> Option<&Arc<Interface>> {
        self.ports.get(interface).map(|p| &p.inbound)
    }

    pub fn outbound(&self, interface: usize) -> Option<&Arc<Interface>> {
        self.ports.get(interface).map(|p| &p.outbound)
    }

    pub fn table(&self) -> &ForwardingTable {
        &self.table
    }

    /// One pass over every inbound queue. Returns the number of datagrams
    /// placed on outbound queues.
    pub fn forward(&self) -> usize {
        let mut forwarded = 0;
        for interface in 0..self.ports.len() {
            match self.forward_interface(interface) {
                Ok(n) => forwarded += n,
                Err(e) => {
                    tracing::warn!(router = %self.name, interface, error = %e, "unit dropped");
                    self.telemetry.record_drop(e.drop_reason());
                }
            }
        }
        if forwarded > 0 {
            self.telemetry.record_forward(forwarded);
        }
        forwarded
    }

    /// Process at most one frame from the inbound queue of `interface`.
    pub fn forward_interface(&self, interface: usize) -> Result<usize, RouteError> {
        let port = self.ports.get(interface).ok_or(RouteError::InterfaceOutOfRange {
            interface,
            count: self.ports.len(),
        })?;
        let Some(frame) = port.inbound.try_get() else {
            return Ok(0);
        };

        let datagram = Datagram::decode(&frame)?;
        let out = self
            .table
            .lookup(datagram.source, datagram.destination)
            .ok_or(RouteError::NoRoute {
                src: datagram.source,
                dst: datagram.destination,
            })?;
        // Validated at construction.
        let egress = &self.ports[out].outbound;
        let mtu = egress.mtu().ok_or(RouteError::Unlinked(out))?;

        let frames = refragment(datagram, mtu)?
            .iter()
            .map(Datagram::encode)
            .collect::<Result<Vec<Bytes>, _>>()?;
        let total = frames.len();

        for (sent, frame) in frames.into_iter().enumerate() {
            if egress.try_put(frame).is_err() {
                if sent > 0 {
                    self.telemetry.record_forward(sent);
                }
                return Err(RouteError::Backpressure {
                    interface: out,
                    dropped: total - sent,
                    total,
                });
            }
        }

        tracing::debug!(
            router = %self.name,
            from = interface,
            to = out,
            units = total,
            "forwarded"
        );
        Ok(total)
    }
}

impl Quantum for Router {
    fn name(&self) -> String {
        format!("router-{}", self.name)
    }

    fn quantum(&self) {
        self.forward();
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no route for {src} -> {dst}")]
    NoRoute { src: Address, dst: Address },

    /// Outbound queue filled part-way; the remaining units were dropped.
    #[error("interface {interface} full: dropped {dropped} of {total} units")]
    Backpressure {
        interface: usize,
        dropped: usize,
        total: usize,
    },

    #[error("interface {0} has no link attached")]
    Unlinked(usize),

    #[error("interface {interface} out of range ({count} interfaces)")]
    InterfaceOutOfRange { interface: usize, count: usize },

    #[error("decode failed: {0}")]
    Decode(#[from] WireError),

    #[error("refragmentation failed: {0}")]
    Fragment(#[from] FragmentError),
}

impl RouteError {
    pub fn drop_reason(&self) -> DropReason {
        match self {
            RouteError::NoRoute { .. } => DropReason::NoRoute,
            RouteError::Backpressure { .. } => DropReason::Backpressure,
            RouteError::Unlinked(_) | RouteError::InterfaceOutOfRange { .. } => {
                DropReason::Unlinked
            }
            RouteError::Decode(_) => DropReason::Decode,
            RouteError::Fragment(_) => DropReason::Fragment,
        }
    }
}
