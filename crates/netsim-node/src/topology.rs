//! Topology — builds a runnable network from a [`SimConfig`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use netsim_core::config::{ConfigError, LinkConfig, NodeRef, SimConfig};
use netsim_core::Address;

use crate::channel::Interface;
use crate::host::{Delivery, Host};
use crate::link::{Link, LinkLayer};
use crate::router::{RouteError, Router};
use crate::scheduler::Scheduler;
use crate::telemetry::Telemetry;

/// Every node and link of one simulated network.
pub struct Network {
    hosts: HashMap<Address, Arc<Host>>,
    routers: HashMap<String, Arc<Router>>,
    links: Arc<LinkLayer>,
    telemetry: Telemetry,
}

impl Network {
    /// Construct hosts, routers and links. Completed messages from every
    /// host are published on the returned receiver.
    pub fn from_config(
        config: &SimConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Delivery>), TopologyError> {
        config.validate()?;
        let telemetry = Telemetry::new();
        let (deliveries, delivery_rx) = mpsc::unbounded_channel();

        let mut hosts = HashMap::new();
        for h in &config.hosts {
            let host = Host::new(
                h.address,
                config.simulation.host_queue_capacity,
                telemetry.clone(),
            )
            .with_deliveries(deliveries.clone());
            if hosts.insert(h.address, Arc::new(host)).is_some() {
                return Err(TopologyError::DuplicateHost(h.address));
            }
        }

        let mut routers = HashMap::new();
        for r in &config.routers {
            let capacity = r
                .queue_capacity
                .unwrap_or(config.simulation.router_queue_capacity);
            let router = Router::new(
                r.name.clone(),
                r.interfaces,
                capacity,
                r.forwarding_table(),
                telemetry.clone(),
            )
            .map_err(|e| TopologyError::Router(r.name.clone(), e))?;
            if routers.insert(r.name.clone(), Arc::new(router)).is_some() {
                return Err(TopologyError::DuplicateRouter(r.name.clone()));
            }
        }

        let mut network = Self {
            hosts,
            routers,
            links: Arc::new(LinkLayer::new(telemetry.clone())),
            telemetry,
        };

        let mut layer = LinkLayer::new(network.telemetry.clone());
        for l in &config.links {
            layer.add_link(network.bind(l)?);
        }
        network.links = Arc::new(layer);

        tracing::info!(
            hosts = network.hosts.len(),
            routers = network.routers.len(),
            links = network.links.len(),
            "network built"
        );
        Ok((network, delivery_rx))
    }

    fn bind(&self, link: &LinkConfig) -> Result<Link, TopologyError> {
        let source = self.endpoint(&link.from, link.from_interface, Direction::Out)?;
        let destination = self.endpoint(&link.to, link.to_interface, Direction::In)?;
        Ok(Link::new(
            link.to_string(),
            source,
            destination,
            link.mtu,
            self.telemetry.clone(),
        ))
    }

    fn endpoint(
        &self,
        node: &NodeRef,
        interface: usize,
        direction: Direction,
    ) -> Result<Arc<Interface>, TopologyError> {
        let no_such = || TopologyError::NoSuchInterface {
            node: node.clone(),
            interface,
        };
        match node {
            NodeRef::Host(address) => {
                let host = self
                    .hosts
                    .get(address)
                    .ok_or_else(|| TopologyError::UnknownNode(node.clone()))?;
                if interface != 0 {
                    return Err(no_such());
                }
                Ok(match direction {
                    Direction::In => host.inbound().clone(),
                    Direction::Out => host.outbound().clone(),
                })
            }
            NodeRef::Router(name) => {
                let router = self
                    .routers
                    .get(name)
                    .ok_or_else(|| TopologyError::UnknownNode(node.clone()))?;
                let intf = match direction {
                    Direction::In => router.inbound(interface),
                    Direction::Out => router.outbound(interface),
                };
                intf.cloned().ok_or_else(no_such)
            }
        }
    }

    pub fn host(&self, address: Address) -> Option<&Arc<Host>> {
        self.hosts.get(&address)
    }

    pub fn router(&self, name: &str) -> Option<&Arc<Router>> {
        self.routers.get(name)
    }

    pub fn link_layer(&self) -> &Arc<LinkLayer> {
        &self.links
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Spawn one scheduling unit per host, one per router, and one for the
    /// link layer.
    pub fn start(&self, tick: Duration) -> Scheduler {
        let mut scheduler = Scheduler::new(tick);
        for host in self.hosts.values() {
            scheduler.spawn(host.clone());
        }
        for router in self.routers.values() {
            scheduler.spawn(router.clone());
        }
        scheduler.spawn(self.links.clone());
        tracing::info!(
            units = scheduler.len(),
            tick_us = tick.as_micros() as u64,
            "network started"
        );
        scheduler
    }
}

#[derive(Clone, Copy)]
enum Direction {
    In,
    Out,
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("host {0} defined twice")]
    DuplicateHost(Address),
    #[error("router {0} defined twice")]
    DuplicateRouter(String),
    #[error("link references unknown node {0}")]
    UnknownNode(NodeRef),
    #[error("{node} has no interface {interface}")]
    NoSuchInterface { node: NodeRef, interface: usize },
    #[error("router {0}: {1}")]
    Router(String, RouteError),
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
}
