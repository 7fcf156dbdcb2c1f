//! netsim integration test harness.
//!
//! Tests here build whole networks from configuration and run them on the
//! real scheduler, so every host, router and the link layer is its own
//! task exchanging frames only through interface queues.
//!
//!   cargo test --test integration

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tokio::sync::mpsc::UnboundedReceiver;

use netsim_core::config::{
    HostConfig, LinkConfig, NodeRef, RouteConfig, RouterConfig, SimConfig, SimulationConfig,
};
use netsim_core::Address;
use netsim_node::{Delivery, Network};

mod failures;
mod pipeline;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const TICK: Duration = Duration::from_millis(1);
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Host addresses at the two ends of a [`line_config`] network.
pub const LEFT: Address = 1;
pub const RIGHT: Address = 2;

/// A chain `host 1 - R0 - R1 - ... - host 2` with links in both directions.
///
/// `mtus[i]` is the MTU of the i-th hop counted from host 1, so a chain of
/// `mtus.len() - 1` routers is built. Every router uses interface 0 towards
/// host 1 and interface 1 towards host 2.
pub fn line_config(mtus: &[usize]) -> SimConfig {
    assert!(mtus.len() >= 2, "a line needs at least one router");
    let routers = mtus.len() - 1;
    let name = |i: usize| format!("R{i}");

    let router_configs = (0..routers)
        .map(|i| RouterConfig {
            name: name(i),
            interfaces: 2,
            queue_capacity: None,
            routes: vec![
                RouteConfig {
                    source: LEFT,
                    destination: RIGHT,
                    interface: 1,
                },
                RouteConfig {
                    source: RIGHT,
                    destination: LEFT,
                    interface: 0,
                },
            ],
        })
        .collect();

    let mut links = Vec::new();
    for (hop, &mtu) in mtus.iter().enumerate() {
        let (left, left_intf) = match hop {
            0 => (NodeRef::Host(LEFT), 0),
            _ => (NodeRef::Router(name(hop - 1)), 1),
        };
        let right = if hop == routers {
            NodeRef::Host(RIGHT)
        } else {
            NodeRef::Router(name(hop))
        };
        links.push(LinkConfig {
            from: left.clone(),
            from_interface: left_intf,
            to: right.clone(),
            to_interface: 0,
            mtu,
        });
        links.push(LinkConfig {
            from: right,
            from_interface: 0,
            to: left,
            to_interface: left_intf,
            mtu,
        });
    }

    SimConfig {
        simulation: SimulationConfig {
            tick_ms: 1,
            duration_secs: 1,
            ..SimulationConfig::default()
        },
        hosts: vec![HostConfig { address: LEFT }, HostConfig { address: RIGHT }],
        routers: router_configs,
        links,
        messages: Vec::new(),
    }
}

/// Build a network from `config`, panicking on construction errors.
pub fn build(config: &SimConfig) -> (Network, UnboundedReceiver<Delivery>) {
    match Network::from_config(config) {
        Ok(built) => built,
        Err(e) => panic!("network should build: {e}"),
    }
}

/// Wait for `count` deliveries, failing after [`DELIVERY_TIMEOUT`].
pub async fn collect_deliveries(
    rx: &mut UnboundedReceiver<Delivery>,
    count: usize,
) -> Result<Vec<Delivery>> {
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        match tokio::time::timeout(DELIVERY_TIMEOUT, rx.recv()).await {
            Ok(Some(d)) => out.push(d),
            Ok(None) => bail!("delivery channel closed after {} of {count}", out.len()),
            Err(_) => bail!("timed out after {} of {count} deliveries", out.len()),
        }
    }
    Ok(out)
}

/// Poll `condition` every couple of milliseconds until it holds.
pub async fn wait_for_condition<F>(timeout: Duration, condition: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            bail!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_line_config_is_valid() {
    let config = line_config(&[50, 40, 60]);
    config.validate().unwrap();
    assert_eq!(config.routers.len(), 2);
    assert_eq!(config.links.len(), 6);

    let (network, _rx) = build(&config);
    assert_eq!(network.host(LEFT).unwrap().outbound().mtu(), Some(50));
    assert_eq!(network.router("R0").unwrap().outbound(1).unwrap().mtu(), Some(40));
    assert_eq!(network.router("R1").unwrap().outbound(1).unwrap().mtu(), Some(60));
    assert_eq!(network.host(RIGHT).unwrap().inbound().mtu(), Some(60));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_idle_network_starts_and_stops() {
    let (network, _rx) = build(&SimConfig::default());
    let scheduler = network.start(TICK);
    assert_eq!(scheduler.len(), 4 + 4 + 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    scheduler.stop();
    tokio::time::timeout(Duration::from_secs(2), scheduler.join())
        .await
        .expect("join should return promptly");
    assert_eq!(network.telemetry().total_drops(), 0);
}
