use std::time::Duration;

use bytes::Bytes;

use netsim_core::config::{ConfigError, SimConfig};
use netsim_core::HEADER_LEN;
use netsim_node::{DropReason, Network, TopologyError};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Per-unit failures
// ══════════════════════════════════════════════════════════════════════════════

/// A flow with no route is dropped at the first router, fragment by
/// fragment, while every other flow through the same router still arrives.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_missing_route_drops_only_that_flow() {
    let mut config = SimConfig::default();
    config.routers[0]
        .routes
        .retain(|r| !(r.source == 2 && r.destination == 4));
    let (network, mut rx) = build(&config);
    let scheduler = network.start(TICK);

    let mut unroutable = 0;
    for m in &config.messages {
        let sent = network
            .host(m.source)
            .unwrap()
            .send_wait(m.destination, m.text.clone())
            .await
            .unwrap();
        if (m.source, m.destination) == (2, 4) {
            unroutable = sent;
        }
    }

    let deliveries = collect_deliveries(&mut rx, 3).await.unwrap();
    assert!(deliveries
        .iter()
        .all(|d| (d.message.source, d.host) != (2, 4)));

    let telemetry = network.telemetry().clone();
    wait_for_condition(Duration::from_secs(2), || {
        telemetry.drops(DropReason::NoRoute) == unroutable as u64
    })
    .await
    .unwrap();
    scheduler.shutdown().await;

    assert!(rx.try_recv().is_err(), "nothing for 2 -> 4 may be delivered");
    assert_eq!(telemetry.total_drops(), unroutable as u64);
}

/// A corrupted frame is counted as a decode drop and the host goes on to
/// deliver the next message normally.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_corrupt_frame_is_counted_and_host_continues() {
    let (network, mut rx) = build(&line_config(&[50, 50]));
    let receiver = network.host(RIGHT).unwrap();

    let mut frame = b"1000000001000020026".to_vec();
    frame.extend_from_slice(b"0000xyz");
    receiver.inbound().try_put(Bytes::from(frame)).unwrap();

    let scheduler = network.start(TICK);
    network
        .host(LEFT)
        .unwrap()
        .send_wait(RIGHT, "after the garbage")
        .await
        .unwrap();

    let delivered = collect_deliveries(&mut rx, 1).await.unwrap();
    scheduler.shutdown().await;

    assert_eq!(&delivered[0].message.payload[..], b"after the garbage");
    assert_eq!(network.telemetry().drops(DropReason::Decode), 1);
}

/// Router queues sized to one frame overflow when a link delivers faster
/// than the router forwards. The link layer is driven by hand here so the
/// interleaving is exact.
#[test]
fn test_full_router_queue_drops_at_link() {
    let mut config = line_config(&[50, 50]);
    config.simulation.router_queue_capacity = 1;
    let (network, _rx) = build(&config);

    let sent = network.host(LEFT).unwrap().send(RIGHT, vec![b'z'; 120]).unwrap();
    assert_eq!(sent, 5);
    for _ in 0..sent {
        network.link_layer().transfer();
    }

    let router = network.router("R0").unwrap();
    assert_eq!(router.inbound(0).unwrap().len(), 1);
    assert_eq!(network.telemetry().drops(DropReason::Backpressure), 4);

    assert_eq!(router.forward(), 1);
    network.link_layer().transfer();
    assert_eq!(network.host(RIGHT).unwrap().inbound().len(), 1);
}

/// A link too small for the header is refused before anything runs.
#[test]
fn test_undersized_link_is_refused_at_setup() {
    let config = line_config(&[50, HEADER_LEN]);
    match Network::from_config(&config) {
        Err(TopologyError::Config(ConfigError::MtuTooSmall { mtu, .. })) => {
            assert_eq!(mtu, HEADER_LEN)
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("undersized link must be rejected"),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
//  Shutdown
// ══════════════════════════════════════════════════════════════════════════════

/// After stop + join no unit runs: frames queued afterwards stay put.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_join_is_prompt_and_final() {
    let (network, _rx) = build(&line_config(&[50, 50, 50]));
    let scheduler = network.start(TICK);
    tokio::time::sleep(Duration::from_millis(20)).await;

    scheduler.stop();
    tokio::time::timeout(Duration::from_secs(2), scheduler.join())
        .await
        .expect("join should return within one quantum and one tick");

    let sender = network.host(LEFT).unwrap();
    sender.send(RIGHT, "never leaves").unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(sender.outbound().len(), 1);
    assert_eq!(network.telemetry().forwarded(), 0);
}
