use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;

use netsim_core::config::{SimConfig, DEFAULT_MESSAGE};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  End-to-end delivery
// ══════════════════════════════════════════════════════════════════════════════

/// The four default sends over the diamond all arrive intact, including the
/// two that converge on each destination host from different sources.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_diamond_delivers_all_messages() {
    let config = SimConfig::default();
    let (network, mut rx) = build(&config);
    let scheduler = network.start(TICK);

    for m in &config.messages {
        let sent = network
            .host(m.source)
            .unwrap()
            .send_wait(m.destination, m.text.clone())
            .await
            .unwrap();
        assert!(sent > 1, "the default message should need several fragments");
    }

    let deliveries = collect_deliveries(&mut rx, 4).await.unwrap();
    scheduler.shutdown().await;

    let pairs: HashSet<_> = deliveries
        .iter()
        .map(|d| (d.message.source, d.host))
        .collect();
    assert_eq!(pairs, HashSet::from([(1, 3), (1, 4), (2, 3), (2, 4)]));
    for d in &deliveries {
        assert_eq!(d.message.destination, d.host);
        assert_eq!(&d.message.payload[..], DEFAULT_MESSAGE.as_bytes());
    }
    assert_eq!(network.telemetry().delivered(), 4);
    assert_eq!(network.telemetry().total_drops(), 0);
}

/// A narrow middle hop forces the first router to split every datagram;
/// the receiver still reassembles the original bytes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_narrow_hop_refragments() {
    let (network, mut rx) = build(&line_config(&[80, 40, 80]));
    let scheduler = network.start(TICK);

    let payload: Vec<u8> = (0..200u32).map(|i| b'a' + (i % 26) as u8).collect();
    let sent = network
        .host(LEFT)
        .unwrap()
        .send_wait(RIGHT, payload.clone())
        .await
        .unwrap();
    // 200 bytes at 57 per datagram.
    assert_eq!(sent, 4);

    let delivered = collect_deliveries(&mut rx, 1).await.unwrap();
    assert_eq!(&delivered[0].message.payload[..], &payload[..]);

    // R0 splits 57,57,57,29 into 17-byte pieces: 4+4+4+2. R1 passes them on.
    let telemetry = network.telemetry().clone();
    wait_for_condition(Duration::from_secs(2), || telemetry.forwarded() == 28)
        .await
        .unwrap();
    scheduler.shutdown().await;
    assert_eq!(telemetry.total_drops(), 0);
}

/// Payloads are raw bytes; nothing assumes text.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_binary_payload_both_directions() {
    let (network, mut rx) = build(&line_config(&[50, 50]));
    let scheduler = network.start(TICK);

    let payload: Bytes = (0..=255u8).cycle().take(700).collect::<Vec<_>>().into();
    network
        .host(LEFT)
        .unwrap()
        .send_wait(RIGHT, payload.clone())
        .await
        .unwrap();
    network
        .host(RIGHT)
        .unwrap()
        .send_wait(LEFT, payload.slice(..300))
        .await
        .unwrap();

    let mut deliveries = collect_deliveries(&mut rx, 2).await.unwrap();
    scheduler.shutdown().await;

    deliveries.sort_by_key(|d| d.host);
    assert_eq!(deliveries[0].host, LEFT);
    assert_eq!(deliveries[0].message.payload, payload.slice(..300));
    assert_eq!(deliveries[1].host, RIGHT);
    assert_eq!(deliveries[1].message.payload, payload);
}

/// An empty message is still one datagram and still delivered.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_empty_message_is_delivered() {
    let (network, mut rx) = build(&line_config(&[50, 50, 50]));
    let scheduler = network.start(TICK);

    let sent = network.host(LEFT).unwrap().send(RIGHT, Bytes::new()).unwrap();
    assert_eq!(sent, 1);

    let delivered = collect_deliveries(&mut rx, 1).await.unwrap();
    scheduler.shutdown().await;
    assert!(delivered[0].message.payload.is_empty());
    assert_eq!(delivered[0].message.source, LEFT);
}

/// Messages from one host to another delivered back to back keep their
/// order and content when the sender waits for each to arrive.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sequential_messages_on_one_flow() {
    let (network, mut rx) = build(&line_config(&[60, 45, 60]));
    let scheduler = network.start(TICK);
    let sender = network.host(LEFT).unwrap();

    for i in 0..5 {
        let text = format!("message {i}: {}", "x".repeat(40 * i));
        sender.send_wait(RIGHT, text.clone()).await.unwrap();
        let got = collect_deliveries(&mut rx, 1).await.unwrap();
        assert_eq!(&got[0].message.payload[..], text.as_bytes());
    }

    scheduler.shutdown().await;
    assert_eq!(network.telemetry().delivered(), 5);
}
