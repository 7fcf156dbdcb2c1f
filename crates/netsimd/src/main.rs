//! netsimd — runs a simulated packet network until told to stop.
//!
//! Usage: `netsimd [CONFIG]`. Without a path the usual config lookup
//! applies, and with no config file at all the built-in diamond topology
//! runs with its four default sends.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;

use netsim_core::config::SimConfig;
use netsim_node::Network;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // ── Configuration ────────────────────────────────────────────────────────
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => SimConfig::load_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SimConfig::load().context("failed to load config")?,
    };
    config.validate().context("invalid config")?;
    tracing::info!(
        hosts = config.hosts.len(),
        routers = config.routers.len(),
        links = config.links.len(),
        tick_ms = config.simulation.tick_ms,
        "netsimd starting"
    );

    // ── Build and start ──────────────────────────────────────────────────────
    let (network, mut deliveries) =
        Network::from_config(&config).context("failed to build network")?;
    let scheduler = network.start(config.simulation.tick());

    let delivery_logger = tokio::spawn(async move {
        while let Some(delivery) = deliveries.recv().await {
            tracing::info!(
                host = delivery.host,
                source = delivery.message.source,
                message = %String::from_utf8_lossy(&delivery.message.payload),
                "received"
            );
        }
    });

    let stats_printer = {
        let telemetry = network.telemetry().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await;
            loop {
                interval.tick().await;
                telemetry.print_stats();
            }
        })
    };

    // ── Traffic ──────────────────────────────────────────────────────────────
    for m in &config.messages {
        let Some(host) = network.host(m.source) else {
            tracing::warn!(source = m.source, "message from unknown host skipped");
            continue;
        };
        let sent = host
            .send_wait(m.destination, Bytes::from(m.text.clone()))
            .await
            .with_context(|| format!("send {} -> {} failed", m.source, m.destination))?;
        tracing::info!(
            source = m.source,
            destination = m.destination,
            fragments = sent,
            "message sent"
        );
    }

    // ── Run, then stop ───────────────────────────────────────────────────────
    tokio::select! {
        _ = tokio::time::sleep(config.simulation.duration()) => {
            tracing::info!("simulation time elapsed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    scheduler.stop();
    scheduler.join().await;
    stats_printer.abort();

    // Every host holds a delivery sender; dropping the network closes the
    // channel and lets the logger drain and exit.
    let telemetry = network.telemetry().clone();
    drop(network);
    delivery_logger.await.context("delivery logger panicked")?;

    telemetry.print_stats();
    tracing::info!("netsimd stopped");
    Ok(())
}
