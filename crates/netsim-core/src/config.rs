//! Configuration system for netsim.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. explicit path passed by the driver
//!   2. $NETSIM_CONFIG
//!   3. $XDG_CONFIG_HOME/netsim/config.toml
//!   4. ~/.config/netsim/config.toml
//!
//! An explicit path must exist. A discovered path that does not exist just
//! means no file.
//!
//! With no file at all, the default topology is the four-host diamond:
//! hosts 1 and 2 feed router A, which splits over B and C into D, which
//! serves hosts 3 and 4. Every link has an MTU of 50.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::route::ForwardingTable;
use crate::wire::{Address, HEADER_LEN};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub routers: Vec<RouterConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    /// Sends the driver issues once the network is running.
    #[serde(default)]
    pub messages: Vec<MessageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Period of one quantum for every scheduling unit. Must be >= 1.
    pub tick_ms: u64,
    /// How long the driver lets the network run before stopping it.
    pub duration_secs: u64,
    /// Default router interface queue depth. 0 = unbounded.
    pub router_queue_capacity: usize,
    /// Host interface queue depth. 0 = unbounded.
    pub host_queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub name: String,
    /// Number of interface pairs (one inbound and one outbound queue each).
    pub interfaces: usize,
    /// Overrides `simulation.router_queue_capacity` for this router.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteConfig {
    pub source: Address,
    pub destination: Address,
    pub interface: usize,
}

/// A node referenced from a link, e.g. `{ host = 1 }` or `{ router = "A" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRef {
    Host(Address),
    Router(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub from: NodeRef,
    pub from_interface: usize,
    pub to: NodeRef,
    pub to_interface: usize,
    pub mtu: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    pub source: Address,
    pub destination: Address,
    pub text: String,
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Host(address) => write!(f, "host-{address}"),
            NodeRef::Router(name) => write!(f, "router-{name}"),
        }
    }
}

impl fmt::Display for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.from, self.from_interface, self.to, self.to_interface
        )
    }
}

impl RouterConfig {
    pub fn forwarding_table(&self) -> ForwardingTable {
        self.routes
            .iter()
            .map(|r| (r.source, r.destination, r.interface))
            .collect()
    }
}

impl SimulationConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_MESSAGE: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, \
sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.";

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1,
            duration_secs: 5,
            router_queue_capacity: 0,
            host_queue_capacity: 0,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        let route = |source, destination, interface| RouteConfig {
            source,
            destination,
            interface,
        };
        let router = |name: &str, interfaces, routes| RouterConfig {
            name: name.to_string(),
            interfaces,
            queue_capacity: None,
            routes,
        };
        let link = |from, from_interface, to, to_interface| LinkConfig {
            from,
            from_interface,
            to,
            to_interface,
            mtu: 50,
        };
        let host = NodeRef::Host;
        let rtr = |name: &str| NodeRef::Router(name.to_string());

        Self {
            simulation: SimulationConfig::default(),
            hosts: (1..=4).map(|address| HostConfig { address }).collect(),
            routers: vec![
                router(
                    "A",
                    2,
                    vec![route(1, 3, 0), route(1, 4, 0), route(2, 3, 1), route(2, 4, 1)],
                ),
                router("B", 1, vec![route(1, 3, 0), route(1, 4, 0)]),
                router("C", 1, vec![route(2, 3, 0), route(2, 4, 0)]),
                router(
                    "D",
                    2,
                    vec![route(1, 3, 0), route(1, 4, 1), route(2, 3, 0), route(2, 4, 1)],
                ),
            ],
            links: vec![
                link(host(1), 0, rtr("A"), 0),
                link(host(2), 0, rtr("A"), 1),
                link(rtr("A"), 0, rtr("B"), 0),
                link(rtr("A"), 1, rtr("C"), 0),
                link(rtr("B"), 0, rtr("D"), 0),
                link(rtr("C"), 0, rtr("D"), 1),
                link(rtr("D"), 0, host(3), 0),
                link(rtr("D"), 1, host(4), 0),
            ],
            messages: [(1, 3), (1, 4), (2, 3), (2, 4)]
                .into_iter()
                .map(|(source, destination)| MessageConfig {
                    source,
                    destination,
                    text: DEFAULT_MESSAGE.to_string(),
                })
                .collect(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("netsim")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("link {link}: mtu {mtu} must exceed the {}-byte header", HEADER_LEN)]
    MtuTooSmall { link: String, mtu: usize },
    #[error("simulation.tick_ms must be at least 1")]
    InvalidTick,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SimConfig {
    /// Load config: env vars → file → defaults.
    ///
    /// A missing file at the discovered location is not an error; the
    /// built-in topology is used instead.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        if path.exists() {
            return Self::load_from(&path);
        }
        let mut config = SimConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let mut config: SimConfig =
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("NETSIM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply NETSIM_SIMULATION__* overrides, reading variables through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("NETSIM_SIMULATION__TICK_MS").and_then(|v| v.parse().ok()) {
            self.simulation.tick_ms = v;
        }
        if let Some(v) = lookup("NETSIM_SIMULATION__DURATION_SECS").and_then(|v| v.parse().ok()) {
            self.simulation.duration_secs = v;
        }
        if let Some(v) =
            lookup("NETSIM_SIMULATION__ROUTER_QUEUE_CAPACITY").and_then(|v| v.parse().ok())
        {
            self.simulation.router_queue_capacity = v;
        }
    }

    /// Reject settings that would only fail once traffic flows.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.tick_ms == 0 {
            return Err(ConfigError::InvalidTick);
        }
        if let Some(link) = self.links.iter().find(|l| l.mtu <= HEADER_LEN) {
            return Err(ConfigError::MtuTooSmall {
                link: link.to_string(),
                mtu: link.mtu,
            });
        }
        Ok(())
    }
}
