//! netsim-node — the running parts of the simulator: interface queues,
//! hosts, routers, links, and the scheduler that drives them.

pub mod channel;
pub mod host;
pub mod link;
pub mod router;
pub mod scheduler;
pub mod telemetry;
pub mod topology;

pub use channel::{BoundedChannel, ChannelError, Interface};
pub use host::{Delivery, DeliverySink, Host, HostError, Received};
pub use link::{Link, LinkError, LinkLayer, Transmission};
pub use router::{RouteError, Router};
pub use scheduler::{Quantum, Scheduler};
pub use telemetry::{DropReason, Telemetry};
pub use topology::{Network, TopologyError};
