//! netsim-core — wire format, fragmentation, reassembly and configuration.
//! Every other netsim crate depends on this one. Nothing in here spawns,
//! blocks or logs; it is pure data transformation.

pub mod config;
pub mod fragment;
pub mod reassembly;
pub mod route;
pub mod wire;

pub use fragment::{fragment_message, refragment, FragmentError};
pub use reassembly::{Assembly, Message, MessageKey, Reassembler, ReassemblyError};
pub use route::ForwardingTable;
pub use wire::{Address, Datagram, FragmentFlag, WireError, HEADER_LEN};
