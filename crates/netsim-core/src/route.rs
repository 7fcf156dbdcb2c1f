//! Static forwarding tables.
//!
//! A router's table maps (source, destination) to the index of the
//! interface a datagram leaves on. Tables are supplied at construction and
//! never change afterwards; there is no route computation here.

use std::collections::HashMap;

use crate::wire::Address;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingTable {
    /// source -> destination -> outgoing interface
    routes: HashMap<Address, HashMap<Address, usize>>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a route. Returns the previous interface, if any.
    pub fn insert(
        &mut self,
        source: Address,
        destination: Address,
        interface: usize,
    ) -> Option<usize> {
        self.routes
            .entry(source)
            .or_default()
            .insert(destination, interface)
    }

    pub fn lookup(&self, source: Address, destination: Address) -> Option<usize> {
        self.routes.get(&source)?.get(&destination).copied()
    }

    /// Every (source, destination, interface) entry, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (Address, Address, usize)> + '_ {
        self.routes.iter().flat_map(|(&source, dsts)| {
            dsts.iter()
                .map(move |(&destination, &interface)| (source, destination, interface))
        })
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(Address, Address, usize)> for ForwardingTable {
    fn from_iter<I: IntoIterator<Item = (Address, Address, usize)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (source, destination, interface) in iter {
            table.insert(source, destination, interface);
        }
        table
    }
}

impl From<HashMap<Address, HashMap<Address, usize>>> for ForwardingTable {
    fn from(routes: HashMap<Address, HashMap<Address, usize>>) -> Self {
        Self { routes }
    }
}
