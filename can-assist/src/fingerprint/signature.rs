//! Address → payload-length signatures

use crate::types::{Bus, CanFrame};
use serde::Serialize;
use std::collections::BTreeMap;

/// Mapping of CAN address to payload length
///
/// Used both for the known signature of a vehicle and for what has been
/// observed on one bus so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Signature {
    lengths: BTreeMap<u32, usize>,
}

impl Signature {
    /// Create an empty signature
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a signature from `(address, length)` pairs
    pub fn from_pairs(pairs: &[(u32, usize)]) -> Self {
        Self {
            lengths: pairs.iter().copied().collect(),
        }
    }

    /// Record an address with its payload length, replacing any earlier length
    pub fn insert(&mut self, address: u32, length: usize) {
        self.lengths.insert(address, length);
    }

    /// Expected payload length for an address
    pub fn get(&self, address: u32) -> Option<usize> {
        self.lengths.get(&address).copied()
    }

    /// True if the address is present with exactly this length
    pub fn accepts(&self, address: u32, length: usize) -> bool {
        self.get(address) == Some(length)
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Iterate over `(address, length)` in address order
    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.lengths.iter().map(|(a, l)| (*a, *l))
    }

    /// Addresses in this signature
    pub fn addresses(&self) -> impl Iterator<Item = u32> + '_ {
        self.lengths.keys().copied()
    }
}

/// Per-bus signatures collected during an identification run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ObservedFingerprint {
    buses: BTreeMap<Bus, Signature>,
}

impl ObservedFingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame's address and length under the bus it arrived on
    pub fn record(&mut self, frame: &CanFrame) {
        self.buses
            .entry(frame.src)
            .or_default()
            .insert(frame.address, frame.dlc());
    }

    /// Signature observed on one bus
    pub fn bus(&self, bus: Bus) -> Option<&Signature> {
        self.buses.get(&bus)
    }

    /// Total distinct addresses across all buses
    pub fn total_addresses(&self) -> usize {
        self.buses.values().map(Signature::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_addresses() == 0
    }

    /// Iterate over `(bus, signature)` in bus order
    pub fn iter(&self) -> impl Iterator<Item = (Bus, &Signature)> {
        self.buses.iter().map(|(b, s)| (*b, s))
    }
}
