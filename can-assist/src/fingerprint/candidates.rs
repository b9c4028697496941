//! Candidate vehicles still consistent with observed traffic

use crate::registry::{Brand, VehicleEntry, VehicleRegistry};
use crate::types::CanFrame;

/// Which signature of a known fingerprint a frame is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusRole {
    Primary,
    Secondary,
}

#[derive(Debug, Clone)]
struct Candidate<'r> {
    entry: &'r VehicleEntry,
    /// One flag per known fingerprint of the entry
    alive: Vec<bool>,
}

impl<'r> Candidate<'r> {
    fn new(entry: &'r VehicleEntry) -> Self {
        Self {
            entry,
            alive: vec![true; entry.fingerprints.len()],
        }
    }

    /// Drop fingerprints that disagree with the frame; false once none is left
    fn observe(&mut self, frame: &CanFrame, role: BusRole) -> bool {
        for (fingerprint, alive) in self.entry.fingerprints.iter().zip(self.alive.iter_mut()) {
            if !*alive {
                continue;
            }
            let signature = match role {
                BusRole::Primary => Some(&fingerprint.primary),
                BusRole::Secondary => fingerprint.secondary.as_ref(),
            };
            if let Some(signature) = signature {
                if !signature.accepts(frame.address, frame.dlc()) {
                    *alive = false;
                }
            }
        }
        self.alive.iter().any(|a| *a)
    }
}

/// Ordered set of vehicles that could still be attached
///
/// Only ever shrinks. The registry it borrows from is never modified, so a
/// new set built from the same registry starts complete again.
#[derive(Debug, Clone)]
pub struct CandidateSet<'r> {
    candidates: Vec<Candidate<'r>>,
}

impl<'r> CandidateSet<'r> {
    /// Start with every vehicle in the registry
    pub fn from_registry(registry: &'r VehicleRegistry) -> Self {
        Self {
            candidates: registry
                .iter()
                .filter(|entry| !entry.fingerprints.is_empty())
                .map(Candidate::new)
                .collect(),
        }
    }

    /// Remove every candidate that cannot have produced this frame
    ///
    /// Returns the identifiers of the candidates removed.
    pub fn eliminate(&mut self, frame: &CanFrame, role: BusRole) -> Vec<&'r str> {
        let mut removed = Vec::new();
        self.candidates.retain_mut(|candidate| {
            let entry: &'r VehicleEntry = candidate.entry;
            let keep = candidate.observe(frame, role);
            if !keep {
                removed.push(entry.id.as_str());
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.candidates.iter().any(|c| c.entry.id == id)
    }

    /// The remaining vehicle if exactly one is left
    pub fn single(&self) -> Option<&'r VehicleEntry> {
        match self.candidates.as_slice() {
            [only] => Some(only.entry),
            _ => None,
        }
    }

    /// True if every remaining candidate is of a brand matching `pred`
    ///
    /// Vacuously true for an empty set.
    pub fn all_brands(&self, pred: impl Fn(Brand) -> bool) -> bool {
        self.candidates.iter().all(|c| pred(c.entry.brand))
    }

    /// Identifiers of the remaining candidates in registry order
    pub fn ids(&self) -> Vec<&'r str> {
        self.candidates
            .iter()
            .map(|c| {
                let entry: &'r VehicleEntry = c.entry;
                entry.id.as_str()
            })
            .collect()
    }
}
