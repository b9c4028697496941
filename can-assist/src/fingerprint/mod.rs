//! Vehicle identification from live CAN traffic
//!
//! The engine consumes receive cycles (one batch of frames per 10 ms
//! transport poll), narrows the registry's vehicles down by their
//! address/length signatures and collects the VIN on the side. It decides
//! once a single candidate has settled, or fails when none is left or the
//! overall window elapses.
//!
//! # Live use
//!
//! ```ignore
//! let mut engine = FingerprintEngine::new(&registry, FingerprintConfig::default());
//! loop {
//!     let frames = transport.poll();
//!     if let Some(id) = engine.process_cycle(&frames) {
//!         break id;
//!     }
//!     if let Some(query) = engine.next_vin_query() {
//!         transport.send(query.address, &query.payload);
//!     }
//! }
//! ```

pub mod candidates;
pub mod signature;

pub use candidates::{BusRole, CandidateSet};
pub use signature::{ObservedFingerprint, Signature};

use crate::config::FingerprintConfig;
use crate::registry::VehicleRegistry;
use crate::types::{AssistError, CanFrame, FailureReason, Result};
use crate::vin::{VinAccumulator, VinQuery};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How an identification run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Exactly one vehicle matched
    Identified(String),
    /// Every candidate was eliminated
    NoMatch,
    /// No decision within the timeout window
    TimedOut,
    /// Stopped through an [`AbortHandle`]
    Aborted,
    /// The frame source ran dry before a decision
    StreamEnded,
}

impl Outcome {
    /// Failure reason, `None` for a successful identification
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Outcome::Identified(_) => None,
            Outcome::NoMatch => Some(FailureReason::NoCandidates),
            Outcome::TimedOut => Some(FailureReason::TimedOut),
            Outcome::Aborted => Some(FailureReason::Aborted),
            Outcome::StreamEnded => Some(FailureReason::StreamEnded),
        }
    }
}

/// Result of an identification run
#[derive(Debug, Clone, Serialize)]
pub struct Identification {
    pub outcome: Outcome,
    /// Signatures observed per bus, also populated on failure
    pub fingerprint: ObservedFingerprint,
    /// Complete VIN or empty
    pub vin: String,
    /// Receive cycles consumed
    pub cycles: u64,
}

impl Identification {
    /// Identified vehicle, if any
    pub fn candidate(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Identified(id) => Some(id),
            _ => None,
        }
    }

    /// The identified vehicle, or the failure as an error
    pub fn require_vehicle(&self) -> Result<&str> {
        match &self.outcome {
            Outcome::Identified(id) => Ok(id),
            other => Err(AssistError::IdentificationFailed(
                other.failure_reason().unwrap_or(FailureReason::NoCandidates),
            )),
        }
    }
}

/// Shared flag to stop an identification run from another thread
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fingerprinting state machine for one identification run
pub struct FingerprintEngine<'r> {
    config: FingerprintConfig,
    candidates: CandidateSet<'r>,
    observed: ObservedFingerprint,
    vin: VinAccumulator,
    cycle: u64,
    first_seen_cycle: Option<u64>,
    can_seen: bool,
}

impl<'r> FingerprintEngine<'r> {
    /// Start a run against every vehicle in the registry
    pub fn new(registry: &'r VehicleRegistry, config: FingerprintConfig) -> Self {
        let candidates = CandidateSet::from_registry(registry);
        log::info!(
            "Waiting for fingerprint ({} candidate vehicles)",
            candidates.len()
        );
        Self {
            config,
            candidates,
            observed: ObservedFingerprint::new(),
            vin: VinAccumulator::new(),
            cycle: 0,
            first_seen_cycle: None,
            can_seen: false,
        }
    }

    /// Candidates still in play
    pub fn candidates(&self) -> &CandidateSet<'r> {
        &self.candidates
    }

    /// Signatures observed so far
    pub fn observed(&self) -> &ObservedFingerprint {
        &self.observed
    }

    /// VIN collection state
    pub fn vin(&self) -> &VinAccumulator {
        &self.vin
    }

    /// Receive cycles completed so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Feed one received frame
    pub fn process_frame(&mut self, frame: &CanFrame) {
        self.can_seen = true;
        let primary = frame.src == self.config.primary_bus;

        if primary && frame.address == self.config.vin_response_address {
            self.vin.on_query_response(&frame.data);
        }
        if primary && frame.address == self.config.vin_broadcast_address {
            self.vin.on_broadcast_fragment(&frame.data);
        }

        let role = if primary {
            BusRole::Primary
        } else if frame.src == self.config.secondary_bus
            && self.candidates.all_brands(|b| b.fingerprints_secondary_bus())
        {
            BusRole::Secondary
        } else {
            return;
        };

        if !self.config.should_fingerprint_address(frame.address) {
            return;
        }

        self.observed.record(frame);
        for id in self.candidates.eliminate(frame, role) {
            log::debug!(
                "Eliminated {} on {:03X} ({} bytes, bus {})",
                id,
                frame.address,
                frame.dlc(),
                frame.src
            );
        }
    }

    /// Close the current receive cycle and evaluate termination
    pub fn end_cycle(&mut self) -> Option<Identification> {
        if self.first_seen_cycle.is_none() && self.can_seen {
            log::debug!("First CAN traffic in cycle {}", self.cycle);
            self.first_seen_cycle = Some(self.cycle);
        }

        let outcome = self
            .first_seen_cycle
            .and_then(|first| self.evaluate(self.cycle - first));
        self.cycle += 1;
        outcome.map(|outcome| self.conclude(outcome))
    }

    /// Feed one receive cycle worth of frames
    pub fn process_cycle(&mut self, frames: &[CanFrame]) -> Option<Identification> {
        for frame in frames {
            self.process_frame(frame);
        }
        self.end_cycle()
    }

    /// Diagnostic VIN request due for transmission, if any
    ///
    /// Nothing is requested before the bus has shown any traffic.
    pub fn next_vin_query(&mut self) -> Option<VinQuery> {
        if !self.can_seen {
            return None;
        }
        self.vin.next_query()
    }

    /// Run to completion over a sequence of receive cycles
    pub fn identify<I>(self, cycles: I) -> Identification
    where
        I: IntoIterator,
        I::Item: AsRef<[CanFrame]>,
    {
        self.identify_with_abort(cycles, &AbortHandle::new())
    }

    /// Run to completion, checking `abort` before every cycle
    pub fn identify_with_abort<I>(mut self, cycles: I, abort: &AbortHandle) -> Identification
    where
        I: IntoIterator,
        I::Item: AsRef<[CanFrame]>,
    {
        for batch in cycles {
            if abort.is_aborted() {
                return self.conclude(Outcome::Aborted);
            }
            if let Some(identification) = self.process_cycle(batch.as_ref()) {
                return identification;
            }
        }
        self.conclude(Outcome::StreamEnded)
    }

    fn evaluate(&self, elapsed: u64) -> Option<Outcome> {
        let timed_out = elapsed > u64::from(self.config.timeout_cycles);

        if let Some(entry) = self.candidates.single() {
            if entry.brand.requires_vin() {
                if self.vin.is_complete() {
                    return Some(Outcome::Identified(entry.id.clone()));
                }
            } else {
                let settle = if entry.brand.broadcasts_late() {
                    self.config.late_settle_cycles
                } else {
                    self.config.settle_cycles
                };
                if elapsed > u64::from(settle) {
                    return Some(Outcome::Identified(entry.id.clone()));
                }
            }
        } else if self.candidates.is_empty() {
            return Some(Outcome::NoMatch);
        }

        timed_out.then_some(Outcome::TimedOut)
    }

    fn conclude(&self, outcome: Outcome) -> Identification {
        let vin = match outcome {
            Outcome::Identified(ref id) => {
                let vin = self.vin.vin();
                log::info!("Fingerprinted {}", id);
                log::info!("VIN {:?}", vin);
                vin
            }
            ref failed => {
                log::warn!(
                    "Car doesn't match any fingerprint ({:?}, {} addresses observed)",
                    failed,
                    self.observed.total_addresses()
                );
                String::new()
            }
        };

        Identification {
            outcome,
            fingerprint: self.observed.clone(),
            vin,
            cycles: self.cycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Brand, KnownFingerprint, VehicleEntry};

    fn toyota_and_honda() -> VehicleRegistry {
        let mut registry = VehicleRegistry::new();
        registry.add_vehicle(VehicleEntry::new("TOYOTA PRIUS", Brand::Toyota).with_fingerprint(
            KnownFingerprint::new(Signature::from_pairs(&[(0x100, 8), (0x200, 8)]))
                .with_secondary(Signature::from_pairs(&[(0x2E4, 5)])),
        ));
        registry.add_vehicle(VehicleEntry::new("HONDA CIVIC", Brand::Other).with_fingerprint(
            KnownFingerprint::new(Signature::from_pairs(&[(0x100, 8), (0x300, 8)])),
        ));
        registry
    }

    fn cycle(frames: &[(u8, u32, usize)]) -> Vec<CanFrame> {
        frames
            .iter()
            .map(|(bus, addr, len)| CanFrame::new(*bus, *addr, vec![0; *len]))
            .collect()
    }

    #[test]
    fn test_silence_never_starts_the_clock() {
        let registry = toyota_and_honda();
        let engine = FingerprintEngine::new(&registry, FingerprintConfig::default());
        let empty: Vec<Vec<CanFrame>> = vec![Vec::new(); 500];

        let id = engine.identify(empty);
        assert_eq!(id.outcome, Outcome::StreamEnded);
        assert_eq!(id.cycles, 500);
    }

    #[test]
    fn test_settle_time_for_prompt_brand() {
        let registry = toyota_and_honda();
        let mut engine = FingerprintEngine::new(&registry, FingerprintConfig::default());

        assert!(engine.process_cycle(&cycle(&[(0, 0x300, 8)])).is_none());
        assert_eq!(engine.candidates().ids(), vec!["HONDA CIVIC"]);

        // Decision after more than 10 cycles since the first frame
        let mut decided_at = None;
        for n in 1..=20 {
            if let Some(id) = engine.process_cycle(&[]) {
                decided_at = Some((n, id));
                break;
            }
        }
        let (n, id) = decided_at.unwrap();
        assert_eq!(n, 11);
        assert_eq!(id.candidate(), Some("HONDA CIVIC"));
        assert_eq!(id.vin, "");
    }

    #[test]
    fn test_late_brand_settles_longer() {
        let registry = toyota_and_honda();
        let mut engine = FingerprintEngine::new(&registry, FingerprintConfig::default());
        engine.process_cycle(&cycle(&[(0, 0x200, 8)]));

        for _ in 0..100 {
            assert!(engine.process_cycle(&[]).is_none());
        }
        let id = engine.process_cycle(&[]).unwrap();
        assert_eq!(id.candidate(), Some("TOYOTA PRIUS"));
    }

    #[test]
    fn test_secondary_bus_only_for_single_brand() {
        let registry = toyota_and_honda();
        let mut engine = FingerprintEngine::new(&registry, FingerprintConfig::default());

        // Mixed brands: bus 2 is ignored entirely
        engine.process_cycle(&cycle(&[(2, 0x2E4, 8)]));
        assert_eq!(engine.candidates().len(), 2);
        assert!(engine.observed().bus(2).is_none());

        engine.process_cycle(&cycle(&[(0, 0x200, 8)]));
        // Now only Toyota is left and its camera traffic counts
        engine.process_cycle(&cycle(&[(2, 0x2E4, 8)]));
        assert!(engine.candidates().is_empty());
    }

    #[test]
    fn test_no_match_and_ignored_addresses() {
        let registry = toyota_and_honda();
        let mut engine = FingerprintEngine::new(&registry, FingerprintConfig::default());

        // Diagnostic responses and 29-bit traffic never eliminate
        assert!(engine
            .process_cycle(&cycle(&[(0, 0x7E8, 8), (0, 0x18DA_F110, 8)]))
            .is_none());
        assert_eq!(engine.candidates().len(), 2);

        let id = engine.process_cycle(&cycle(&[(0, 0x555, 8)])).unwrap();
        assert_eq!(id.outcome, Outcome::NoMatch);
        assert!(id.require_vehicle().is_err());
        assert_eq!(id.fingerprint.bus(0).map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_diagnostic_requests_are_fingerprinted() {
        let registry = toyota_and_honda();
        let mut engine = FingerprintEngine::new(&registry, FingerprintConfig::default());

        let id = engine.process_cycle(&cycle(&[(0, 0x7DF, 8)])).unwrap();
        assert_eq!(id.outcome, Outcome::NoMatch);
        assert_eq!(id.fingerprint.bus(0).and_then(|s| s.get(0x7DF)), Some(8));
    }

    #[test]
    fn test_source_port_decides_bus_role() {
        let registry = toyota_and_honda();
        let mut engine = FingerprintEngine::new(&registry, FingerprintConfig::default());

        // Forwarded from the camera side: not primary traffic
        let forwarded = CanFrame::new(0, 0x300, vec![0; 8]).with_src(2);
        engine.process_cycle(&[forwarded]);
        assert_eq!(engine.candidates().len(), 2);
        assert!(engine.observed().bus(0).is_none());

        // Received on the powertrain port, whatever bus it is routed to
        let received = CanFrame::new(2, 0x300, vec![0; 8]).with_src(0);
        engine.process_cycle(&[received]);
        assert_eq!(engine.candidates().ids(), vec!["HONDA CIVIC"]);
        assert_eq!(engine.observed().bus(0).and_then(|s| s.get(0x300)), Some(8));
    }

    #[test]
    fn test_timeout_with_ambiguous_candidates() {
        let registry = toyota_and_honda();
        let engine = FingerprintEngine::new(&registry, FingerprintConfig::default());
        let cycles = std::iter::repeat(cycle(&[(0, 0x100, 8)])).take(1000);

        let id = engine.identify(cycles);
        assert_eq!(id.outcome, Outcome::TimedOut);
        assert_eq!(id.cycles, 202);
    }

    #[test]
    fn test_abort_before_decision() {
        let registry = toyota_and_honda();
        let engine = FingerprintEngine::new(&registry, FingerprintConfig::default());
        let abort = AbortHandle::new();
        let remote = abort.clone();

        let cycles = (0..1000).map(|n| {
            if n == 5 {
                remote.abort();
            }
            cycle(&[(0, 0x100, 8)])
        });
        let id = engine.identify_with_abort(cycles, &abort);
        assert_eq!(id.outcome, Outcome::Aborted);
        assert!(matches!(
            id.require_vehicle(),
            Err(AssistError::IdentificationFailed(FailureReason::Aborted))
        ));

        // The registry is untouched: a retry sees every vehicle again
        let retry = FingerprintEngine::new(&registry, FingerprintConfig::default());
        assert_eq!(retry.candidates().len(), 2);
    }

    #[test]
    fn test_vin_query_waits_for_traffic() {
        let registry = toyota_and_honda();
        let mut engine = FingerprintEngine::new(&registry, FingerprintConfig::default());
        assert!(engine.next_vin_query().is_none());

        engine.process_cycle(&cycle(&[(0, 0x100, 8)]));
        assert_eq!(engine.next_vin_query().map(|q| q.address), Some(0x7DF));
    }
}
