//! Known vehicles and profile selection
//!
//! The registry is an explicit table: every vehicle is added in code with
//! its fingerprints and, when the car can be steered, the governor tuning to
//! run it with. After identification, [`VehicleRegistry::select`] turns the
//! outcome into a [`CarProfile`], falling back to a generic "mock" profile
//! without steering when nothing matched.

use crate::config::GovernorConfig;
use crate::fingerprint::{Identification, Signature};
use crate::governor::CommandGovernor;
use crate::types::{AssistError, Result};
use crate::vin::{self, ChassisRecord, LateralTuning};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Identifier of the generic VAG MQB entry
pub const GENERIC_MQB: &str = "VOLKSWAGEN GENERIC MQB";

/// Identifier of the fallback profile
pub const MOCK: &str = "mock";

/// Mass added to the curb weight for fuel and one occupant
pub const STD_CARGO_KG: f64 = 136.0;

/// Vehicle make family, as far as identification cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Brand {
    /// VAG group (VW, Audi, Skoda, Seat): one shared platform fingerprint,
    /// the concrete car is told apart by VIN
    Volkswagen,
    /// Toyota and Lexus: the driving-support ECU broadcasts late, and the
    /// camera bus helps telling models apart
    Toyota,
    Other,
}

impl Brand {
    /// Identification is only complete once the VIN is known
    pub fn requires_vin(&self) -> bool {
        matches!(self, Brand::Volkswagen)
    }

    /// Needs the long settle window before a single candidate is accepted
    pub fn broadcasts_late(&self) -> bool {
        matches!(self, Brand::Toyota)
    }

    /// Secondary-bus traffic is fingerprinted once only this brand is left
    pub fn fingerprints_secondary_bus(&self) -> bool {
        matches!(self, Brand::Toyota)
    }
}

/// One known signature of a vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct KnownFingerprint {
    /// Signature on the primary bus
    pub primary: Signature,
    /// Signature on the secondary bus, if it is used to disambiguate
    pub secondary: Option<Signature>,
}

impl KnownFingerprint {
    pub fn new(primary: Signature) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Signature) -> Self {
        self.secondary = Some(secondary);
        self
    }
}

/// A registered vehicle
#[derive(Debug, Clone)]
pub struct VehicleEntry {
    pub id: String,
    pub brand: Brand,
    /// Any one of these matching is enough
    pub fingerprints: Vec<KnownFingerprint>,
    /// Governor tuning, `None` if the vehicle cannot be steered
    pub governor: Option<GovernorConfig>,
}

impl VehicleEntry {
    pub fn new(id: impl Into<String>, brand: Brand) -> Self {
        Self {
            id: id.into(),
            brand,
            fingerprints: Vec::new(),
            governor: None,
        }
    }

    /// Builder method: add a known fingerprint
    pub fn with_fingerprint(mut self, fingerprint: KnownFingerprint) -> Self {
        self.fingerprints.push(fingerprint);
        self
    }

    /// Builder method: make the vehicle steerable with this tuning
    pub fn with_governor(mut self, config: GovernorConfig) -> Self {
        self.governor = Some(config);
        self
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Registered vehicles
    pub num_vehicles: usize,
    /// Known fingerprints across all vehicles
    pub num_fingerprints: usize,
    /// Distinct primary-bus addresses across all fingerprints
    pub num_addresses: usize,
}

/// Startup banner to show once identification finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StartupAlert {
    /// Recognised and steerable
    Startup,
    /// Not recognised; running on the fallback profile
    StartupNoCar,
    /// Recognised but without steering ability
    StartupNoControl,
}

/// Everything the session needs to know about the attached car
#[derive(Debug, Clone, Serialize)]
pub struct CarProfile {
    pub vehicle_id: String,
    pub vin: String,
    /// Decoded chassis for brands identified by VIN
    pub chassis: Option<ChassisRecord>,
    /// Curb weight plus standard cargo
    pub mass_kg: Option<f64>,
    pub wheelbase_m: Option<f64>,
    pub center_to_front_m: Option<f64>,
    pub tuning: LateralTuning,
    pub governor: Option<GovernorConfig>,
    pub startup_alert: StartupAlert,
}

impl CarProfile {
    /// Profile used when no vehicle was recognised
    pub fn mock() -> Self {
        Self {
            vehicle_id: MOCK.to_string(),
            vin: String::new(),
            chassis: None,
            mass_kg: None,
            wheelbase_m: None,
            center_to_front_m: None,
            tuning: LateralTuning::default(),
            governor: None,
            startup_alert: StartupAlert::StartupNoCar,
        }
    }

    /// True if a command governor can be built for this car
    pub fn steering_available(&self) -> bool {
        self.governor.is_some()
    }

    /// Build the command governor for this car
    pub fn command_governor(&self) -> Result<CommandGovernor> {
        let config = self.governor.clone().ok_or_else(|| {
            AssistError::UnknownVehicle(format!("no steering control for {}", self.vehicle_id))
        })?;
        CommandGovernor::new(config)
    }
}

/// Table of known vehicles
pub struct VehicleRegistry {
    vehicles: Vec<VehicleEntry>,
    index: HashMap<String, usize>,
}

impl VehicleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            vehicles: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registry with the built-in vehicles
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.add_vehicle(generic_mqb());
        registry
    }

    /// Add a vehicle, replacing an earlier entry with the same id
    pub fn add_vehicle(&mut self, entry: VehicleEntry) {
        match self.index.get(&entry.id) {
            Some(&idx) => {
                log::debug!("Replacing registry entry {}", entry.id);
                self.vehicles[idx] = entry;
            }
            None => {
                self.index.insert(entry.id.clone(), self.vehicles.len());
                self.vehicles.push(entry);
            }
        }
    }

    /// Look up a vehicle by id
    pub fn get(&self, id: &str) -> Option<&VehicleEntry> {
        self.index.get(id).and_then(|&idx| self.vehicles.get(idx))
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = &VehicleEntry> {
        self.vehicles.iter()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        let num_fingerprints = self.vehicles.iter().map(|v| v.fingerprints.len()).sum();
        let num_addresses = self
            .vehicles
            .iter()
            .flat_map(|v| v.fingerprints.iter())
            .flat_map(|f| f.primary.addresses())
            .collect::<BTreeSet<_>>()
            .len();

        RegistryStats {
            num_vehicles: self.vehicles.len(),
            num_fingerprints,
            num_addresses,
        }
    }

    /// Turn an identification result into the session's car profile
    pub fn select(&self, identification: &Identification) -> CarProfile {
        let entry = match identification.candidate().and_then(|id| self.get(id)) {
            Some(entry) => entry,
            None => {
                log::warn!("No vehicle recognised, using {} profile", MOCK);
                return CarProfile::mock();
            }
        };

        let chassis = (entry.brand.requires_vin() && !identification.vin.is_empty())
            .then(|| vin::decode(&identification.vin));

        let mut governor = entry.governor.clone();
        if let Some(record) = &chassis {
            if !record.supported {
                log::warn!(
                    "{} is not supported, steering disabled",
                    record.display_name()
                );
                governor = None;
            }
        }

        let wheelbase_m = chassis.as_ref().and_then(|c| c.wheelbase_m);
        let startup_alert = if governor.is_some() {
            StartupAlert::Startup
        } else {
            StartupAlert::StartupNoControl
        };

        CarProfile {
            vehicle_id: entry.id.clone(),
            vin: identification.vin.clone(),
            mass_kg: chassis
                .as_ref()
                .and_then(|c| c.mass_kg)
                .map(|m| m + STD_CARGO_KG),
            wheelbase_m,
            center_to_front_m: wheelbase_m.map(|w| w * 0.5),
            tuning: chassis.as_ref().map(|c| c.tuning).unwrap_or_default(),
            chassis,
            governor,
            startup_alert,
        }
    }
}

impl Default for VehicleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Every MQB car shares this fingerprint; the VIN tells them apart
fn generic_mqb() -> VehicleEntry {
    #[rustfmt::skip]
    const MQB_SIGNATURE: &[(u32, usize)] = &[
        (64, 8), (134, 8), (159, 8), (173, 8), (178, 8), (253, 8), (257, 8), (260, 8),
        (262, 8), (264, 8), (278, 8), (279, 8), (283, 8), (285, 8), (286, 8), (288, 8),
        (289, 8), (290, 8), (294, 8), (299, 8), (302, 8), (346, 8), (385, 8), (391, 8),
        (418, 8), (427, 8), (568, 8), (569, 8), (668, 8), (679, 8), (681, 8), (695, 8),
        (779, 8), (780, 8), (783, 8), (792, 8), (795, 8), (804, 8), (806, 8), (807, 8),
        (808, 8), (809, 8), (826, 8), (827, 8), (870, 8), (896, 8), (897, 8), (898, 8),
        (901, 8), (917, 8), (919, 8), (927, 8), (929, 8), (930, 8), (949, 8), (958, 8),
        (960, 4), (981, 8), (987, 8), (988, 8), (991, 8), (997, 8), (1000, 8), (1019, 8),
        (1120, 8), (1122, 8), (1123, 8), (1124, 8), (1153, 8), (1156, 8), (1157, 8),
        (1158, 8), (1162, 8), (1175, 8), (1312, 8), (1351, 8), (1385, 8), (1413, 8),
        (1438, 8), (1440, 5), (1461, 8), (1471, 8), (1511, 8), (1514, 8), (1515, 8),
        (1516, 8), (1520, 8), (1600, 8), (1601, 8), (1603, 8), (1605, 8), (1624, 8),
        (1626, 8), (1629, 8), (1631, 8), (1635, 8), (1646, 8), (1648, 8), (1712, 6),
        (1714, 8), (1716, 8), (1717, 8), (1719, 8), (1720, 8), (1721, 8), (1792, 8),
    ];

    VehicleEntry::new(GENERIC_MQB, Brand::Volkswagen)
        .with_fingerprint(KnownFingerprint::new(Signature::from_pairs(MQB_SIGNATURE)))
        .with_governor(GovernorConfig::default())
}
