//! VAG chassis identification from the VIN
//!
//! Positions 7-8 of a VAG VIN carry a two-character chassis code, position
//! 10 the model year. A chassis belongs to a platform, and only MQB cars
//! accept heading-control assist the way the command governor drives it.
//!
//! Tunables compose in three layers: global defaults, then the platform,
//! then per-chassis overrides. A layer only replaces what it sets.

use serde::Serialize;
use std::fmt;

/// Vehicle platform (modular matrix) a chassis is built on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Platform {
    /// Modular transverse matrix
    Mqb,
    /// Small-car MQB variant with different radar and steering hardware
    MqbA0,
    /// MQB evolution
    MqbEvo,
    /// Modular longitudinal matrix (FlexRay powertrain)
    Mlb,
    /// MLB evolution (FlexRay powertrain)
    MlbEvo,
    /// Legacy Mk4 Golf-style messaging
    Pq35,
    /// Larger PQ35 sibling (B6/B7 Passat, Mk1 Tiguan)
    Pq46,
    /// New midsize sedan (North American Passat)
    Nms,
    /// New small family (no factory radar or camera)
    Nsf,
    /// Chassis code known but platform not determined
    Unknown,
}

impl Platform {
    /// Platform name as used in VAG documentation
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Mqb => "MQB",
            Platform::MqbA0 => "MQBA0",
            Platform::MqbEvo => "MQBevo",
            Platform::Mlb => "MLB",
            Platform::MlbEvo => "MLBevo",
            Platform::Pq35 => "PQ35",
            Platform::Pq46 => "PQ46",
            Platform::Nms => "NMS",
            Platform::Nsf => "NSF",
            Platform::Unknown => "unknown",
        }
    }

    /// Whether the governor can drive cars on this platform
    pub fn is_supported(&self) -> bool {
        matches!(self, Platform::Mqb)
    }

    fn tuning(&self) -> TuningOverrides {
        // No platform currently departs from the global defaults
        TuningOverrides::default()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lateral-control tunables handed to the (external) planner
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LateralTuning {
    pub steer_ratio: f64,
    pub steer_actuator_delay: f64,
    pub steer_rate_cost: f64,
    pub kp: f64,
    pub ki: f64,
    pub kf: f64,
}

impl Default for LateralTuning {
    fn default() -> Self {
        Self {
            steer_ratio: 15.0,
            steer_actuator_delay: 0.12,
            steer_rate_cost: 0.5,
            kp: 0.5,
            ki: 0.12,
            kf: 0.000006,
        }
    }
}

impl LateralTuning {
    fn apply(mut self, overrides: &TuningOverrides) -> Self {
        if let Some(kp) = overrides.kp {
            self.kp = kp;
        }
        if let Some(ki) = overrides.ki {
            self.ki = ki;
        }
        if let Some(kf) = overrides.kf {
            self.kf = kf;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TuningOverrides {
    kp: Option<f64>,
    ki: Option<f64>,
    kf: Option<f64>,
}

/// One row of the chassis table
#[derive(Debug, Clone, Copy)]
struct ChassisSpec {
    code: &'static str,
    brand: &'static str,
    model: &'static str,
    platform: Platform,
    mass_kg: Option<f64>,
    wheelbase_m: Option<f64>,
    tuning: TuningOverrides,
}

const fn chassis(
    code: &'static str,
    brand: &'static str,
    model: &'static str,
    platform: Platform,
) -> ChassisSpec {
    ChassisSpec {
        code,
        brand,
        model,
        platform,
        mass_kg: None,
        wheelbase_m: None,
        tuning: TuningOverrides {
            kp: None,
            ki: None,
            kf: None,
        },
    }
}

const fn measured(
    mut spec: ChassisSpec,
    mass_kg: f64,
    wheelbase_m: f64,
    gains: Option<(f64, f64, f64)>,
) -> ChassisSpec {
    spec.mass_kg = Some(mass_kg);
    spec.wheelbase_m = Some(wheelbase_m);
    if let Some((kp, ki, kf)) = gains {
        spec.tuning = TuningOverrides {
            kp: Some(kp),
            ki: Some(ki),
            kf: Some(kf),
        };
    }
    spec
}

// Chassis codes are not exhaustive, particularly for older cars.
const CHASSIS_TABLE: &[ChassisSpec] = &[
    chassis("8V", "Audi", "A3", Platform::Mqb),
    chassis("FF", "Audi", "A3", Platform::Mqb),
    measured(chassis("GA", "Audi", "Q2", Platform::Mqb), 1205.0, 2.60, None),
    chassis("FV", "Audi", "TT", Platform::Mqb),
    chassis("3H", "Volkswagen", "Arteon", Platform::Mqb),
    measured(
        chassis("CA", "Volkswagen", "Atlas", Platform::Mqb),
        2042.0,
        2.97,
        Some((0.5, 0.25, 0.00006)),
    ),
    chassis("5C", "Volkswagen", "Beetle", Platform::Pq35),
    measured(
        chassis("AU", "Volkswagen", "Golf", Platform::Mqb),
        1372.0,
        2.64,
        Some((0.5, 0.25, 0.00006)),
    ),
    chassis("BU", "Volkswagen", "Jetta", Platform::Mqb),
    chassis("A3", "Volkswagen", "Passat NAR", Platform::Nms),
    chassis("3G", "Volkswagen", "Passat", Platform::Mqb),
    chassis("3D", "Volkswagen", "Phaeton", Platform::Unknown),
    chassis("AW", "Volkswagen", "Polo", Platform::MqbA0),
    chassis("AD", "Volkswagen", "Tiguan", Platform::Mqb),
    chassis("5T", "Volkswagen", "Touran", Platform::Mqb),
    chassis("7P", "Volkswagen", "Touareg", Platform::Unknown),
    chassis("CR", "Volkswagen", "Touareg", Platform::MlbEvo),
    chassis("12", "Volkswagen", "Up!", Platform::MqbA0),
    chassis("KJ", "Seat", "Ibiza", Platform::MqbA0),
    chassis("KF", "Seat", "Mii", Platform::MqbA0),
    chassis("AA", "Volkswagen", "Up!/Mii/Citigo", Platform::MqbA0),
    chassis("NF", "Skoda", "Citigo", Platform::MqbA0),
    measured(
        chassis("NS", "Skoda", "Kodiaq", Platform::Mqb),
        2042.0,
        2.97,
        Some((0.5, 0.25, 0.00006)),
    ),
    measured(
        chassis("5E", "Skoda", "Octavia", Platform::Mqb),
        1360.0,
        2.69,
        Some((0.375, 0.1, 0.00006)),
    ),
    measured(
        chassis("NE", "Skoda", "Octavia", Platform::Mqb),
        1360.0,
        2.69,
        Some((0.375, 0.1, 0.00006)),
    ),
];

/// Result of decoding a VIN
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChassisRecord {
    /// Two-character chassis code (empty when the VIN was unusable)
    pub code: String,
    pub brand: String,
    pub model: String,
    pub platform: Platform,
    pub model_year: Option<u16>,
    /// True only for a known chassis on a supported platform
    pub supported: bool,
    pub mass_kg: Option<f64>,
    pub wheelbase_m: Option<f64>,
    pub tuning: LateralTuning,
}

impl ChassisRecord {
    /// Record for a VIN whose chassis is not in the table
    pub fn unsupported(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            brand: "Unsupported".to_string(),
            model: "Unsupported".to_string(),
            platform: Platform::Unknown,
            model_year: None,
            supported: false,
            mass_kg: None,
            wheelbase_m: None,
            tuning: LateralTuning::default(),
        }
    }

    /// Human readable name, e.g. "2018 Volkswagen Golf"
    pub fn display_name(&self) -> String {
        match self.model_year {
            Some(year) => format!("{} {} {}", year, self.brand, self.model),
            None => format!("{} {}", self.brand, self.model),
        }
    }

    fn from_spec(spec: &ChassisSpec, model_year: Option<u16>) -> Self {
        let tuning = LateralTuning::default()
            .apply(&spec.platform.tuning())
            .apply(&spec.tuning);
        Self {
            code: spec.code.to_string(),
            brand: spec.brand.to_string(),
            model: spec.model.to_string(),
            platform: spec.platform,
            model_year,
            supported: spec.platform.is_supported(),
            mass_kg: spec.mass_kg,
            wheelbase_m: spec.wheelbase_m,
            tuning,
        }
    }
}

// VINs skip I, O, Q, U, Z and 0; the cycle repeats every 30 years.
const MODEL_YEAR_CODES: &str = "ABCDEFGHJKLMNPRSTVWXY123456789";

/// Model year for the VIN position-10 character, within 2000-2029
pub fn model_year(code: char) -> Option<u16> {
    let index = MODEL_YEAR_CODES.find(code.to_ascii_uppercase())? as u16;
    let year = 1980 + index;
    Some(if year < 2000 { year + 30 } else { year })
}

/// Decode a VIN into chassis, model year and tuning
///
/// Unknown chassis codes and malformed VINs yield an unsupported record
/// rather than an error.
pub fn decode(vin: &str) -> ChassisRecord {
    let code = match vin.get(6..8) {
        Some(code) if vin.len() == super::VIN_LEN => code.to_ascii_uppercase(),
        _ => {
            log::warn!("Cannot decode VIN {:?}: expected 17 characters", vin);
            return ChassisRecord::unsupported("");
        }
    };
    let year = vin.chars().nth(9).and_then(model_year);

    match CHASSIS_TABLE.iter().find(|spec| spec.code == code) {
        Some(spec) => {
            let record = ChassisRecord::from_spec(spec, year);
            log::info!(
                "VIN chassis {} identified as {} ({}, {})",
                code,
                record.display_name(),
                record.platform,
                if record.supported { "supported" } else { "unsupported" }
            );
            record
        }
        None => {
            log::warn!("Unknown chassis code {} in VIN", code);
            let mut record = ChassisRecord::unsupported(code);
            record.model_year = year;
            record
        }
    }
}
