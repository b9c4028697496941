//! Configuration types
//!
//! Every timing and limit constant used by the fingerprint engine and the
//! command governor lives here as a per-vehicle tunable. Both structs
//! deserialize from partial TOML: any field left out keeps its default.

use crate::types::{AssistError, Bus, Result};
use serde::{Deserialize, Serialize};

/// Bus routing for outbound command frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusLayout {
    /// Bus facing the gateway (steering rack, instrument cluster)
    #[serde(default)]
    pub powertrain: Bus,
    /// Bus facing the driver-assistance ECUs (ACC radar, camera)
    #[serde(default = "default_extended_bus")]
    pub extended: Bus,
}

impl Default for BusLayout {
    fn default() -> Self {
        Self {
            powertrain: 0,
            extended: default_extended_bus(),
        }
    }
}

fn default_extended_bus() -> Bus {
    2
}

/// Tunables for the per-tick command governor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Control ticks between steering messages (2 = 50Hz at a 100Hz tick)
    #[serde(default = "default_steer_step")]
    pub steer_step: u64,

    /// Control ticks between HUD messages
    #[serde(default = "default_hud_step")]
    pub hud_step: u64,

    /// Maximum assist torque in rack units (300 = 3.00 Nm)
    #[serde(default = "default_steer_max")]
    pub steer_max: i32,

    /// Largest per-message increase of torque magnitude
    #[serde(default = "default_steer_delta_up")]
    pub steer_delta_up: i32,

    /// Largest per-message decrease of torque magnitude
    #[serde(default = "default_steer_delta_down")]
    pub steer_delta_down: i32,

    /// Driver torque above which the driver counts as overriding
    #[serde(default = "default_driver_torque_allowance")]
    pub driver_torque_allowance: i32,

    /// Fraction of `steer_max` allowed while the driver overrides
    #[serde(default = "default_driver_override_fraction")]
    pub driver_override_fraction: f64,

    /// Steering messages an identical nonzero torque may repeat before it is nudged
    #[serde(default = "default_stale_torque_sends")]
    pub stale_torque_sends: u32,

    /// Steering messages of continuous nonzero torque before a forced disengage
    #[serde(default = "default_max_nonzero_sends")]
    pub max_nonzero_sends: u32,

    /// Injected button frames per trigger
    #[serde(default = "default_button_burst_len")]
    pub button_burst_len: u32,

    /// Control ticks to wait after a burst before resume may trigger again
    #[serde(default = "default_resume_cooldown_ticks")]
    pub resume_cooldown_ticks: u64,

    /// Output bus routing
    #[serde(default)]
    pub buses: BusLayout,
}

fn default_steer_step() -> u64 {
    2
}

fn default_hud_step() -> u64 {
    10
}

fn default_steer_max() -> i32 {
    300
}

fn default_steer_delta_up() -> i32 {
    16
}

fn default_steer_delta_down() -> i32 {
    32
}

fn default_driver_torque_allowance() -> i32 {
    100
}

fn default_driver_override_fraction() -> f64 {
    1.0 / 3.0
}

fn default_stale_torque_sends() -> u32 {
    95
}

fn default_max_nonzero_sends() -> u32 {
    5900
}

fn default_button_burst_len() -> u32 {
    16
}

fn default_resume_cooldown_ticks() -> u64 {
    100
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            steer_step: default_steer_step(),
            hud_step: default_hud_step(),
            steer_max: default_steer_max(),
            steer_delta_up: default_steer_delta_up(),
            steer_delta_down: default_steer_delta_down(),
            driver_torque_allowance: default_driver_torque_allowance(),
            driver_override_fraction: default_driver_override_fraction(),
            stale_torque_sends: default_stale_torque_sends(),
            max_nonzero_sends: default_max_nonzero_sends(),
            button_burst_len: default_button_burst_len(),
            resume_cooldown_ticks: default_resume_cooldown_ticks(),
            buses: BusLayout::default(),
        }
    }
}

impl GovernorConfig {
    /// Create a governor configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the slew limits
    pub fn with_slew_limits(mut self, up: i32, down: i32) -> Self {
        self.steer_delta_up = up;
        self.steer_delta_down = down;
        self
    }

    /// Builder method: set the maximum torque
    pub fn with_steer_max(mut self, steer_max: i32) -> Self {
        self.steer_max = steer_max;
        self
    }

    /// Builder method: set the staleness threshold in steering messages
    pub fn with_stale_torque_sends(mut self, sends: u32) -> Self {
        self.stale_torque_sends = sends;
        self
    }

    /// Builder method: set the sustained-engagement threshold in steering messages
    pub fn with_max_nonzero_sends(mut self, sends: u32) -> Self {
        self.max_nonzero_sends = sends;
        self
    }

    /// Builder method: set the button burst length
    pub fn with_button_burst_len(mut self, frames: u32) -> Self {
        self.button_burst_len = frames;
        self
    }

    /// Builder method: set the resume cooldown
    pub fn with_resume_cooldown_ticks(mut self, ticks: u64) -> Self {
        self.resume_cooldown_ticks = ticks;
        self
    }

    /// Steering messages per second at the given control tick rate
    pub fn steer_rate_hz(&self, tick_hz: u64) -> u64 {
        tick_hz / self.steer_step.max(1)
    }

    /// Convert a wall-time duration into steering-message counts
    pub fn sends_for_seconds(&self, tick_hz: u64, seconds: f64) -> u32 {
        (self.steer_rate_hz(tick_hz) as f64 * seconds).round() as u32
    }

    /// Reject configurations the governor cannot run safely with
    pub fn validate(&self) -> Result<()> {
        if self.steer_step == 0 || self.hud_step == 0 {
            return Err(AssistError::InvalidConfig(
                "message steps must be at least one tick".to_string(),
            ));
        }
        if self.steer_max <= 0 {
            return Err(AssistError::InvalidConfig(format!(
                "steer_max must be positive, got {}",
                self.steer_max
            )));
        }
        if self.steer_delta_up <= 0 || self.steer_delta_down <= 0 {
            return Err(AssistError::InvalidConfig(format!(
                "slew limits must be positive, got up={} down={}",
                self.steer_delta_up, self.steer_delta_down
            )));
        }
        if !(0.0..=1.0).contains(&self.driver_override_fraction) {
            return Err(AssistError::InvalidConfig(format!(
                "driver_override_fraction must be within 0..=1, got {}",
                self.driver_override_fraction
            )));
        }
        if self.stale_torque_sends == 0 || self.max_nonzero_sends == 0 {
            return Err(AssistError::InvalidConfig(
                "fault-avoidance thresholds must be nonzero".to_string(),
            ));
        }
        if self.button_burst_len == 0 {
            return Err(AssistError::InvalidConfig(
                "button_burst_len must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tunables for the fingerprint engine
///
/// All windows are counted in receive cycles; one cycle is one batch of
/// frames handed over by the transport (100 per second).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// Receive cycles per second
    #[serde(default = "default_cycles_per_second")]
    pub cycles_per_second: u32,

    /// Cycles after the first frame before giving up
    #[serde(default = "default_timeout_cycles")]
    pub timeout_cycles: u32,

    /// Settle time for brands whose ECUs broadcast promptly
    #[serde(default = "default_settle_cycles")]
    pub settle_cycles: u32,

    /// Settle time for brands with an auxiliary ECU that broadcasts late
    #[serde(default = "default_late_settle_cycles")]
    pub late_settle_cycles: u32,

    /// Bus whose traffic is always fingerprinted
    #[serde(default)]
    pub primary_bus: Bus,

    /// Bus fingerprinted only once a single late-broadcasting brand remains
    #[serde(default = "default_secondary_bus")]
    pub secondary_bus: Bus,

    /// Diagnostic response address carrying the VIN
    #[serde(default = "default_vin_response_address")]
    pub vin_response_address: u32,

    /// Passive VIN broadcast address
    #[serde(default = "default_vin_broadcast_address")]
    pub vin_broadcast_address: u32,

    /// Diagnostic addresses that never take part in a fingerprint
    #[serde(default = "default_ignored_addresses")]
    pub ignored_addresses: Vec<u32>,
}

fn default_cycles_per_second() -> u32 {
    100
}

fn default_timeout_cycles() -> u32 {
    200
}

fn default_settle_cycles() -> u32 {
    10
}

fn default_late_settle_cycles() -> u32 {
    100
}

fn default_secondary_bus() -> Bus {
    2
}

fn default_vin_response_address() -> u32 {
    0x7E8
}

fn default_vin_broadcast_address() -> u32 {
    0x6B4
}

fn default_ignored_addresses() -> Vec<u32> {
    vec![0x7E8]
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            cycles_per_second: default_cycles_per_second(),
            timeout_cycles: default_timeout_cycles(),
            settle_cycles: default_settle_cycles(),
            late_settle_cycles: default_late_settle_cycles(),
            primary_bus: 0,
            secondary_bus: default_secondary_bus(),
            vin_response_address: default_vin_response_address(),
            vin_broadcast_address: default_vin_broadcast_address(),
            ignored_addresses: default_ignored_addresses(),
        }
    }
}

impl FingerprintConfig {
    /// Create a fingerprint configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the overall timeout
    pub fn with_timeout_cycles(mut self, cycles: u32) -> Self {
        self.timeout_cycles = cycles;
        self
    }

    /// Builder method: set both settle windows
    pub fn with_settle_cycles(mut self, normal: u32, late: u32) -> Self {
        self.settle_cycles = normal;
        self.late_settle_cycles = late;
        self
    }

    /// Check if an address takes part in fingerprinting
    pub fn should_fingerprint_address(&self, address: u32) -> bool {
        address < crate::types::STANDARD_ID_LIMIT && !self.ignored_addresses.contains(&address)
    }
}
