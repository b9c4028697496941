//! Configuration loading and parsing
//!
//! Two TOML files feed the CLI: an optional fingerprint configuration for
//! `identify`, and a scenario for `simulate`. A scenario is a list of phases,
//! each holding the control inputs and vehicle signals for a number of ticks.

use anyhow::{bail, Context, Result};
use can_assist::governor::{CruiseButtonFrame, HudRequest, VehicleSignals};
use can_assist::{FingerprintConfig, GovernorConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Governor simulation scenario (loaded from scenario.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    /// Governor tunables; missing fields keep their defaults
    #[serde(default)]
    pub governor: GovernorConfig,
    /// Control ticks per second
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u64,
    pub phases: Vec<PhaseConfig>,
}

fn default_tick_hz() -> u64 {
    100
}

/// Inputs held constant for a run of ticks
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhaseConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub ticks: u64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub desired_steer: f64,
    #[serde(default)]
    pub signals: VehicleSignals,
    #[serde(default)]
    pub hud: HudRequest,
    /// Ticks between rolling-counter steps of the car's own stalk frame;
    /// without it the car sends no stalk frame in this phase
    #[serde(default)]
    pub button_period: Option<u64>,
}

impl PhaseConfig {
    /// Display name, falling back to the phase index
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("phase {}", index + 1))
    }

    /// Stalk frame template for this phase
    pub fn stalk_frame(&self) -> CruiseButtonFrame {
        self.signals.buttons.unwrap_or_default()
    }
}

impl ScenarioConfig {
    /// Total ticks across all phases
    pub fn total_ticks(&self) -> u64 {
        self.phases.iter().map(|p| p.ticks).sum()
    }
}

/// Load a simulation scenario from a TOML file
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {:?}", path))?;

    let scenario: ScenarioConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file: {:?}", path))?;

    validate_scenario(&scenario).with_context(|| format!("Invalid scenario: {:?}", path))?;
    Ok(scenario)
}

fn validate_scenario(scenario: &ScenarioConfig) -> Result<()> {
    scenario.governor.validate()?;
    if scenario.tick_hz == 0 {
        bail!("tick_hz must be positive");
    }
    if scenario.phases.is_empty() {
        bail!("scenario has no phases");
    }
    for (idx, phase) in scenario.phases.iter().enumerate() {
        if phase.button_period == Some(0) {
            bail!("{}: button_period must be positive", phase.label(idx));
        }
        if !phase.desired_steer.is_finite() {
            bail!("{}: desired_steer must be finite", phase.label(idx));
        }
    }
    Ok(())
}

/// Load fingerprint settings from a TOML file
pub fn load_fingerprint_config(path: &Path) -> Result<FingerprintConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
}
