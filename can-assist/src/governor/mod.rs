//! Per-tick command governor
//!
//! Turns the control layer's enable flag and desired steering fraction into
//! the command frames for one control tick. Each message family runs on its
//! own schedule against the tick index:
//!
//! - `HCA_01` steering every `steer_step` ticks, through [`steering`]
//! - `LDW_02` HUD every `hud_step` ticks, through [`hud`]
//! - `GRA_ACC_01` buttons whenever the car's own stalk frame counter moves,
//!   through [`buttons`]

pub mod buttons;
pub mod frames;
pub mod hud;
pub mod steering;

pub use buttons::{ButtonInjector, ButtonSpamSession, ButtonTriggers};
pub use frames::{
    ButtonCommand, CruiseButtonFrame, CruiseButtons, HudCommand, OutboundFrame, SteeringCommand,
    VirtualButton,
};
pub use hud::{AlertClass, AudibleAlert, HudRequest};
pub use steering::{SteeringCommandState, SteeringLimiter, SteeringOutput};

use crate::config::GovernorConfig;
use crate::types::Result;
use frames::COUNTER_MODULO;
use serde::{Deserialize, Serialize};

/// Decoded vehicle state for the current tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSignals {
    /// Vehicle is stopped
    pub standstill: bool,
    /// Steering rack reports an HCA fault
    pub steer_fault: bool,
    /// ACC radar reports a fault
    pub acc_fault: bool,
    /// An ECU reports a health fault
    pub ecu_fault: bool,
    /// Driver input torque in rack units
    pub driver_torque: i32,
    /// Factory cruise control is engaged
    pub cruise_active: bool,
    /// Last stalk frame received from the car
    pub buttons: Option<CruiseButtonFrame>,
}

impl VehicleSignals {
    /// Any fault that must hold the governor in its safe state
    pub fn transient_fault(&self) -> bool {
        self.steer_fault || self.acc_fault || self.ecu_fault
    }

    /// True if the driver's own torque exceeds `allowance`
    pub fn driver_steering(&self, allowance: i32) -> bool {
        self.driver_torque.unsigned_abs() > allowance.max(0).unsigned_abs()
    }
}

/// Command governor for one control session
#[derive(Debug, Clone)]
pub struct CommandGovernor {
    config: GovernorConfig,
    steering: SteeringLimiter,
    buttons: ButtonInjector,
    was_enabled: bool,
}

impl CommandGovernor {
    /// Create a governor, rejecting unusable tunables
    pub fn new(config: GovernorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            steering: SteeringLimiter::new(config.clone()),
            buttons: ButtonInjector::new(
                config.buses.extended,
                config.button_burst_len,
                config.resume_cooldown_ticks,
            ),
            config,
            was_enabled: false,
        })
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn steering_state(&self) -> &SteeringCommandState {
        self.steering.state()
    }

    pub fn button_session(&self) -> &ButtonSpamSession {
        self.buttons.session()
    }

    /// Frames for one control tick, without HUD alerts
    pub fn tick(
        &mut self,
        enabled: bool,
        signals: &VehicleSignals,
        desired_steer: f64,
        tick_index: u64,
    ) -> Vec<OutboundFrame> {
        self.tick_with_hud(enabled, signals, desired_steer, &HudRequest::default(), tick_index)
    }

    /// Frames for one control tick
    pub fn tick_with_hud(
        &mut self,
        enabled: bool,
        signals: &VehicleSignals,
        desired_steer: f64,
        hud: &HudRequest,
        tick_index: u64,
    ) -> Vec<OutboundFrame> {
        let cfg = &self.config;
        let mut frames = Vec::with_capacity(3);

        if tick_index % cfg.steer_step == 0 {
            let output = self.steering.update(enabled, signals, desired_steer);
            let counter = ((tick_index / cfg.steer_step) % u64::from(COUNTER_MODULO)) as u8;
            frames.push(OutboundFrame::Steering(SteeringCommand::new(
                cfg.buses.powertrain,
                counter,
                output.torque,
                output.active,
            )));
        }

        if tick_index % cfg.hud_step == 0 {
            let assist_active = enabled && !signals.standstill && !signals.transient_fault();
            let driver_steering = signals.driver_steering(cfg.driver_torque_allowance);
            frames.push(OutboundFrame::Hud(hud::hud_command(
                cfg.buses.powertrain,
                assist_active,
                driver_steering,
                hud,
            )));
        }

        let triggers = ButtonTriggers {
            resume: enabled && signals.standstill,
            cancel: self.was_enabled && !enabled && signals.cruise_active,
        };
        frames.extend(
            self.buttons
                .observe(tick_index, signals.buttons.as_ref(), triggers),
        );

        self.was_enabled = enabled;
        frames
    }
}
