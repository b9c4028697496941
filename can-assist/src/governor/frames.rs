//! Outbound command frames
//!
//! The governor hands frames to the transport as typed field values; packing
//! them into payload bytes (including checksums) is the transport's job.

use crate::types::Bus;
use serde::{Deserialize, Serialize};

/// Heading control assist command
pub const HCA_01: u32 = 0x126;
/// Lane departure warning HUD
pub const LDW_02: u32 = 0x397;
/// Cruise control stalk buttons
pub const GRA_ACC_01: u32 = 0x12B;

/// Rolling counters are 4 bits wide
pub const COUNTER_MODULO: u8 = 16;

/// Steering torque request to the rack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SteeringCommand {
    pub bus: Bus,
    /// Rolling index, advances once per steering message
    pub counter: u8,
    /// Absolute torque in rack units
    pub torque: u16,
    /// Torque direction, true for negative (right)
    pub negative: bool,
    pub assist_requested: bool,
    pub standby: bool,
    pub active: bool,
}

impl SteeringCommand {
    /// Rack reports HCA as available; always set
    pub const HCA_AVAILABLE: i64 = 1;
    pub const CONST_03: i64 = 0x03;
    pub const CONST_FE: i64 = 0xFE;
    pub const CONST_07: i64 = 0x07;

    /// Build from a signed torque
    pub fn new(bus: Bus, counter: u8, torque: i32, active: bool) -> Self {
        Self {
            bus,
            counter: counter % COUNTER_MODULO,
            torque: torque.unsigned_abs().min(u32::from(u16::MAX)) as u16,
            negative: torque < 0,
            assist_requested: active,
            standby: !active,
            active,
        }
    }

    /// Torque with its sign applied
    pub fn signed_torque(&self) -> i32 {
        let magnitude = i32::from(self.torque);
        if self.negative {
            -magnitude
        } else {
            magnitude
        }
    }
}

/// Lane status shown for one side of the lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LaneStatus {
    /// Not detected
    NotVisible,
    /// Detected, assist not available
    Visible,
    /// Detected and assist active
    Active,
}

impl LaneStatus {
    /// Cluster code
    pub fn code(&self) -> i64 {
        match self {
            LaneStatus::NotVisible => 1,
            LaneStatus::Visible => 2,
            LaneStatus::Active => 3,
        }
    }
}

/// Lane assist HUD state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HudCommand {
    pub bus: Bus,
    /// Alert code (see [`super::hud::AlertClass::code`])
    pub alert: u8,
    pub left_lane: LaneStatus,
    pub right_lane: LaneStatus,
    pub lamp_green: bool,
    pub lamp_orange: bool,
}

impl HudCommand {
    /// Required by the cluster
    pub const LDW_UNKNOWN: i64 = 2;
}

/// Cruise stalk buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CruiseButtons {
    pub resume: bool,
    pub set: bool,
    pub cancel: bool,
    pub accel: bool,
    pub decel: bool,
    pub gap_adjust: bool,
}

/// A single virtual button press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VirtualButton {
    Resume,
    Set,
    Cancel,
    Accel,
    Decel,
    GapAdjust,
}

impl CruiseButtons {
    /// Copy with one button held down
    pub fn pressed(mut self, button: VirtualButton) -> Self {
        match button {
            VirtualButton::Resume => self.resume = true,
            VirtualButton::Set => self.set = true,
            VirtualButton::Cancel => self.cancel = true,
            VirtualButton::Accel => self.accel = true,
            VirtualButton::Decel => self.decel = true,
            VirtualButton::GapAdjust => self.gap_adjust = true,
        }
        self
    }

    pub fn any(&self) -> bool {
        self.resume || self.set || self.cancel || self.accel || self.decel || self.gap_adjust
    }
}

/// Cruise stalk frame as seen from, or sent in place of, the vehicle
///
/// Fields besides the buttons are vehicle-specific and passed through
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CruiseButtonFrame {
    pub counter: u8,
    pub buttons: CruiseButtons,
    pub main_switch: bool,
    pub main_switch_type: u8,
    pub tip_stage_2: bool,
    pub button_type_info: u8,
    pub coding: u8,
}

impl Default for CruiseButtonFrame {
    fn default() -> Self {
        Self {
            counter: 0,
            buttons: CruiseButtons::default(),
            main_switch: true,
            main_switch_type: 0,
            tip_stage_2: false,
            button_type_info: 0,
            coding: 2,
        }
    }
}

/// Injected cruise stalk frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ButtonCommand {
    pub bus: Bus,
    pub frame: CruiseButtonFrame,
}

/// A command frame the governor wants transmitted this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutboundFrame {
    Steering(SteeringCommand),
    Hud(HudCommand),
    Buttons(ButtonCommand),
}

impl OutboundFrame {
    /// CAN address of the message
    pub fn address(&self) -> u32 {
        match self {
            OutboundFrame::Steering(_) => HCA_01,
            OutboundFrame::Hud(_) => LDW_02,
            OutboundFrame::Buttons(_) => GRA_ACC_01,
        }
    }

    /// Message name
    pub fn name(&self) -> &'static str {
        match self {
            OutboundFrame::Steering(_) => "HCA_01",
            OutboundFrame::Hud(_) => "LDW_02",
            OutboundFrame::Buttons(_) => "GRA_ACC_01",
        }
    }

    /// Bus to transmit on
    pub fn bus(&self) -> Bus {
        match self {
            OutboundFrame::Steering(cmd) => cmd.bus,
            OutboundFrame::Hud(cmd) => cmd.bus,
            OutboundFrame::Buttons(cmd) => cmd.bus,
        }
    }

    /// Named field values, in transport signal order
    pub fn fields(&self) -> Vec<(&'static str, i64)> {
        match self {
            OutboundFrame::Steering(cmd) => vec![
                ("counter", i64::from(cmd.counter)),
                ("assist_torque", i64::from(cmd.torque)),
                ("assist_sign", i64::from(cmd.negative)),
                ("assist_requested", i64::from(cmd.assist_requested)),
                ("hca_available", SteeringCommand::HCA_AVAILABLE),
                ("hca_standby", i64::from(cmd.standby)),
                ("hca_active", i64::from(cmd.active)),
                ("const_03", SteeringCommand::CONST_03),
                ("const_fe", SteeringCommand::CONST_FE),
                ("const_07", SteeringCommand::CONST_07),
            ],
            OutboundFrame::Hud(cmd) => vec![
                ("alert", i64::from(cmd.alert)),
                ("left_lane", cmd.left_lane.code()),
                ("right_lane", cmd.right_lane.code()),
                ("lamp_green", i64::from(cmd.lamp_green)),
                ("lamp_orange", i64::from(cmd.lamp_orange)),
                ("ldw_unknown", HudCommand::LDW_UNKNOWN),
            ],
            OutboundFrame::Buttons(cmd) => {
                let f = &cmd.frame;
                vec![
                    ("counter", i64::from(f.counter)),
                    ("main_switch", i64::from(f.main_switch)),
                    ("cancel", i64::from(f.buttons.cancel)),
                    ("set", i64::from(f.buttons.set)),
                    ("resume", i64::from(f.buttons.resume)),
                    ("accel", i64::from(f.buttons.accel)),
                    ("decel", i64::from(f.buttons.decel)),
                    ("gap_adjust", i64::from(f.buttons.gap_adjust)),
                    ("main_switch_type", i64::from(f.main_switch_type)),
                    ("tip_stage_2", i64::from(f.tip_stage_2)),
                    ("button_type_info", i64::from(f.button_type_info)),
                    ("coding", i64::from(f.coding)),
                ]
            }
        }
    }

    /// Look up a single field value
    pub fn field(&self, name: &str) -> Option<i64> {
        self.fields()
            .into_iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steering_command_sign() {
        let cmd = SteeringCommand::new(0, 17, -150, true);
        assert_eq!(cmd.counter, 1);
        assert_eq!(cmd.torque, 150);
        assert!(cmd.negative);
        assert_eq!(cmd.signed_torque(), -150);

        let frame = OutboundFrame::Steering(cmd);
        assert_eq!(frame.address(), 0x126);
        assert_eq!(frame.field("assist_sign"), Some(1));
        assert_eq!(frame.field("hca_standby"), Some(0));
        assert_eq!(frame.field("const_fe"), Some(0xFE));
    }

    #[test]
    fn test_inactive_steering_is_standby() {
        let frame = OutboundFrame::Steering(SteeringCommand::new(0, 3, 0, false));
        assert_eq!(frame.field("hca_standby"), Some(1));
        assert_eq!(frame.field("hca_active"), Some(0));
        assert_eq!(frame.field("assist_requested"), Some(0));
        assert_eq!(frame.field("hca_available"), Some(1));
    }

    #[test]
    fn test_button_fields_pass_through() {
        let vehicle = CruiseButtonFrame {
            counter: 4,
            main_switch_type: 1,
            button_type_info: 3,
            ..CruiseButtonFrame::default()
        };
        let injected = CruiseButtonFrame {
            counter: 5,
            buttons: vehicle.buttons.pressed(VirtualButton::Resume),
            ..vehicle
        };
        let frame = OutboundFrame::Buttons(ButtonCommand {
            bus: 2,
            frame: injected,
        });

        assert_eq!(frame.bus(), 2);
        assert_eq!(frame.name(), "GRA_ACC_01");
        assert_eq!(frame.field("resume"), Some(1));
        assert_eq!(frame.field("cancel"), Some(0));
        assert_eq!(frame.field("main_switch_type"), Some(1));
        assert_eq!(frame.field("coding"), Some(2));
        assert_eq!(frame.field("missing"), None);
    }
}
