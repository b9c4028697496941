//! Lane assist HUD state

use super::frames::{HudCommand, LaneStatus};
use crate::types::Bus;
use serde::{Deserialize, Serialize};

/// Audible alert requested by the control layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudibleAlert {
    Chime,
    Urgent,
}

/// HUD alert class, ordered by precedence (lowest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AlertClass {
    None,
    Silent,
    Chime,
    Urgent,
}

impl AlertClass {
    /// Cluster alert code
    pub fn code(&self) -> u8 {
        match self {
            AlertClass::None => 0,
            AlertClass::Urgent => 6,
            AlertClass::Chime => 7,
            AlertClass::Silent => 8,
        }
    }
}

/// What the control layer wants shown this tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HudRequest {
    /// Driver must take over steering
    pub steer_required: bool,
    /// Audible alerts requested alongside
    pub audible: Vec<AudibleAlert>,
    pub left_lane_visible: bool,
    pub right_lane_visible: bool,
}

impl HudRequest {
    /// Highest-precedence alert class among the requests
    pub fn alert_class(&self) -> AlertClass {
        if !self.steer_required {
            return AlertClass::None;
        }
        self.audible
            .iter()
            .map(|alert| match alert {
                AudibleAlert::Chime => AlertClass::Chime,
                AudibleAlert::Urgent => AlertClass::Urgent,
            })
            .max()
            .unwrap_or(AlertClass::Silent)
    }
}

fn lane_status(assist_active: bool, visible: bool) -> LaneStatus {
    match (visible, assist_active) {
        (false, _) => LaneStatus::NotVisible,
        (true, true) => LaneStatus::Active,
        (true, false) => LaneStatus::Visible,
    }
}

/// HUD command for the current assist state
pub fn hud_command(
    bus: Bus,
    assist_active: bool,
    driver_steering: bool,
    request: &HudRequest,
) -> HudCommand {
    HudCommand {
        bus,
        alert: request.alert_class().code(),
        left_lane: lane_status(assist_active, request.left_lane_visible),
        right_lane: lane_status(assist_active, request.right_lane_visible),
        lamp_green: assist_active && !driver_steering,
        lamp_orange: assist_active && driver_steering,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_precedence() {
        let mut request = HudRequest {
            steer_required: true,
            ..HudRequest::default()
        };
        assert_eq!(request.alert_class(), AlertClass::Silent);

        request.audible = vec![AudibleAlert::Chime];
        assert_eq!(request.alert_class(), AlertClass::Chime);

        request.audible = vec![AudibleAlert::Chime, AudibleAlert::Urgent, AudibleAlert::Chime];
        assert_eq!(request.alert_class(), AlertClass::Urgent);
        assert_eq!(request.alert_class().code(), 6);

        request.steer_required = false;
        assert_eq!(request.alert_class(), AlertClass::None);
        assert!(AlertClass::Urgent > AlertClass::Chime);
        assert!(AlertClass::Silent > AlertClass::None);
    }

    #[test]
    fn test_lane_and_lamp_state() {
        let request = HudRequest {
            left_lane_visible: true,
            ..HudRequest::default()
        };

        let active = hud_command(0, true, false, &request);
        assert_eq!(active.left_lane, LaneStatus::Active);
        assert_eq!(active.right_lane, LaneStatus::NotVisible);
        assert!(active.lamp_green && !active.lamp_orange);

        let overriding = hud_command(0, true, true, &request);
        assert!(!overriding.lamp_green && overriding.lamp_orange);

        let inactive = hud_command(0, false, true, &request);
        assert_eq!(inactive.left_lane, LaneStatus::Visible);
        assert!(!inactive.lamp_green && !inactive.lamp_orange);
        assert_eq!(inactive.alert, 0);
    }
}
