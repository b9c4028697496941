//! Steering torque limiting and rack fault avoidance
//!
//! The rack faults on a torque request that does not change for too long
//! (~2 s), and on continuous assist for too long (~2-3 min). Both are
//! avoided here: the first by nudging a stuck value one unit toward zero,
//! the second by forcing one disabled message before the rack's limit.

use super::VehicleSignals;
use crate::config::GovernorConfig;

/// Torque state carried from one steering message to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SteeringCommandState {
    /// Torque sent in the last steering message
    pub apply_torque_last: i32,
    /// Consecutive messages that repeated the same nonzero torque
    pub same_torque_sends: u32,
    /// Consecutive messages with nonzero torque
    pub nonzero_sends: u32,
    /// Consecutive messages with assist enabled
    pub enabled_sends: u32,
}

/// Torque and assist flag for one steering message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteeringOutput {
    pub torque: i32,
    pub active: bool,
}

impl SteeringOutput {
    const HOLD: Self = Self {
        torque: 0,
        active: false,
    };
}

/// Clamp a torque request against the previous one
///
/// Magnitude may grow by at most `up` and shrink by at most `down` per
/// message; a sign change counts as shrinking first.
pub fn apply_std_steer_torque_limits(
    apply_torque: i32,
    apply_torque_last: i32,
    steer_max: i32,
    up: i32,
    down: i32,
) -> i32 {
    let apply_torque = apply_torque.clamp(-steer_max, steer_max);
    if apply_torque_last > 0 {
        apply_torque.clamp(
            (apply_torque_last - down).max(-up),
            (apply_torque_last + up).min(steer_max),
        )
    } else {
        apply_torque.clamp(
            (apply_torque_last - up).max(-steer_max),
            (apply_torque_last + down).min(up),
        )
    }
}

/// Rate limiter plus fault-avoidance counters for one control session
#[derive(Debug, Clone)]
pub struct SteeringLimiter {
    config: GovernorConfig,
    state: SteeringCommandState,
}

impl SteeringLimiter {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            state: SteeringCommandState::default(),
        }
    }

    pub fn state(&self) -> &SteeringCommandState {
        &self.state
    }

    /// Torque for the next steering message
    pub fn update(
        &mut self,
        enabled: bool,
        signals: &VehicleSignals,
        desired_steer: f64,
    ) -> SteeringOutput {
        if !enabled || signals.standstill || signals.transient_fault() {
            self.state = SteeringCommandState::default();
            return SteeringOutput::HOLD;
        }
        self.state.enabled_sends = self.state.enabled_sends.saturating_add(1);

        let cfg = &self.config;
        let desired = if desired_steer.is_finite() {
            desired_steer.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let mut new_torque = (desired * f64::from(cfg.steer_max)).round() as i32;

        if signals.driver_steering(cfg.driver_torque_allowance) {
            let limit = (f64::from(cfg.steer_max) * cfg.driver_override_fraction).round() as i32;
            new_torque = new_torque.clamp(-limit, limit);
        }

        let last = self.state.apply_torque_last;
        let mut apply_torque = apply_std_steer_torque_limits(
            new_torque,
            last,
            cfg.steer_max,
            cfg.steer_delta_up,
            cfg.steer_delta_down,
        );

        if apply_torque != 0 && apply_torque == last {
            self.state.same_torque_sends += 1;
            if self.state.same_torque_sends > cfg.stale_torque_sends {
                apply_torque -= apply_torque.signum();
                self.state.same_torque_sends = 0;
                log::debug!(
                    "Torque {} unchanged for {} messages, nudging to {}",
                    last,
                    cfg.stale_torque_sends,
                    apply_torque
                );
            }
        } else {
            self.state.same_torque_sends = 0;
        }

        let mut active = true;
        if apply_torque != 0 {
            self.state.nonzero_sends += 1;
            if self.state.nonzero_sends >= cfg.max_nonzero_sends {
                log::info!(
                    "Assist continuous for {} messages, forcing one disabled message",
                    self.state.nonzero_sends
                );
                apply_torque = 0;
                active = false;
                self.state.nonzero_sends = 0;
                self.state.same_torque_sends = 0;
            }
        } else {
            self.state.nonzero_sends = 0;
        }

        if apply_torque == 0 {
            active = false;
        }

        self.state.apply_torque_last = apply_torque;
        SteeringOutput {
            torque: apply_torque,
            active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> SteeringLimiter {
        SteeringLimiter::new(GovernorConfig::default())
    }

    #[test]
    fn test_torque_limits_ramp_up() {
        assert_eq!(apply_std_steer_torque_limits(300, 0, 300, 16, 32), 16);
        assert_eq!(apply_std_steer_torque_limits(300, 290, 300, 16, 32), 300);
        assert_eq!(apply_std_steer_torque_limits(-300, 0, 300, 16, 32), -16);
    }

    #[test]
    fn test_torque_limits_ramp_down_and_cross() {
        assert_eq!(apply_std_steer_torque_limits(0, 100, 300, 16, 32), 68);
        assert_eq!(apply_std_steer_torque_limits(-300, 20, 300, 16, 32), -12);
        assert_eq!(apply_std_steer_torque_limits(0, -100, 300, 16, 32), -68);
        assert_eq!(apply_std_steer_torque_limits(300, -20, 300, 16, 32), 12);
    }

    #[test]
    fn test_hold_resets_everything() {
        let mut limiter = limiter();
        let signals = VehicleSignals::default();
        for _ in 0..5 {
            limiter.update(true, &signals, 0.5);
        }
        assert_eq!(limiter.state().apply_torque_last, 80);
        assert_eq!(limiter.state().enabled_sends, 5);

        let stopped = VehicleSignals {
            standstill: true,
            ..VehicleSignals::default()
        };
        let out = limiter.update(true, &stopped, 0.5);
        assert_eq!(out, SteeringOutput::HOLD);
        assert_eq!(*limiter.state(), SteeringCommandState::default());
    }

    #[test]
    fn test_faults_hold() {
        let mut limiter = limiter();
        let faulted = VehicleSignals {
            steer_fault: true,
            ..VehicleSignals::default()
        };
        assert_eq!(limiter.update(true, &faulted, 1.0), SteeringOutput::HOLD);

        let acc = VehicleSignals {
            acc_fault: true,
            ..VehicleSignals::default()
        };
        assert_eq!(limiter.update(true, &acc, 1.0), SteeringOutput::HOLD);
    }

    #[test]
    fn test_zero_request_is_inactive() {
        let mut limiter = limiter();
        let out = limiter.update(true, &VehicleSignals::default(), 0.0);
        assert_eq!(out.torque, 0);
        assert!(!out.active);
        assert_eq!(limiter.state().enabled_sends, 1);
    }

    #[test]
    fn test_driver_override_clamps() {
        let mut limiter = limiter();
        let overriding = VehicleSignals {
            driver_torque: -150,
            ..VehicleSignals::default()
        };
        let mut out = SteeringOutput::HOLD;
        for _ in 0..40 {
            out = limiter.update(true, &overriding, 1.0);
        }
        assert_eq!(out.torque, 100);
        assert!(out.active);
    }

    #[test]
    fn test_driver_override_at_torque_extreme() {
        let mut limiter = limiter();
        let overriding = VehicleSignals {
            driver_torque: i32::MIN,
            ..VehicleSignals::default()
        };
        let mut out = SteeringOutput::HOLD;
        for _ in 0..40 {
            out = limiter.update(true, &overriding, -1.0);
        }
        assert_eq!(out.torque, -100);
    }

    #[test]
    fn test_stale_torque_is_nudged() {
        let mut limiter = limiter();
        let signals = VehicleSignals::default();
        let torques: Vec<i32> = (0..300)
            .map(|_| limiter.update(true, &signals, 0.5).torque)
            .collect();

        // Ramp 16..144 then 150
        assert_eq!(torques[9], 150);
        let first_nudge = torques.iter().position(|t| *t == 149).unwrap();
        // 150 sent once, then repeated 95 times
        assert_eq!(first_nudge, 9 + 96);
        assert_eq!(torques[first_nudge + 1], 150);
    }

    #[test]
    fn test_nonzero_forced_disable() {
        let config = GovernorConfig::default().with_max_nonzero_sends(50);
        let mut limiter = SteeringLimiter::new(config);
        let signals = VehicleSignals::default();

        let outputs: Vec<SteeringOutput> = (0..120)
            .map(|_| limiter.update(true, &signals, -0.2))
            .collect();
        assert!(outputs[..49].iter().all(|o| o.active && o.torque != 0));
        assert_eq!(outputs[49], SteeringOutput::HOLD);
        assert!(outputs[50].active);
        assert_eq!(outputs[50].torque, -16);
        assert_eq!(outputs[99], SteeringOutput::HOLD);
    }

    #[test]
    fn test_non_finite_request() {
        let mut limiter = limiter();
        let out = limiter.update(true, &VehicleSignals::default(), f64::NAN);
        assert_eq!(out.torque, 0);
    }
}
