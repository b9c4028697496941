//! Command governor behaviour over long tick sequences

use can_assist::governor::{CruiseButtonFrame, OutboundFrame, SteeringCommand};
use can_assist::{CommandGovernor, GovernorConfig, VehicleSignals};
use proptest::prelude::*;

fn steering(frames: &[OutboundFrame]) -> Option<SteeringCommand> {
    frames.iter().find_map(|f| match f {
        OutboundFrame::Steering(cmd) => Some(*cmd),
        _ => None,
    })
}

fn buttons(frames: &[OutboundFrame]) -> Vec<CruiseButtonFrame> {
    frames
        .iter()
        .filter_map(|f| match f {
            OutboundFrame::Buttons(cmd) => Some(cmd.frame),
            _ => None,
        })
        .collect()
}

fn stopped_with_stalk(counter: u8) -> VehicleSignals {
    VehicleSignals {
        standstill: true,
        cruise_active: true,
        buttons: Some(CruiseButtonFrame {
            counter,
            ..CruiseButtonFrame::default()
        }),
        ..VehicleSignals::default()
    }
}

#[test]
fn test_constant_torque_is_nudged_periodically() {
    let mut gov = CommandGovernor::new(GovernorConfig::default()).unwrap();
    let signals = VehicleSignals::default();

    let torques: Vec<i32> = (0..800)
        .filter_map(|t| steering(&gov.tick(true, &signals, 0.5, t)))
        .map(|cmd| cmd.signed_torque())
        .collect();
    assert_eq!(torques.len(), 400);

    let nudges: Vec<usize> = torques
        .iter()
        .enumerate()
        .filter(|(i, t)| *i > 9 && **t == 149)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(nudges, vec![105, 202, 299, 396]);
    assert!(torques[10..].iter().all(|t| *t == 150 || *t == 149));
}

#[test]
fn test_resume_burst_at_standstill() {
    let mut gov = CommandGovernor::new(GovernorConfig::default()).unwrap();

    // The car's stalk counter advances every other tick, starting at 5
    let mut injected = Vec::new();
    for tick in 0..120u64 {
        let upstream = ((5 + tick / 2) % 16) as u8;
        for frame in buttons(&gov.tick(true, &stopped_with_stalk(upstream), 0.0, tick)) {
            injected.push((tick, upstream, frame));
        }
    }

    assert_eq!(injected.len(), 16);
    for (_, upstream, frame) in &injected {
        assert_eq!(frame.counter, (upstream + 1) % 16);
        assert!(frame.buttons.resume);
        assert!(!frame.buttons.cancel);
        assert_eq!(frame.coding, 2);
    }
    assert_eq!(injected.first().map(|i| i.0), Some(2));
    assert_eq!(injected.last().map(|i| i.0), Some(32));
    assert!(!gov.button_session().sending);

    // Cooldown over: the next counter change starts another burst
    let mut second = Vec::new();
    for tick in 120..200u64 {
        let upstream = ((5 + tick / 2) % 16) as u8;
        for frame in buttons(&gov.tick(true, &stopped_with_stalk(upstream), 0.0, tick)) {
            second.push((tick, frame));
        }
    }
    assert_eq!(second.len(), 16);
    assert_eq!(second.first().map(|i| i.0), Some(132));
}

#[test]
fn test_cancel_burst_on_disengage() {
    let mut gov = CommandGovernor::new(GovernorConfig::default()).unwrap();
    let signals = |counter: u8| VehicleSignals {
        cruise_active: true,
        buttons: Some(CruiseButtonFrame {
            counter,
            ..CruiseButtonFrame::default()
        }),
        ..VehicleSignals::default()
    };

    assert!(buttons(&gov.tick(true, &signals(0), 0.0, 0)).is_empty());
    let mut injected = Vec::new();
    for tick in 1..100u64 {
        let counter = (tick % 16) as u8;
        injected.extend(buttons(&gov.tick(false, &signals(counter), 0.0, tick)));
    }

    assert_eq!(injected.len(), 16);
    assert!(injected.iter().all(|f| f.buttons.cancel && !f.buttons.resume));
}

#[test]
fn test_disengage_mid_resume_burst_sends_cancel() {
    let mut gov = CommandGovernor::new(GovernorConfig::default()).unwrap();

    let mut before = Vec::new();
    for tick in 0..10u64 {
        let upstream = ((5 + tick / 2) % 16) as u8;
        before.extend(buttons(&gov.tick(true, &stopped_with_stalk(upstream), 0.0, tick)));
    }
    assert_eq!(before.len(), 4);
    assert!(before.iter().all(|f| f.buttons.resume));

    // Assist drops out with cruise still engaged
    let mut after = Vec::new();
    for tick in 10..200u64 {
        let upstream = ((5 + tick / 2) % 16) as u8;
        for frame in buttons(&gov.tick(false, &stopped_with_stalk(upstream), 0.0, tick)) {
            after.push((tick, upstream, frame));
        }
    }

    assert_eq!(after.len(), 16);
    for (_, upstream, frame) in &after {
        assert!(frame.buttons.cancel);
        assert!(!frame.buttons.resume);
        assert_eq!(frame.counter, (upstream + 1) % 16);
    }
    assert_eq!(after.first().map(|a| a.0), Some(10));
    assert!(!gov.button_session().sending);
}

#[test]
fn test_resume_stops_when_car_moves_off() {
    let mut gov = CommandGovernor::new(GovernorConfig::default()).unwrap();
    let moving = |counter: u8| VehicleSignals {
        standstill: false,
        ..stopped_with_stalk(counter)
    };

    let mut resumes = 0;
    for tick in 0..200u64 {
        let upstream = ((tick / 2) % 16) as u8;
        let signals = if tick < 7 {
            stopped_with_stalk(upstream)
        } else {
            moving(upstream)
        };
        resumes += buttons(&gov.tick(true, &signals, 0.0, tick)).len();
    }

    assert_eq!(resumes, 3);
    assert!(!gov.button_session().triggered);
}

#[test]
fn test_stalled_stalk_counter_holds_burst() {
    let mut gov = CommandGovernor::new(GovernorConfig::default()).unwrap();
    let total: usize = (0..300)
        .map(|t| buttons(&gov.tick(true, &stopped_with_stalk(7), 0.0, t)).len())
        .sum();

    assert_eq!(total, 0);
    assert!(gov.button_session().triggered);
}

#[test]
fn test_bus_routing() {
    let mut gov = CommandGovernor::new(GovernorConfig::default()).unwrap();
    gov.tick(true, &stopped_with_stalk(0), 0.0, 0);
    let frames = gov.tick(true, &stopped_with_stalk(1), 0.0, 10);

    for frame in &frames {
        match frame {
            OutboundFrame::Buttons(_) => assert_eq!(frame.bus(), 2),
            _ => assert_eq!(frame.bus(), 0),
        }
    }
    assert_eq!(frames.len(), 3);
}

#[derive(Debug, Clone)]
struct Input {
    enabled: bool,
    standstill: bool,
    steer_fault: bool,
    driver_torque: i32,
    desired: f64,
}

fn input() -> impl Strategy<Value = Input> {
    (
        prop::bool::weighted(0.9),
        prop::bool::weighted(0.05),
        prop::bool::weighted(0.02),
        -300i32..300,
        -1.5f64..1.5,
    )
        .prop_map(|(enabled, standstill, steer_fault, driver_torque, desired)| Input {
            enabled,
            standstill,
            steer_fault,
            driver_torque,
            desired,
        })
}

proptest! {
    #[test]
    fn prop_steering_limits(
        inputs in prop::collection::vec(input(), 1..400),
        max_nonzero in 20u32..200,
    ) {
        let config = GovernorConfig::default().with_max_nonzero_sends(max_nonzero);
        let (steer_max, up, down) = (config.steer_max, config.steer_delta_up, config.steer_delta_down);
        let mut gov = CommandGovernor::new(config).unwrap();
        let mut last = 0i32;

        for (n, input) in inputs.iter().enumerate() {
            let signals = VehicleSignals {
                standstill: input.standstill,
                steer_fault: input.steer_fault,
                driver_torque: input.driver_torque,
                ..VehicleSignals::default()
            };
            let frames = gov.tick(input.enabled, &signals, input.desired, 2 * n as u64);
            let cmd = steering(&frames).unwrap();
            let torque = cmd.signed_torque();

            prop_assert!(torque.abs() <= steer_max);
            if !input.enabled || input.standstill || input.steer_fault {
                prop_assert_eq!(torque, 0);
                prop_assert!(!cmd.active);
            }
            if torque == 0 {
                prop_assert!(!cmd.active);
            } else if last > 0 {
                prop_assert!(torque >= (last - down).max(-up) && torque <= last + up);
            } else {
                prop_assert!(torque >= last - up && torque <= (last + down).min(up));
            }
            last = torque;
        }
    }

    #[test]
    fn prop_burst_counters_follow_upstream(
        period in 1u64..6,
        start in 0u8..16,
        burst_len in 1u32..20,
    ) {
        let config = GovernorConfig::default()
            .with_button_burst_len(burst_len)
            .with_resume_cooldown_ticks(100_000);
        let mut gov = CommandGovernor::new(config).unwrap();
        let mut sent = 0u32;

        for tick in 0..(period * 40) {
            let upstream = ((u64::from(start) + tick / period) % 16) as u8;
            for frame in buttons(&gov.tick(true, &stopped_with_stalk(upstream), 0.0, tick)) {
                prop_assert_eq!(frame.counter, (upstream + 1) % 16);
                sent += 1;
            }
        }
        prop_assert_eq!(sent, burst_len);
    }
}
