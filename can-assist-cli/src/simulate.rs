//! Scenario-driven governor simulation
//!
//! Plays the phases of a scenario through a [`CommandGovernor`], standing in
//! for the car's stalk frame by advancing its rolling counter on a fixed
//! period, and records every outbound frame.

use crate::config::ScenarioConfig;
use anyhow::{Context, Result};
use can_assist::governor::{CruiseButtonFrame, OutboundFrame};
use can_assist::CommandGovernor;
use serde::Serialize;

/// One emitted frame with the tick it was emitted on
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub tick: u64,
    pub phase: String,
    pub frame: OutboundFrame,
}

/// Aggregate numbers over a simulation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    pub ticks: u64,
    pub steering_frames: usize,
    pub hud_frames: usize,
    pub button_frames: usize,
    /// Largest absolute torque commanded
    pub max_torque: i64,
    /// Steering frames sent with assist inactive
    pub inactive_steering_frames: usize,
}

/// Result of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct Simulation {
    pub records: Vec<FrameRecord>,
    pub summary: SimulationSummary,
}

/// Run a scenario from tick 0
pub fn run(scenario: &ScenarioConfig) -> Result<Simulation> {
    let mut governor =
        CommandGovernor::new(scenario.governor.clone()).context("Failed to create governor")?;

    let mut records = Vec::new();
    let mut summary = SimulationSummary::default();
    let mut tick = 0u64;
    let mut stalk_counter = 0u8;

    for (idx, phase) in scenario.phases.iter().enumerate() {
        let label = phase.label(idx);
        log::info!("Simulating {} ({} ticks)", label, phase.ticks);

        let mut signals = phase.signals.clone();
        for _ in 0..phase.ticks {
            signals.buttons = phase.button_period.map(|period| {
                if tick > 0 && tick % period == 0 {
                    stalk_counter = (stalk_counter + 1) % 16;
                }
                CruiseButtonFrame {
                    counter: stalk_counter,
                    ..phase.stalk_frame()
                }
            });

            let frames = governor.tick_with_hud(
                phase.enabled,
                &signals,
                phase.desired_steer,
                &phase.hud,
                tick,
            );
            for frame in frames {
                tally(&mut summary, &frame);
                records.push(FrameRecord {
                    tick,
                    phase: label.clone(),
                    frame,
                });
            }
            tick += 1;
        }
    }

    summary.ticks = tick;
    Ok(Simulation { records, summary })
}

fn tally(summary: &mut SimulationSummary, frame: &OutboundFrame) {
    match frame {
        OutboundFrame::Steering(cmd) => {
            summary.steering_frames += 1;
            summary.max_torque = summary.max_torque.max(i64::from(cmd.torque));
            if !cmd.active {
                summary.inactive_steering_frames += 1;
            }
        }
        OutboundFrame::Hud(_) => summary.hud_frames += 1,
        OutboundFrame::Buttons(_) => summary.button_frames += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(toml_text: &str) -> ScenarioConfig {
        toml::from_str(toml_text).unwrap()
    }

    #[test]
    fn test_run_counts_frames() {
        let sim = run(&scenario(
            r#"
            [[phases]]
            ticks = 100
            enabled = true
            desired_steer = 0.5
            "#,
        ))
        .unwrap();

        assert_eq!(sim.summary.ticks, 100);
        assert_eq!(sim.summary.steering_frames, 50);
        assert_eq!(sim.summary.hud_frames, 10);
        assert_eq!(sim.summary.button_frames, 0);
        assert_eq!(sim.summary.max_torque, 150);
        assert_eq!(sim.records.first().map(|r| r.tick), Some(0));
    }

    #[test]
    fn test_run_resume_burst() {
        let sim = run(&scenario(
            r#"
            [governor]
            resume_cooldown_ticks = 1000

            [[phases]]
            name = "stopped"
            ticks = 200
            enabled = true
            button_period = 3

            [phases.signals]
            standstill = true
            cruise_active = true
            "#,
        ))
        .unwrap();

        assert_eq!(sim.summary.button_frames, 16);
        assert_eq!(sim.summary.max_torque, 0);
        assert!(sim.records.iter().all(|r| r.phase == "stopped"));
    }

    #[test]
    fn test_invalid_governor_config() {
        let result = run(&scenario(
            r#"
            [governor]
            hud_step = 0

            [[phases]]
            ticks = 1
            "#,
        ));
        assert!(result.is_err());
    }
}
