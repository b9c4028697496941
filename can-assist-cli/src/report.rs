//! Report generation
//!
//! Renders identification, VIN and simulation results as plain text or
//! JSON.

use crate::simulate::Simulation;
use anyhow::Result;
use can_assist::{CarProfile, ChassisRecord, Identification};
use serde::Serialize;
use std::fmt::Write;

const RULE: &str = "═══════════════════════════════════════════════";

/// Output format of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human readable text
    #[default]
    Txt,
    /// Pretty-printed JSON
    Json,
}

#[derive(Serialize)]
struct IdentificationReport<'a> {
    identification: &'a Identification,
    profile: &'a CarProfile,
}

/// Report for an identification run and the profile selected from it
pub fn identification_report(
    identification: &Identification,
    profile: &CarProfile,
    format: OutputFormat,
) -> Result<String> {
    if format == OutputFormat::Json {
        let report = IdentificationReport {
            identification,
            profile,
        };
        return Ok(serde_json::to_string_pretty(&report)?);
    }

    let mut out = String::new();
    writeln!(out, "{}", RULE)?;
    writeln!(out, "  Vehicle Identification")?;
    writeln!(out, "{}\n", RULE)?;

    match identification.candidate() {
        Some(id) => writeln!(out, "Vehicle:  {}", id)?,
        None => {
            let reason = identification
                .outcome
                .failure_reason()
                .map(|r| r.to_string())
                .unwrap_or_default();
            writeln!(out, "Vehicle:  not identified ({})", reason)?
        }
    }
    writeln!(out, "Cycles:   {}", identification.cycles)?;
    if !identification.vin.is_empty() {
        writeln!(out, "VIN:      {}", identification.vin)?;
    }

    writeln!(out, "\nObserved fingerprint:")?;
    if identification.fingerprint.is_empty() {
        writeln!(out, "  (no traffic)")?;
    }
    for (bus, signature) in identification.fingerprint.iter() {
        writeln!(out, "  bus {}: {} addresses", bus, signature.len())?;
        let line = signature
            .iter()
            .map(|(address, len)| format!("{}: {}", address, len))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "    {{{}}}", line)?;
    }

    writeln!(out, "\nProfile:")?;
    writeln!(out, "  Id:        {}", profile.vehicle_id)?;
    writeln!(out, "  Alert:     {:?}", profile.startup_alert)?;
    writeln!(
        out,
        "  Steering:  {}",
        if profile.steering_available() {
            "available"
        } else {
            "unavailable"
        }
    )?;
    if let Some(chassis) = &profile.chassis {
        write_chassis(&mut out, chassis)?;
    }
    if let Some(mass) = profile.mass_kg {
        writeln!(out, "  Mass:      {:.0} kg (with cargo)", mass)?;
    }

    Ok(out)
}

#[derive(Serialize)]
struct VinReport<'a> {
    vin: &'a str,
    chassis: &'a ChassisRecord,
}

/// Report for a single decoded VIN
pub fn vin_report(vin: &str, chassis: &ChassisRecord, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&VinReport { vin, chassis })?);
    }

    let mut out = String::new();
    writeln!(out, "VIN:       {}", vin)?;
    write_chassis(&mut out, chassis)?;
    Ok(out)
}

fn write_chassis(out: &mut String, chassis: &ChassisRecord) -> Result<()> {
    writeln!(out, "  Chassis:   {} ({})", chassis.display_name(), chassis.code)?;
    writeln!(out, "  Platform:  {}", chassis.platform)?;
    writeln!(out, "  Supported: {}", chassis.supported)?;
    if let Some(wheelbase) = chassis.wheelbase_m {
        writeln!(out, "  Wheelbase: {:.2} m", wheelbase)?;
    }
    writeln!(
        out,
        "  Tuning:    ratio {:.2}, delay {:.2}s, kp {:.3}, ki {:.3}, kf {:.6}",
        chassis.tuning.steer_ratio,
        chassis.tuning.steer_actuator_delay,
        chassis.tuning.kp,
        chassis.tuning.ki,
        chassis.tuning.kf
    )?;
    Ok(())
}

/// Report for a simulation run; frame listings only with `frames`
pub fn simulation_report(sim: &Simulation, format: OutputFormat, frames: bool) -> Result<String> {
    if format == OutputFormat::Json {
        let json = if frames {
            serde_json::to_string_pretty(sim)?
        } else {
            serde_json::to_string_pretty(&sim.summary)?
        };
        return Ok(json);
    }

    let mut out = String::new();
    if frames {
        for record in &sim.records {
            let fields = record
                .frame
                .fields()
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(
                out,
                "{:>6} {:<10} bus{} {:03X} {:<10} {}",
                record.tick,
                record.phase,
                record.frame.bus(),
                record.frame.address(),
                record.frame.name(),
                fields
            )?;
        }
        writeln!(out)?;
    }

    let summary = &sim.summary;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "  Simulation Summary")?;
    writeln!(out, "{}\n", RULE)?;
    writeln!(out, "Ticks:             {}", summary.ticks)?;
    writeln!(out, "Steering frames:   {}", summary.steering_frames)?;
    writeln!(out, "  inactive:        {}", summary.inactive_steering_frames)?;
    writeln!(out, "  max torque:      {}", summary.max_torque)?;
    writeln!(out, "HUD frames:        {}", summary.hud_frames)?;
    writeln!(out, "Button frames:     {}", summary.button_frames)?;
    Ok(out)
}
