//! CAN Assist CLI Application
//!
//! Command-line front end for the can-assist library:
//! - Identify the vehicle in a recorded candump log
//! - Decode a VIN into chassis, model year and tuning
//! - Run a governor scenario and list the frames it would send

use anyhow::{Context, Result};
use can_assist::formats::{CandumpParser, CycleBatcher};
use can_assist::{FingerprintConfig, FingerprintEngine, VehicleRegistry};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

mod config;
mod report;
mod simulate;

use report::OutputFormat;

/// CAN Assist - vehicle identification and command governor tools
#[derive(Parser, Debug)]
#[command(name = "can-assist-cli")]
#[command(about = "Identify vehicles from CAN logs and simulate the command governor", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Txt, global = true)]
    format: OutputFormat,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fingerprint the vehicle recorded in a candump log
    Identify {
        /// Path to candump log file
        #[arg(short, long, value_name = "FILE")]
        log: PathBuf,

        /// Path to fingerprint configuration file (fingerprint.toml)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Fail unless a vehicle was identified
        #[arg(long)]
        require: bool,
    },

    /// Decode a VIN
    Vin {
        /// 17-character vehicle identification number
        vin: String,
    },

    /// Run a governor scenario
    Simulate {
        /// Path to scenario file (scenario.toml)
        #[arg(short, long, value_name = "FILE")]
        scenario: PathBuf,

        /// List every emitted frame, not just the summary
        #[arg(long)]
        frames: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Assist CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using can-assist library v{}", can_assist::VERSION);

    let report = match &args.command {
        Command::Identify {
            log: log_path,
            config,
            require,
        } => identify(log_path, config.as_deref(), *require, args.format)?,
        Command::Vin { vin } => {
            let chassis = can_assist::vin::decode(vin);
            report::vin_report(vin, &chassis, args.format)?
        }
        Command::Simulate { scenario, frames } => {
            log::info!("Loading scenario from: {:?}", scenario);
            let scenario = config::load_scenario(scenario)?;
            log::debug!(
                "Scenario loaded: {} phases, {} ticks ({:.1}s)",
                scenario.phases.len(),
                scenario.total_ticks(),
                scenario.total_ticks() as f64 / scenario.tick_hz as f64
            );
            let sim = simulate::run(&scenario)?;
            report::simulation_report(&sim, args.format, *frames)?
        }
    };

    write_report(&report, args.output.as_deref())
}

/// Replay a log through the fingerprint engine
fn identify(
    log_path: &Path,
    config_path: Option<&Path>,
    require: bool,
    format: OutputFormat,
) -> Result<String> {
    let config = match config_path {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_fingerprint_config(path)?
        }
        None => FingerprintConfig::default(),
    };

    let registry = VehicleRegistry::builtin();
    let stats = registry.stats();
    log::info!(
        "Registry: {} vehicles, {} fingerprints, {} addresses",
        stats.num_vehicles,
        stats.num_fingerprints,
        stats.num_addresses
    );

    let frames = CandumpParser::parse(log_path)
        .with_context(|| format!("Failed to open log: {:?}", log_path))?;
    let cycles = CycleBatcher::new(frames).filter_map(|batch| match batch {
        Ok(batch) => Some(batch),
        Err(e) => {
            log::warn!("Skipping unreadable frame: {}", e);
            None
        }
    });

    let identification = FingerprintEngine::new(&registry, config).identify(cycles);
    match identification.candidate() {
        Some(id) => log::info!("Identified {} after {} cycles", id, identification.cycles),
        None => log::warn!(
            "No vehicle identified after {} cycles: {:?}",
            identification.cycles,
            identification.outcome
        ),
    }
    if require {
        identification.require_vehicle()?;
    }

    let profile = registry.select(&identification);
    report::identification_report(&identification, &profile, format)
}

fn write_report(report: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, report)
                .with_context(|| format!("Failed to write report: {:?}", path))?;
            log::info!("Report written to {:?}", path);
        }
        None => print!("{}", report),
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
