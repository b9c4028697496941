//! CAN Assist Library
//!
//! Vehicle identification and steering/cruise command layer for a
//! driver-assistance controller interposed on a car's CAN bus.
//!
//! # Architecture
//!
//! - [`fingerprint`] consumes raw frames at startup and narrows the
//!   [`registry`] down to one vehicle, collecting the VIN on the side
//! - [`vin`] decodes a VAG VIN into chassis, model year and tuning
//! - [`governor`] runs every control tick and produces the steering, HUD
//!   and cruise button frames
//!
//! The library does NOT:
//! - Talk to CAN hardware (frames come in and go out as values)
//! - Pack or unpack signal bits of individual messages
//! - Plan trajectories or compute the desired steering value
//!
//! # Example Usage
//!
//! ```no_run
//! use can_assist::formats::{CandumpParser, CycleBatcher};
//! use can_assist::{FingerprintConfig, FingerprintEngine, VehicleRegistry, VehicleSignals};
//! use std::path::Path;
//!
//! let registry = VehicleRegistry::builtin();
//! let frames = CandumpParser::parse(Path::new("drive.log")).unwrap();
//! let cycles = CycleBatcher::new(frames).filter_map(|batch| batch.ok());
//!
//! let identification = FingerprintEngine::new(&registry, FingerprintConfig::default())
//!     .identify(cycles);
//! let profile = registry.select(&identification);
//!
//! if let Ok(mut governor) = profile.command_governor() {
//!     let frames = governor.tick(true, &VehicleSignals::default(), 0.1, 0);
//!     for frame in frames {
//!         println!("{} {:?}", frame.name(), frame.fields());
//!     }
//! }
//! ```

pub mod config;
pub mod fingerprint;
pub mod formats;
pub mod governor;
pub mod registry;
pub mod types;
pub mod vin;

mod cantp;

pub use config::{BusLayout, FingerprintConfig, GovernorConfig};
pub use fingerprint::{AbortHandle, FingerprintEngine, Identification, Outcome};
pub use governor::{CommandGovernor, HudRequest, OutboundFrame, VehicleSignals};
pub use registry::{Brand, CarProfile, StartupAlert, VehicleEntry, VehicleRegistry};
pub use types::{AssistError, CanFrame, FailureReason, Result, Timestamp};
pub use vin::{ChassisRecord, VinAccumulator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
