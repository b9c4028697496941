//! Core types shared by the identification and command layers
//!
//! This module defines the raw CAN frame as handed in by the (external) bus
//! transport, and the crate-wide error type. Frames are immutable once
//! received; everything downstream only borrows them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used for replayed frames
pub type Timestamp = DateTime<Utc>;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, AssistError>;

/// Highest address that still fits an 11-bit standard identifier (exclusive)
pub const STANDARD_ID_LIMIT: u32 = 0x800;

/// Logical CAN bus number as seen by the interposing hardware
pub type Bus = u8;

/// Raw CAN frame delivered by the bus transport
///
/// `bus` is the logical bus the frame belongs to, `src` the physical port it
/// actually arrived on. On a simple harness both are the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    /// Receive timestamp in nanoseconds since epoch (0 when unknown)
    pub timestamp_ns: u64,
    /// Logical bus number
    pub bus: Bus,
    /// CAN identifier (11-bit or 29-bit)
    pub address: u32,
    /// Payload bytes (0-8 for classic CAN)
    pub data: Vec<u8>,
    /// Physical/logical source the frame arrived on
    pub src: Bus,
}

impl CanFrame {
    /// Create a frame received on `bus` with no timestamp
    pub fn new(bus: Bus, address: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            timestamp_ns: 0,
            bus,
            address,
            data: data.into(),
            src: bus,
        }
    }

    /// Builder method: set the port the frame arrived on
    pub fn with_src(mut self, src: Bus) -> Self {
        self.src = src;
        self
    }

    /// Builder method: attach a receive timestamp
    pub fn with_timestamp_ns(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    /// Convert timestamp from nanoseconds to DateTime<Utc>
    pub fn timestamp(&self) -> Timestamp {
        let secs = (self.timestamp_ns / 1_000_000_000) as i64;
        let nsecs = (self.timestamp_ns % 1_000_000_000) as u32;
        DateTime::from_timestamp(secs, nsecs).unwrap_or_default()
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    /// True if the identifier fits in 11 bits
    pub fn is_standard(&self) -> bool {
        self.address < STANDARD_ID_LIMIT
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus{} {:03X}#", self.src, self.address)?;
        for byte in &self.data {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Why an identification run ended without a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Every known vehicle was eliminated
    NoCandidates,
    /// No decision within the overall timeout window
    TimedOut,
    /// Stopped from outside before a decision
    Aborted,
    /// The frame source ran dry before a decision
    StreamEnded,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoCandidates => write!(f, "no candidate vehicle left"),
            FailureReason::TimedOut => write!(f, "timed out"),
            FailureReason::Aborted => write!(f, "aborted"),
            FailureReason::StreamEnded => write!(f, "frame stream ended"),
        }
    }
}

/// Errors surfaced by the library
#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("Failed to parse log file: {0}")]
    LogParseError(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid VIN: {0:?}")]
    InvalidVin(String),

    #[error("Unknown vehicle: {0}")]
    UnknownVehicle(String),

    #[error("Vehicle identification failed: {0}")]
    IdentificationFailed(FailureReason),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_basics() {
        let frame = CanFrame::new(0, 0x126, vec![0x03, 0x00, 0xFE, 0x07]);
        assert_eq!(frame.dlc(), 4);
        assert!(frame.is_standard());
        assert_eq!(frame.src, 0);
        assert_eq!(format!("{}", frame), "bus0 126#0300FE07");
    }

    #[test]
    fn test_extended_address() {
        let frame = CanFrame::new(1, 0x18DAF110, vec![0; 8]);
        assert!(!frame.is_standard());
    }

    #[test]
    fn test_timestamp_conversion() {
        let frame = CanFrame::new(0, 0x100, vec![]).with_timestamp_ns(1_500_000_000);
        let ts = frame.timestamp();
        assert_eq!(ts.timestamp(), 1);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_error_display() {
        let err = AssistError::IdentificationFailed(FailureReason::TimedOut);
        assert_eq!(err.to_string(), "Vehicle identification failed: timed out");
    }
}
