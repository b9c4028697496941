//! Replay log parsers
//!
//! Recorded drives are replayed through the fingerprint engine offline.
//! Each parser implements an iterator pattern over CanFrame objects;
//! [`CycleBatcher`] regroups them into the receive cycles the engine expects.

use crate::types::{CanFrame, Result};
use std::iter::Peekable;
use std::path::Path;

pub mod candump;

pub use candump::{CandumpFrameIterator, CandumpParser};

/// Common trait for all log file parsers
pub trait LogFileParser: Iterator<Item = Result<CanFrame>> + Sized {
    /// Parse a log file and return an iterator over CAN frames
    fn parse(path: &Path) -> Result<Self>;
}

/// Default receive cycle: 10 ms
pub const CYCLE_NS: u64 = 10_000_000;

/// Groups timestamped frames into fixed-length receive cycles
///
/// Cycles without traffic are yielded as empty batches so elapsed-cycle
/// counting matches wall time. The first cycle starts at the first frame.
pub struct CycleBatcher<I: Iterator<Item = Result<CanFrame>>> {
    frames: Peekable<I>,
    cycle_ns: u64,
    boundary: Option<u64>,
}

impl<I: Iterator<Item = Result<CanFrame>>> CycleBatcher<I> {
    pub fn new(frames: I) -> Self {
        Self::with_cycle_ns(frames, CYCLE_NS)
    }

    pub fn with_cycle_ns(frames: I, cycle_ns: u64) -> Self {
        Self {
            frames: frames.peekable(),
            cycle_ns: cycle_ns.max(1),
            boundary: None,
        }
    }
}

impl<I: Iterator<Item = Result<CanFrame>>> Iterator for CycleBatcher<I> {
    type Item = Result<Vec<CanFrame>>;

    fn next(&mut self) -> Option<Self::Item> {
        let boundary = match (self.boundary, self.frames.peek()?) {
            (Some(boundary), _) => boundary,
            (None, Ok(first)) => first.timestamp_ns + self.cycle_ns,
            (None, Err(_)) => 0,
        };

        let mut batch = Vec::new();
        loop {
            match self.frames.peek() {
                Some(Ok(frame)) if frame.timestamp_ns < boundary => {}
                Some(Ok(_)) | None => break,
                Some(Err(_)) => {
                    // Surface the error on its own
                    if batch.is_empty() {
                        return self.frames.next().map(|r| r.map(|_| Vec::new()));
                    }
                    break;
                }
            }
            if let Some(Ok(frame)) = self.frames.next() {
                batch.push(frame);
            }
        }

        self.boundary = Some(boundary + self.cycle_ns);
        Some(Ok(batch))
    }
}
