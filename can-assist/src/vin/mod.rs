//! VIN extraction during fingerprinting
//!
//! Two independent sources feed the accumulator:
//! - a diagnostic query/response exchange (ISO-TP, response on 0x7E8), and
//! - the passive "component protection" broadcast some VAG gateways send on
//!   0x6B4 as three indexed fragments.
//!
//! A VIN is only ever reported once a source is complete. Partial data never
//! leaks out as a truncated string.

pub mod chassis;

pub use chassis::{decode, model_year, ChassisRecord, LateralTuning, Platform};

use crate::cantp::{self, PciFrame};

/// Length of a complete VIN
pub const VIN_LEN: usize = 17;

/// Responses expected per query step (first frame, then two consecutive frames)
const RESPONSE_COUNTS: [usize; 2] = [1, 2];

/// Total ISO-TP payload announced by the first frame (service echo + VIN)
const RESPONSE_TOTAL_LEN: usize = 20;

/// Leading bytes of the reassembled response before the VIN (`49 02 01`)
const RESPONSE_ECHO_LEN: usize = 3;

/// A diagnostic request the transport should put on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VinQuery {
    /// Request address
    pub address: u32,
    /// Padded 8-byte payload
    pub payload: [u8; 8],
}

/// Requests for each query step: functional "read VIN" then flow control
pub const VIN_QUERIES: [VinQuery; 2] = [
    VinQuery {
        address: 0x7DF,
        payload: [0x02, 0x09, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00],
    },
    VinQuery {
        address: 0x7E0,
        payload: [0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    },
];

/// Progress of the query/response exchange
#[derive(Debug, Clone, Default)]
struct QueryTracker {
    step: usize,
    count: usize,
    data: Vec<u8>,
    responded: bool,
    never_responded: bool,
}

impl QueryTracker {
    fn new() -> Self {
        Self {
            never_responded: true,
            ..Self::default()
        }
    }

    fn is_complete(&self) -> bool {
        self.step == RESPONSE_COUNTS.len()
    }

    fn is_valid_response(&self, data: &[u8]) -> bool {
        if data.len() != cantp::FRAME_LEN {
            return false;
        }
        match (self.step, PciFrame::parse(data)) {
            (0, Some(PciFrame::First { total_length })) => total_length == RESPONSE_TOTAL_LEN,
            (1, Some(PciFrame::Consecutive { sequence })) => {
                sequence == cantp::expected_sequence(self.count)
            }
            _ => false,
        }
    }

    fn discard(&mut self) {
        self.step = 0;
        self.count = 0;
        self.data.clear();
        self.responded = false;
    }

    fn vin(&self) -> Option<String> {
        if !self.is_complete() {
            return None;
        }
        let end = RESPONSE_ECHO_LEN + VIN_LEN;
        self.data
            .get(RESPONSE_ECHO_LEN..end)
            .and_then(|bytes| vin_from_bytes(bytes).ok())
    }
}

/// State of in-progress VIN extraction
#[derive(Debug, Clone)]
pub struct VinAccumulator {
    query: QueryTracker,
    fragments: [Option<Vec<u8>>; 3],
    broadcast_vin: Option<String>,
}

impl Default for VinAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl VinAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self {
            query: QueryTracker::new(),
            fragments: [None, None, None],
            broadcast_vin: None,
        }
    }

    /// Feed one frame received on the diagnostic response address
    ///
    /// Returns true if the frame was accepted. A frame that does not match
    /// the expected sequence discards everything collected so far for the
    /// current attempt.
    pub fn on_query_response(&mut self, data: &[u8]) -> bool {
        self.query.never_responded = false;

        if self.query.is_complete() {
            log::trace!("VIN: ignoring response after completed query");
            return false;
        }

        if !self.query.is_valid_response(data) {
            if self.query.step > 0 || self.query.count > 0 {
                log::warn!(
                    "VIN: unexpected response at step {} frame {}, discarding partial VIN",
                    self.query.step,
                    self.query.count
                );
            }
            self.query.discard();
            return false;
        }

        let payload_start = if self.query.step == 0 { 2 } else { 1 };
        self.query.data.extend_from_slice(&data[payload_start..]);
        self.query.count += 1;

        if self.query.count == RESPONSE_COUNTS[self.query.step] {
            self.query.responded = true;
            self.query.step += 1;
            self.query.count = 0;
            log::debug!("VIN: query step {} complete", self.query.step);
        }
        true
    }

    /// Feed one passive broadcast frame; fragments may arrive in any order
    pub fn on_broadcast_fragment(&mut self, data: &[u8]) {
        let (index, offset) = match data.first() {
            Some(0) => (0, 5),
            Some(1) => (1, 1),
            Some(2) => (2, 1),
            _ => {
                log::trace!("VIN: ignoring broadcast frame with unknown index");
                return;
            }
        };

        let fragment = data.get(offset..).unwrap_or(&[]);
        if fragment.is_empty() {
            return;
        }
        log::debug!("VIN: broadcast fragment {}", index);
        self.fragments[index] = Some(fragment.to_vec());

        if let [Some(a), Some(b), Some(c)] = &self.fragments {
            let bytes: Vec<u8> = a.iter().chain(b).chain(c).copied().collect();
            match vin_from_bytes(&bytes) {
                Ok(vin) => {
                    if self.broadcast_vin.as_deref() != Some(vin.as_str()) {
                        log::info!("VIN: broadcast collection complete");
                    }
                    self.broadcast_vin = Some(vin);
                }
                Err(_) => {
                    log::warn!("VIN: broadcast fragments do not form a VIN, discarding");
                    self.fragments = [None, None, None];
                }
            }
        }
    }

    /// Next diagnostic request to transmit, if one is due
    ///
    /// A request is due while the ECU has never answered, or after a step
    /// completed and the next one has not been asked for yet. Issuing a
    /// request restarts the response count for the current step.
    pub fn next_query(&mut self) -> Option<VinQuery> {
        let due = self.query.never_responded
            || (self.query.responded && !self.query.is_complete());
        if !due {
            return None;
        }
        let query = VIN_QUERIES[self.query.step.min(VIN_QUERIES.len() - 1)];
        self.query.responded = false;
        self.query.count = 0;
        Some(query)
    }

    /// True once either source produced a full VIN
    pub fn is_complete(&self) -> bool {
        self.query.vin().is_some() || self.broadcast_vin.is_some()
    }

    /// Number of broadcast fragments currently held
    pub fn fragments_seen(&self) -> usize {
        self.fragments.iter().filter(|f| f.is_some()).count()
    }

    /// Final VIN: the query result if complete, else the broadcast, else empty
    pub fn vin(&self) -> String {
        self.query
            .vin()
            .or_else(|| self.broadcast_vin.clone())
            .unwrap_or_default()
    }
}

/// Validate raw bytes as a VIN
pub fn vin_from_bytes(bytes: &[u8]) -> crate::types::Result<String> {
    let text = String::from_utf8_lossy(bytes).into_owned();
    if bytes.len() != VIN_LEN || !bytes.iter().all(|b| b.is_ascii_alphanumeric()) {
        return Err(crate::types::AssistError::InvalidVin(text));
    }
    Ok(text)
}
