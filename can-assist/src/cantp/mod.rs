//! CAN-TP (ISO-TP) frame classification
//!
//! Only the receive side needed to follow a diagnostic response is
//! implemented: the protocol control information (PCI) nibble of the first
//! byte tells single, first, consecutive and flow-control frames apart.

/// Length of every padded ISO-TP frame on classic CAN
pub const FRAME_LEN: usize = 8;

/// Decoded protocol control information of one ISO-TP frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciFrame {
    /// Complete message in one frame
    Single { length: usize },
    /// Start of a segmented message announcing its total length
    First { total_length: usize },
    /// Continuation carrying a 4-bit sequence number
    Consecutive { sequence: u8 },
    /// Flow control sent by the receiver
    FlowControl { status: u8 },
}

impl PciFrame {
    /// Classify a frame payload, `None` if it is empty or not ISO-TP
    pub fn parse(data: &[u8]) -> Option<Self> {
        let pci = *data.first()?;
        match pci >> 4 {
            0x0 => Some(PciFrame::Single {
                length: (pci & 0x0F) as usize,
            }),
            0x1 => {
                let low = *data.get(1)?;
                Some(PciFrame::First {
                    total_length: (((pci & 0x0F) as usize) << 8) | low as usize,
                })
            }
            0x2 => Some(PciFrame::Consecutive {
                sequence: pci & 0x0F,
            }),
            0x3 => Some(PciFrame::FlowControl { status: pci & 0x0F }),
            _ => None,
        }
    }

    /// Number of leading PCI bytes before the payload
    pub fn header_len(&self) -> usize {
        match self {
            PciFrame::Single { .. } => 1,
            PciFrame::First { .. } => 2,
            PciFrame::Consecutive { .. } => 1,
            PciFrame::FlowControl { .. } => 3,
        }
    }

    /// Payload slice carried by this frame
    pub fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        data.get(self.header_len()..).unwrap_or(&[])
    }
}

/// Sequence number expected for the n-th consecutive frame (0-based)
pub fn expected_sequence(index: usize) -> u8 {
    ((index + 1) % 16) as u8
}
