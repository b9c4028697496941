//! candump log parser
//!
//! Reads the text format written by `candump -l` (SocketCAN can-utils):
//!
//! ```text
//! (1436509052.249713) can0 126#0300FE0700000000
//! (1436509052.250102) can2 12B#A5300200
//! ```
//!
//! The bus number is taken from the trailing digits of the interface name.
//! Remote frames are skipped; CAN FD frames (`##`) are accepted.

use super::LogFileParser;
use crate::types::{AssistError, Bus, CanFrame, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// candump log file parser
pub struct CandumpParser;

impl CandumpParser {
    /// Parse a candump log file and return an iterator over CAN frames
    pub fn parse(path: &Path) -> Result<CandumpFrameIterator> {
        log::info!("Parsing candump log: {:?}", path);

        if !path.exists() {
            return Err(AssistError::LogParseError(format!(
                "candump log not found: {:?}",
                path
            )));
        }

        let file = File::open(path).map_err(|e| {
            AssistError::LogParseError(format!("Failed to open candump log: {}", e))
        })?;

        Ok(CandumpFrameIterator {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    /// Parse one line; `None` for blank lines, comments and remote frames
    pub fn parse_line(line: &str) -> Result<Option<CanFrame>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut parts = line.split_whitespace();
        let (stamp, iface, body) = match (parts.next(), parts.next(), parts.next()) {
            (Some(stamp), Some(iface), Some(body)) => (stamp, iface, body),
            _ => return Err(invalid(line, "expected '(time) iface id#data'")),
        };

        let timestamp_ns = parse_timestamp(stamp).ok_or_else(|| invalid(line, "bad timestamp"))?;
        let bus = bus_from_interface(iface);

        let (id, data) = body
            .split_once('#')
            .ok_or_else(|| invalid(line, "missing '#'"))?;
        let address = u32::from_str_radix(id, 16).map_err(|_| invalid(line, "bad identifier"))?;

        let data = if let Some(fd) = data.strip_prefix('#') {
            // CAN FD: one flags nibble precedes the payload
            fd.get(1..).unwrap_or("")
        } else if data.starts_with('R') {
            log::trace!("Skipping remote frame {:X}", address);
            return Ok(None);
        } else {
            data
        };

        let data = decode_hex(data).ok_or_else(|| invalid(line, "bad payload"))?;
        Ok(Some(
            CanFrame::new(bus, address, data).with_timestamp_ns(timestamp_ns),
        ))
    }
}

/// Iterator over CAN frames from a candump log
pub struct CandumpFrameIterator {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl Iterator for CandumpFrameIterator {
    type Item = Result<CanFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(AssistError::IoError(e))),
            };
            self.line_no += 1;

            match CandumpParser::parse_line(&line) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(AssistError::LogParseError(msg)) => {
                    return Some(Err(AssistError::LogParseError(format!(
                        "line {}: {}",
                        self.line_no, msg
                    ))))
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl LogFileParser for CandumpFrameIterator {
    fn parse(path: &Path) -> Result<Self> {
        CandumpParser::parse(path)
    }
}

fn invalid(line: &str, reason: &str) -> AssistError {
    AssistError::LogParseError(format!("{} in {:?}", reason, line))
}

fn parse_timestamp(stamp: &str) -> Option<u64> {
    let inner = stamp.strip_prefix('(')?.strip_suffix(')')?;
    let (secs, frac) = inner.split_once('.').unwrap_or((inner, ""));
    let secs: u64 = secs.parse().ok()?;

    // Right-pad the fraction to nanoseconds
    let digits: String = frac.chars().take(9).collect();
    let nanos: u64 = if digits.is_empty() {
        0
    } else {
        format!("{:0<9}", digits).parse().ok()?
    };
    secs.checked_mul(1_000_000_000)?.checked_add(nanos)
}

fn bus_from_interface(iface: &str) -> Bus {
    let digits = iface.trim_start_matches(|c: char| !c.is_ascii_digit());
    digits.parse().unwrap_or(0)
}

fn decode_hex(data: &str) -> Option<Vec<u8>> {
    let data: String = data.chars().filter(|c| *c != '.').collect();
    if data.len() % 2 != 0 || data.len() > 128 {
        return None;
    }
    (0..data.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(data.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_line() {
        let frame = CandumpParser::parse_line("(1436509052.249713) can0 126#0300FE07")
            .unwrap()
            .unwrap();
        assert_eq!(frame.bus, 0);
        assert_eq!(frame.address, 0x126);
        assert_eq!(frame.data, vec![0x03, 0x00, 0xFE, 0x07]);
        assert_eq!(frame.timestamp_ns, 1_436_509_052_249_713_000);
    }

    #[test]
    fn test_parse_line_variants() {
        let ext = CandumpParser::parse_line("(1.5) vcan2 18DAF110#").unwrap().unwrap();
        assert_eq!(ext.bus, 2);
        assert_eq!(ext.address, 0x18DA_F110);
        assert!(ext.data.is_empty());
        assert_eq!(ext.timestamp_ns, 1_500_000_000);

        let fd = CandumpParser::parse_line("(2.0) can1 123##1AABB").unwrap().unwrap();
        assert_eq!(fd.data, vec![0xAA, 0xBB]);

        assert!(CandumpParser::parse_line("(2.0) can0 123#R").unwrap().is_none());
        assert!(CandumpParser::parse_line("   ").unwrap().is_none());
        assert!(CandumpParser::parse_line("# comment").unwrap().is_none());
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(CandumpParser::parse_line("can0 123#00").is_err());
        assert!(CandumpParser::parse_line("(1.0) can0 123").is_err());
        assert!(CandumpParser::parse_line("(1.0) can0 XYZ#00").is_err());
        assert!(CandumpParser::parse_line("(1.0) can0 123#0").is_err());
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(0.000100) can0 40#0000000000000000").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "(0.010200) can0 6B4#0000000000575657").unwrap();
        writeln!(file, "garbage").unwrap();
        file.flush().unwrap();

        let results: Vec<_> = CandumpParser::parse(file.path()).unwrap().collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].as_ref().unwrap().address, 0x6B4);
        let err = results[2].as_ref().unwrap_err().to_string();
        assert!(err.contains("line 4"), "{}", err);
    }

    #[test]
    fn test_missing_file() {
        assert!(CandumpParser::parse(Path::new("/nonexistent/drive.log")).is_err());
    }
}
