//! Line Framer
//!
//! Reassembles delimited records (NMEA-style sentences) from a byte stream.
//!
//! ```text
//!            byte                 delimiter
//!   Empty ─────────► Filling ─────────────► Emit ──► Empty
//!                       │
//!                       │ buffer full
//!                       ▼
//!                   Overflow ──► Discarding ── delimiter ──► Empty
//! ```
//!
//! A record longer than the buffer is never emitted truncated: the framer
//! reports one `Overflow`, clears the buffer and skips the rest of that
//! record up to the next delimiter. When carriage returns are stripped, a
//! full buffer still accepts one `\r`, so a CRLF-terminated record of
//! exactly `capacity` bytes fits.

use serde::{Deserialize, Serialize};

use crate::config::FramerConfig;

/// Framer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FramerState {
    /// No bytes of the current record seen
    Empty,
    /// Accumulating a record
    Filling,
    /// Skipping the tail of an overflowed record
    Discarding,
}

/// Output of the framer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
    /// A complete record
    Line(Vec<u8>),
    /// A record exceeded the buffer and was dropped; `discarded` counts the
    /// bytes dropped up to the overflow point
    Overflow { discarded: usize },
}

impl FramerEvent {
    /// Record text with invalid UTF-8 replaced, `None` for overflows
    pub fn line_text(&self) -> Option<String> {
        match self {
            FramerEvent::Line(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            FramerEvent::Overflow { .. } => None,
        }
    }
}

/// Framer counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramerStats {
    pub bytes_in: u64,
    pub lines_emitted: u64,
    pub overflows: u64,
    pub bytes_discarded: u64,
    pub empty_records_skipped: u64,
}

/// Byte-at-a-time record assembler with a fixed-capacity buffer
#[derive(Debug, Clone)]
pub struct LineFramer {
    config: FramerConfig,
    buffer: Vec<u8>,
    state: FramerState,
    stats: FramerStats,
}

impl LineFramer {
    pub fn new(config: FramerConfig) -> Self {
        Self {
            buffer: Vec::with_capacity(config.capacity),
            config,
            state: FramerState::Empty,
            stats: FramerStats::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(FramerConfig::with_capacity(capacity))
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn stats(&self) -> &FramerStats {
        &self.stats
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Bytes of the record currently being assembled
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Feed one byte
    pub fn push(&mut self, byte: u8) -> Option<FramerEvent> {
        self.stats.bytes_in += 1;
        let is_delimiter = byte == self.config.delimiter;

        match self.state {
            FramerState::Discarding => {
                if is_delimiter {
                    self.state = FramerState::Empty;
                } else {
                    self.stats.bytes_discarded += 1;
                }
                None
            }
            FramerState::Empty | FramerState::Filling if is_delimiter => self.emit(),
            FramerState::Empty | FramerState::Filling => {
                if self.buffer.len() >= self.config.capacity && !self.is_trailing_cr(byte) {
                    return Some(self.overflow());
                }
                self.buffer.push(byte);
                self.state = FramerState::Filling;
                None
            }
        }
    }

    /// Feed a slice, collecting every event it produces
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FramerEvent> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Drop any partial record and return to `Empty`
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = FramerState::Empty;
    }

    /// A `\r` right after a full record, which `emit` will strip
    fn is_trailing_cr(&self, byte: u8) -> bool {
        self.config.strip_carriage_return
            && byte == b'\r'
            && self.buffer.len() == self.config.capacity
    }

    fn emit(&mut self) -> Option<FramerEvent> {
        self.state = FramerState::Empty;
        if self.config.strip_carriage_return && self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }
        if self.buffer.is_empty() {
            self.stats.empty_records_skipped += 1;
            return None;
        }

        let mut line = core::mem::replace(&mut self.buffer, Vec::with_capacity(self.config.capacity));
        if self.config.include_delimiter {
            line.push(self.config.delimiter);
        }
        self.stats.lines_emitted += 1;
        Some(FramerEvent::Line(line))
    }

    fn overflow(&mut self) -> FramerEvent {
        let discarded = self.buffer.len() + 1;
        self.buffer.clear();
        self.state = FramerState::Discarding;
        self.stats.overflows += 1;
        self.stats.bytes_discarded += discarded as u64;
        FramerEvent::Overflow { discarded }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> FramerEvent {
        FramerEvent::Line(text.as_bytes().to_vec())
    }

    #[test]
    fn test_two_records_round_trip() {
        let mut framer = LineFramer::with_capacity(2);
        let events = framer.feed(b"AB\nCD\n");
        assert_eq!(events, vec![line("AB"), line("CD")]);
        assert!(framer.is_empty());
        assert_eq!(framer.state(), FramerState::Empty);
        assert_eq!(framer.stats().lines_emitted, 2);
    }

    #[test]
    fn test_capacity_plus_one_overflows_once() {
        let mut framer = LineFramer::with_capacity(4);
        let events = framer.feed(b"ABCDE");
        assert_eq!(events, vec![FramerEvent::Overflow { discarded: 5 }]);
        assert!(framer.is_empty());
        assert_eq!(framer.stats().overflows, 1);
    }

    #[test]
    fn test_overflow_resumes_after_next_delimiter() {
        let mut framer = LineFramer::with_capacity(4);
        let events = framer.feed(b"ABCDEFGH\nOK\n");
        assert_eq!(
            events,
            vec![FramerEvent::Overflow { discarded: 5 }, line("OK")]
        );
        assert_eq!(framer.stats().bytes_discarded, 8);
    }

    #[test]
    fn test_exact_capacity_is_not_overflow() {
        let mut framer = LineFramer::with_capacity(4);
        assert_eq!(framer.feed(b"ABCD\n"), vec![line("ABCD")]);
    }

    #[test]
    fn test_exact_capacity_with_crlf_is_not_overflow() {
        let mut framer = LineFramer::with_capacity(4);
        assert_eq!(framer.feed(b"ABCD\r\nEF\r\n"), vec![line("ABCD"), line("EF")]);
        assert_eq!(framer.stats().overflows, 0);

        // Only one trailing carriage return is tolerated
        assert_eq!(
            framer.feed(b"ABCD\r\r\nOK\n"),
            vec![FramerEvent::Overflow { discarded: 6 }, line("OK")]
        );
        assert_eq!(
            framer.feed(b"ABCD\rX\n"),
            vec![FramerEvent::Overflow { discarded: 6 }]
        );
    }

    #[test]
    fn test_crlf_and_empty_records() {
        let mut framer = LineFramer::new(FramerConfig::default());
        let events = framer.feed(b"\n$GPZDA,1*6A\r\n\r\n");
        assert_eq!(events, vec![line("$GPZDA,1*6A")]);
        assert_eq!(framer.stats().empty_records_skipped, 2);
    }

    #[test]
    fn test_include_delimiter() {
        let mut framer = LineFramer::new(FramerConfig {
            capacity: 8,
            delimiter: b';',
            include_delimiter: true,
            strip_carriage_return: false,
        });
        assert_eq!(framer.feed(b"a;bc;"), vec![line("a;"), line("bc;")]);
    }

    #[test]
    fn test_partial_record_stays_buffered() {
        let mut framer = LineFramer::with_capacity(16);
        assert!(framer.feed(b"$GPG").is_empty());
        assert_eq!(framer.buffered(), b"$GPG");
        assert_eq!(framer.state(), FramerState::Filling);
        framer.reset();
        assert!(framer.is_empty());
    }
}
