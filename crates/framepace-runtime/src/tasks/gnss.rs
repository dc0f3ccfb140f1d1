//! GNSS ingestion pipeline
//!
//! ```text
//! GnssSourceTask ──bytes──► BoundedQueue ──► NmeaFramerTask ──lines──► LineConsumerTask ──► LineSink
//! ```
//!
//! The source stands in for a UART receive interrupt: it replays a fixed set
//! of NMEA sentences one byte at a time, one burst per period. A burst ends
//! with a `$GPZDA` sentence. The framer task reassembles the sentences, the
//! consumer prints them as they arrive.

use std::sync::Arc;

use async_trait::async_trait;
use framepace_core::{
    BoundedQueue, FramepaceError, FramepaceResult, FramerEvent, LineFramer, RuntimeStats,
    SyncError,
};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, warn};

use super::PeriodicWork;
use crate::collaborators::LineSink;

/// Sentences replayed by the simulated receiver
pub const SIMULATED_SENTENCES: [&str; 6] = [
    "$GPGGA,123456.789,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
    "$GPGSA,A,3,05,07,08,12,19,26,28,,,,,,2.4,1.2,2.0*39",
    "$GPZDA,123456.789,04,07,2023,00,00*6A",
    "$GPGGA,223456.789,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*48",
    "$GPGSA,A,3,05,07,08,12,19,26,28,,,,,,2.4,1.2,2.0*3A",
    "$GPZDA,223456.789,04,07,2023,00,00*6B",
];

const BURST_END: &str = "$GPZDA";

// ----------------------------------------------------------------------------
// Source
// ----------------------------------------------------------------------------

/// Pushes one burst of sentences into the byte queue per period
pub struct GnssSourceTask {
    queue: BoundedQueue<u8>,
    sentences: Vec<String>,
    next: usize,
    put_timeout: Option<Duration>,
    stats: Arc<RuntimeStats>,
}

impl GnssSourceTask {
    pub fn new(queue: BoundedQueue<u8>, put_timeout: Option<Duration>, stats: Arc<RuntimeStats>) -> Self {
        Self::with_sentences(
            queue,
            SIMULATED_SENTENCES.iter().map(|s| s.to_string()).collect(),
            put_timeout,
            stats,
        )
    }

    pub fn with_sentences(
        queue: BoundedQueue<u8>,
        sentences: Vec<String>,
        put_timeout: Option<Duration>,
        stats: Arc<RuntimeStats>,
    ) -> Self {
        Self {
            queue,
            sentences,
            next: 0,
            put_timeout,
            stats,
        }
    }

    /// Transmit one sentence and its line ending. A byte that cannot be
    /// queued in time is dropped; the sentence continues.
    async fn transmit(&self, sentence: &str) -> Result<usize, SyncError> {
        let mut sent = 0;
        for byte in sentence.bytes().chain(*b"\r\n") {
            match self.queue.put(byte, self.put_timeout).await {
                Ok(()) => sent += 1,
                Err(e) if e.is_deadline_missed() => {
                    self.stats.record_queue_put_timeout();
                    warn!("GNSS byte dropped: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(sent)
    }
}

#[async_trait]
impl PeriodicWork for GnssSourceTask {
    async fn run_once(&mut self) -> FramepaceResult<()> {
        if self.sentences.is_empty() {
            return Ok(());
        }
        // A burst runs up to and including the next burst-end sentence, or
        // wraps once around the whole list if there is none
        for _ in 0..self.sentences.len() {
            let index = self.next;
            self.next = (self.next + 1) % self.sentences.len();

            let sentence = &self.sentences[index];
            let sent = self.transmit(sentence).await?;
            self.stats.record_bytes_produced(sent);

            if sentence.starts_with(BURST_END) {
                break;
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Framer
// ----------------------------------------------------------------------------

/// Drains the byte queue into a `LineFramer` and forwards complete lines
pub struct NmeaFramerTask {
    queue: BoundedQueue<u8>,
    framer: LineFramer,
    lines: mpsc::Sender<String>,
    get_timeout: Option<Duration>,
    stats: Arc<RuntimeStats>,
}

impl NmeaFramerTask {
    pub fn new(
        queue: BoundedQueue<u8>,
        framer: LineFramer,
        lines: mpsc::Sender<String>,
        get_timeout: Option<Duration>,
        stats: Arc<RuntimeStats>,
    ) -> Self {
        Self {
            queue,
            framer,
            lines,
            get_timeout,
            stats,
        }
    }

    async fn handle(&mut self, byte: u8) -> FramepaceResult<()> {
        match self.framer.push(byte) {
            Some(event @ FramerEvent::Line(_)) => {
                self.stats.record_line_framed();
                if let Some(text) = event.line_text() {
                    self.lines
                        .send(text)
                        .await
                        .map_err(|_| FramepaceError::channel_error("Line consumer stopped"))?;
                }
            }
            Some(FramerEvent::Overflow { discarded }) => {
                self.stats.record_framer_overflow();
                warn!(discarded, "line longer than {} bytes discarded", self.framer.capacity());
            }
            None => {}
        }
        Ok(())
    }
}

#[async_trait]
impl PeriodicWork for NmeaFramerTask {
    async fn run_once(&mut self) -> FramepaceResult<()> {
        let byte = match self.queue.get(self.get_timeout).await {
            Ok(byte) => byte,
            Err(e) => {
                if e.is_deadline_missed() {
                    self.stats.record_queue_get_timeout();
                }
                return Err(e.into());
            }
        };
        self.handle(byte).await?;

        // Whatever else is already queued, without waiting
        while let Some(byte) = self.queue.try_get() {
            self.handle(byte).await?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Consumer
// ----------------------------------------------------------------------------

/// Prints framed lines as they arrive
pub struct LineConsumerTask {
    lines: mpsc::Receiver<String>,
    sink: Arc<dyn LineSink>,
    idle_timeout: Option<Duration>,
    stats: Arc<RuntimeStats>,
}

impl LineConsumerTask {
    pub fn new(
        lines: mpsc::Receiver<String>,
        sink: Arc<dyn LineSink>,
        idle_timeout: Option<Duration>,
        stats: Arc<RuntimeStats>,
    ) -> Self {
        Self {
            lines,
            sink,
            idle_timeout,
            stats,
        }
    }
}

#[async_trait]
impl PeriodicWork for LineConsumerTask {
    async fn run_once(&mut self) -> FramepaceResult<()> {
        let received = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.lines.recv())
                .await
                .map_err(|_| SyncError::deadline_missed("lines", limit))?,
            None => self.lines.recv().await,
        };
        let line = received.ok_or_else(|| FramepaceError::channel_error("Line channel closed"))?;

        self.sink.write_line(&line);
        self.stats.record_line_consumed();
        debug!(len = line.len(), "line consumed");
        Ok(())
    }
}
