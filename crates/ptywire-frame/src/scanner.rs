use tracing::debug;

use crate::codec::{scan_bytes, Frame, FrameConfig};

/// Stateful per-stream frame decoder.
///
/// One instance is owned by the task driving a stream's reads and is fed
/// each observed chunk. A successful [`scan`](Scanner::scan) stores the
/// extracted frame; a failed scan leaves the previously stored frame (if
/// any) untouched. Each call is chunk-local: there is no carry-over between
/// calls, so a frame split across two chunks is not recognized here — use
/// [`StreamDemux`](crate::reader::StreamDemux) when chunk boundaries are not
/// under your control.
#[derive(Debug, Default)]
pub struct Scanner {
    config: FrameConfig,
    last: Option<Frame>,
}

impl Scanner {
    /// Create a scanner with default size caps. Both accessors start empty.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a scanner with explicit size caps.
    pub fn with_config(config: FrameConfig) -> Self {
        Self { config, last: None }
    }

    /// Attempt to extract a frame from `input`.
    ///
    /// Returns `true` and stores the frame when `input` contains a
    /// well-formed frame; returns `false` otherwise, keeping prior state.
    /// Never panics, for arbitrary byte input.
    pub fn scan(&mut self, input: &[u8]) -> bool {
        match scan_bytes(input, &self.config) {
            Some(m) => {
                debug!(
                    pipe = %m.frame.pipe,
                    payload_len = m.frame.payload.len(),
                    "frame matched"
                );
                self.last = Some(m.frame);
                true
            }
            None => false,
        }
    }

    /// Pipe id of the most recent successful scan; empty before any match.
    pub fn pipe(&self) -> &str {
        self.last.as_ref().map(|f| f.pipe.as_str()).unwrap_or("")
    }

    /// Payload of the most recent successful scan; empty before any match.
    pub fn payload(&self) -> &[u8] {
        self.last.as_ref().map(|f| f.payload.as_ref()).unwrap_or(&[])
    }

    /// The most recent successful frame as an immutable value.
    pub fn last(&self) -> Option<&Frame> {
        self.last.as_ref()
    }

    /// Take the stored frame, resetting the scanner to its initial state.
    pub fn take(&mut self) -> Option<Frame> {
        self.last.take()
    }
}
