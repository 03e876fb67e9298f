use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::codec::{find, parse_body, Frame, FrameConfig, INTRODUCER, TERMINATOR};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// One unit of demultiplexed stream content.
///
/// Ordinary output may be split across any number of `Text` events; only the
/// overall byte sequence is guaranteed.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Ordinary terminal output, to be passed through untouched.
    Text(Bytes),
    /// An extracted command frame.
    Frame(Frame),
}

/// Push-based frame demultiplexer with chunk reassembly.
///
/// The [`Scanner`](crate::scanner::Scanner) is chunk-local by contract. When
/// chunk boundaries are not under the caller's control (a PTY read can split
/// a frame anywhere), `StreamDemux` owns the buffering policy: text before
/// an introducer is released immediately; from the first byte of a possibly
/// partial introducer onward, bytes are withheld until the frame completes,
/// fails, or outgrows the size cap. A failed or oversized candidate is
/// released as ordinary text, so a false start never corrupts pass-through
/// output.
#[derive(Debug, Default)]
pub struct StreamDemux {
    buf: BytesMut,
    config: FrameConfig,
}

enum FrameStart {
    /// No introducer in the buffer.
    None,
    /// A buffer suffix at this offset is a proper prefix of the introducer.
    Partial(usize),
    /// A complete introducer at this offset.
    Full(usize),
}

impl StreamDemux {
    /// Create a demux with default size caps.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a demux with explicit size caps.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Feed one chunk and collect the events it releases.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        loop {
            match frame_start(&self.buf) {
                FrameStart::None => {
                    if !self.buf.is_empty() {
                        let len = self.buf.len();
                        events.push(StreamEvent::Text(self.buf.split_to(len).freeze()));
                    }
                    break;
                }
                FrameStart::Partial(start) => {
                    if start > 0 {
                        events.push(StreamEvent::Text(self.buf.split_to(start).freeze()));
                    }
                    break;
                }
                FrameStart::Full(start) => {
                    if start > 0 {
                        events.push(StreamEvent::Text(self.buf.split_to(start).freeze()));
                    }
                    let body = &self.buf[INTRODUCER.len()..];
                    match parse_body(body, &self.config) {
                        Some((frame, consumed)) => {
                            trace!(
                                pipe = %frame.pipe,
                                payload_len = frame.payload.len(),
                                "frame demultiplexed"
                            );
                            self.buf.advance(INTRODUCER.len() + consumed);
                            events.push(StreamEvent::Frame(frame));
                        }
                        None if find(body, TERMINATOR).is_some()
                            || self.buf.len() > self.withhold_cap() =>
                        {
                            // Dead candidate: release the introducer's ESC as
                            // text and rescan the rest.
                            events.push(StreamEvent::Text(self.buf.split_to(1).freeze()));
                        }
                        None => break,
                    }
                }
            }
        }
        events
    }

    /// Flush withheld bytes at end of stream.
    ///
    /// An unterminated candidate is by definition ordinary output.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.buf.is_empty() {
            return None;
        }
        let len = self.buf.len();
        Some(StreamEvent::Text(self.buf.split_to(len).freeze()))
    }

    /// Current demux configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Upper bound on withheld bytes: a fully escaped frame at the caps.
    fn withhold_cap(&self) -> usize {
        INTRODUCER.len()
            + 3 * (self.config.max_pipe_len + self.config.max_payload_size + 1)
            + TERMINATOR.len()
    }
}

fn frame_start(buf: &[u8]) -> FrameStart {
    if let Some(pos) = find(buf, INTRODUCER) {
        return FrameStart::Full(pos);
    }
    // Only a suffix of the buffer can still grow into an introducer.
    for k in (1..INTRODUCER.len()).rev() {
        if k <= buf.len() && buf[buf.len() - k..] == INTRODUCER[..k] {
            return FrameStart::Partial(buf.len() - k);
        }
    }
    FrameStart::None
}

/// Reads demultiplexed events from any `Read` stream.
///
/// Handles partial reads internally — frames split across reads are
/// reassembled, and surrounding output is surfaced as text events.
pub struct FrameReader<T> {
    inner: T,
    demux: StreamDemux,
    pending: VecDeque<StreamEvent>,
    eof: bool,
}

impl<T: Read> FrameReader<T> {
    /// Create a frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            demux: StreamDemux::with_config(config),
            pending: VecDeque::new(),
            eof: false,
        }
    }

    /// Read the next event (blocking).
    ///
    /// Returns `Err(FrameError::Closed)` once the stream is exhausted.
    pub fn next_event(&mut self) -> Result<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }
            if self.eof {
                return Err(FrameError::Closed);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.eof = true;
                if let Some(event) = self.demux.finish() {
                    self.pending.push_back(event);
                }
                continue;
            }

            self.pending.extend(self.demux.push(&chunk[..read]));
        }
    }

    /// Read the next frame, discarding intervening text (blocking).
    pub fn next_frame(&mut self) -> Result<Frame> {
        loop {
            match self.next_event()? {
                StreamEvent::Frame(frame) => return Ok(frame),
                StreamEvent::Text(_) => continue,
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.demux.config()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::frame_text;

    fn collect_text(events: &[StreamEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Text(bytes) => Some(bytes.as_ref()),
                StreamEvent::Frame(_) => None,
            })
            .collect::<Vec<_>>()
            .concat()
    }

    fn collect_frames(events: &[StreamEvent]) -> Vec<Frame> {
        events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Frame(frame) => Some(frame.clone()),
                StreamEvent::Text(_) => None,
            })
            .collect()
    }

    #[test]
    fn text_only_passes_through() {
        let mut demux = StreamDemux::new();
        let events = demux.push(b"plain output\r\n");
        assert_eq!(collect_text(&events), b"plain output\r\n");
        assert!(collect_frames(&events).is_empty());
        assert!(demux.finish().is_none());
    }

    #[test]
    fn frame_with_surrounding_text() {
        let mut stream = b"before ".to_vec();
        stream.extend_from_slice(frame_text("ab12", "ls()").as_bytes());
        stream.extend_from_slice(b" after");

        let mut demux = StreamDemux::new();
        let mut events = demux.push(&stream);
        if let Some(event) = demux.finish() {
            events.push(event);
        }

        assert_eq!(collect_text(&events), b"before  after");
        let frames = collect_frames(&events);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pipe, "ab12");
        assert_eq!(frames[0].payload.as_ref(), b"ls()");
    }

    #[test]
    fn frame_split_at_every_byte_boundary() {
        let mut stream = b"head".to_vec();
        stream.extend_from_slice(frame_text("pipe;1", "pay%load\x1b").as_bytes());
        stream.extend_from_slice(b"tail");

        for split in 0..=stream.len() {
            let mut demux = StreamDemux::new();
            let mut events = demux.push(&stream[..split]);
            events.extend(demux.push(&stream[split..]));
            if let Some(event) = demux.finish() {
                events.push(event);
            }

            let frames = collect_frames(&events);
            assert_eq!(frames.len(), 1, "split at {split}");
            assert_eq!(frames[0].pipe, "pipe;1");
            assert_eq!(frames[0].payload.as_ref(), b"pay%load\x1b");
            assert_eq!(collect_text(&events), b"headtail", "split at {split}");
        }
    }

    #[test]
    fn partial_introducer_withheld_until_resolved() {
        let mut demux = StreamDemux::new();

        let events = demux.push(b"output\x1b_p");
        assert_eq!(collect_text(&events), b"output");

        // The held-back bytes turn out to be a real frame.
        let events = demux.push(b"w;id;run()\x1b\\done");
        let frames = collect_frames(&events);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pipe, "id");
        assert_eq!(collect_text(&events), b"done");
    }

    #[test]
    fn partial_introducer_flushed_at_finish() {
        let mut demux = StreamDemux::new();
        let events = demux.push(b"output\x1b_pw;unterminated");
        assert_eq!(collect_text(&events), b"output");

        match demux.finish() {
            Some(StreamEvent::Text(bytes)) => {
                assert_eq!(bytes.as_ref(), b"\x1b_pw;unterminated");
            }
            other => panic!("expected flushed text, got {other:?}"),
        }
    }

    #[test]
    fn malformed_candidate_released_as_text() {
        // Terminated candidate with a bare ';' in the payload: dead on
        // arrival, every byte must come back out as text.
        let input = b"a\x1b_pw;p;x;y\x1b\\b".to_vec();
        let mut demux = StreamDemux::new();
        let mut events = demux.push(&input);
        if let Some(event) = demux.finish() {
            events.push(event);
        }
        assert!(collect_frames(&events).is_empty());
        assert_eq!(collect_text(&events), input);
    }

    #[test]
    fn frame_nested_after_false_start_is_found() {
        let mut stream = b"\x1b_pw;false-start ".to_vec();
        stream.extend_from_slice(frame_text("real", "x").as_bytes());

        let mut demux = StreamDemux::new();
        let mut events = demux.push(&stream);
        if let Some(event) = demux.finish() {
            events.push(event);
        }

        let frames = collect_frames(&events);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pipe, "real");
        assert_eq!(collect_text(&events), b"\x1b_pw;false-start ");
    }

    #[test]
    fn multiple_frames_surface_in_order() {
        let mut stream = frame_text("one", "1").into_bytes();
        stream.extend_from_slice(b"mid");
        stream.extend_from_slice(frame_text("two", "2").as_bytes());

        let mut demux = StreamDemux::new();
        let events = demux.push(&stream);
        let frames = collect_frames(&events);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].pipe, "one");
        assert_eq!(frames[1].pipe, "two");
        assert_eq!(collect_text(&events), b"mid");
    }

    #[test]
    fn oversized_candidate_released_as_text() {
        let config = FrameConfig {
            max_pipe_len: 4,
            max_payload_size: 8,
        };
        let mut demux = StreamDemux::with_config(config);

        let mut stream = b"\x1b_pw;p;".to_vec();
        stream.extend_from_slice(&vec![b'x'; 256]);
        let mut events = demux.push(&stream);
        if let Some(event) = demux.finish() {
            events.push(event);
        }

        assert!(collect_frames(&events).is_empty());
        assert_eq!(collect_text(&events), stream);
    }

    #[test]
    fn reader_yields_events_and_closes() {
        let mut stream = b"echo ".to_vec();
        stream.extend_from_slice(frame_text("ab", "pwd()").as_bytes());
        stream.extend_from_slice(b"\r\n");

        let mut reader = FrameReader::new(Cursor::new(stream));
        let mut text = Vec::new();
        let mut frames = Vec::new();
        loop {
            match reader.next_event() {
                Ok(StreamEvent::Text(bytes)) => text.extend_from_slice(&bytes),
                Ok(StreamEvent::Frame(frame)) => frames.push(frame),
                Err(FrameError::Closed) => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        assert_eq!(text, b"echo \r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pipe, "ab");
        assert_eq!(frames[0].payload.as_ref(), b"pwd()");
    }

    #[test]
    fn reader_reassembles_byte_by_byte() {
        let stream = frame_text("slow", "one.byte.at.a.time").into_bytes();
        let reader = ByteByByteReader {
            bytes: stream,
            pos: 0,
        };
        let mut reader = FrameReader::new(reader);

        let frame = reader.next_frame().unwrap();
        assert_eq!(frame.pipe, "slow");
        assert_eq!(frame.payload.as_ref(), b"one.byte.at.a.time");
        assert!(matches!(reader.next_event(), Err(FrameError::Closed)));
    }

    #[test]
    fn next_frame_skips_text() {
        let mut stream = b"noise\r\n".to_vec();
        stream.extend_from_slice(frame_text("ab", "x").as_bytes());

        let mut reader = FrameReader::new(Cursor::new(stream));
        let frame = reader.next_frame().unwrap();
        assert_eq!(frame.pipe, "ab");
    }

    #[test]
    fn empty_stream_closes_immediately() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(reader.next_event(), Err(FrameError::Closed)));
    }

    #[test]
    fn interrupted_read_retries() {
        let stream = frame_text("ok", "retry").into_bytes();
        let reader = InterruptedThenData {
            interrupted: false,
            bytes: stream,
            pos: 0,
        };
        let mut reader = FrameReader::new(reader);
        let frame = reader.next_frame().unwrap();
        assert_eq!(frame.pipe, "ok");
    }

    #[test]
    fn io_error_propagates() {
        let reader = WouldBlockReader;
        let mut reader = FrameReader::new(reader);
        let err = reader.next_event().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _ = reader.config();
        let _inner = reader.into_inner();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct WouldBlockReader;

    impl Read for WouldBlockReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }
}
