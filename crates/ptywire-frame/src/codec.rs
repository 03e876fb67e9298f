use std::ops::Range;

use bytes::{BufMut, Bytes, BytesMut};

/// Frame introducer: APC (`ESC _`) with a `pw;` tag, 5 bytes.
pub const INTRODUCER: &[u8] = b"\x1b_pw;";

/// Separator between the pipe id and the payload.
pub const SEPARATOR: u8 = b';';

/// String terminator (7-bit ST): `ESC \`.
pub const TERMINATOR: &[u8] = b"\x1b\\";

/// Escape character for reserved bytes inside fields.
pub const ESCAPE: u8 = b'%';

const ESC: u8 = 0x1b;

/// Default maximum decoded pipe id length: 256 bytes.
pub const DEFAULT_MAX_PIPE: usize = 256;

/// Default maximum decoded payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A command frame extracted from (or destined for) a terminal stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Routing key for the logical side channel this frame belongs to.
    pub pipe: String,
    /// The command or result content carried by the frame.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(pipe: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            pipe: pipe.into(),
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame after escaping.
    pub fn encoded_len(&self) -> usize {
        INTRODUCER.len()
            + escaped_len(self.pipe.as_bytes())
            + 1
            + escaped_len(&self.payload)
            + TERMINATOR.len()
    }
}

/// A successful scan: the frame plus the byte span it occupied in the input.
///
/// The span lets stream tooling splice the frame out of pass-through output.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMatch {
    pub frame: Frame,
    pub span: Range<usize>,
}

/// Size caps applied when decoding and when buffering for emission.
///
/// Candidates whose decoded fields exceed a cap are treated as malformed.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum decoded pipe id length in bytes. Default: 256.
    pub max_pipe_len: usize,
    /// Maximum decoded payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_pipe_len: DEFAULT_MAX_PIPE,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Encode a frame into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌────────────────┬─────────────┬─────────┬─────────────┬────────────┐
/// │ Introducer     │ Pipe id     │ Sep     │ Payload     │ Terminator │
/// │ ESC _ p w ;    │ (escaped)   │ ;       │ (escaped)   │ ESC \      │
/// └────────────────┴─────────────┴─────────┴─────────────┴────────────┘
/// ```
///
/// Reserved bytes (`%`, `;`, ESC) are percent-escaped inside both fields, so
/// the encoded frame contains no bare ESC except in the introducer and
/// terminator and the grammar is unambiguous for arbitrary field content.
pub fn encode_frame(pipe: &str, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(
        INTRODUCER.len()
            + escaped_len(pipe.as_bytes())
            + 1
            + escaped_len(payload)
            + TERMINATOR.len(),
    );
    dst.put_slice(INTRODUCER);
    escape_into(pipe.as_bytes(), dst);
    dst.put_u8(SEPARATOR);
    escape_into(payload, dst);
    dst.put_slice(TERMINATOR);
}

/// Encode a frame as a `String`, ready to be written into a terminal stream.
///
/// Escaping rewrites only ASCII bytes, so text fields stay valid UTF-8.
pub fn frame_text(pipe: &str, payload: &str) -> String {
    let mut buf = BytesMut::new();
    encode_frame(pipe, payload.as_bytes(), &mut buf);
    // Only ASCII bytes are rewritten by escaping; str fields stay UTF-8.
    String::from_utf8(buf.to_vec()).expect("encoded frame from str fields is UTF-8")
}

/// Scan `input` for the first well-formed frame.
///
/// Returns `None` when no complete frame is present. A candidate that starts
/// with the introducer but is malformed (no terminator in this input, bad
/// escape, bare reserved byte, oversized field, non-UTF-8 pipe id) is
/// skipped and the search resumes one byte past its introducer, so noise
/// that merely resembles a frame cannot mask a real frame later in the
/// input. Frames past the first are ignored.
///
/// Pure: no state is retained between calls, and arbitrary byte input
/// (including ANSI control sequences and truncated introducers) never
/// panics.
pub fn scan_bytes(input: &[u8], config: &FrameConfig) -> Option<FrameMatch> {
    let mut from = 0;
    while let Some(pos) = find(&input[from..], INTRODUCER) {
        let start = from + pos;
        let body_start = start + INTRODUCER.len();
        if let Some((frame, consumed)) = parse_body(&input[body_start..], config) {
            return Some(FrameMatch {
                frame,
                span: start..body_start + consumed,
            });
        }
        from = start + 1;
    }
    None
}

/// Parse `<pipe>;<payload>ESC\` from the start of `body`.
///
/// Returns the frame and the number of bytes consumed, terminator included.
pub(crate) fn parse_body(body: &[u8], config: &FrameConfig) -> Option<(Frame, usize)> {
    let term = find(body, TERMINATOR)?;
    let sep = body[..term].iter().position(|&b| b == SEPARATOR)?;

    let pipe = unescape(&body[..sep], config.max_pipe_len)?;
    let payload = unescape(&body[sep + 1..term], config.max_payload_size)?;
    let pipe = String::from_utf8(pipe).ok()?;

    let frame = Frame {
        pipe,
        payload: payload.into(),
    };
    Some((frame, term + TERMINATOR.len()))
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn escaped_len(field: &[u8]) -> usize {
    field
        .iter()
        .map(|&b| match b {
            ESCAPE | SEPARATOR | ESC => 3,
            _ => 1,
        })
        .sum()
}

fn escape_into(field: &[u8], dst: &mut BytesMut) {
    for &b in field {
        match b {
            ESCAPE => dst.put_slice(b"%25"),
            SEPARATOR => dst.put_slice(b"%3B"),
            ESC => dst.put_slice(b"%1B"),
            other => dst.put_u8(other),
        }
    }
}

/// Decode a percent-escaped field. Reserved bytes must arrive escaped; a
/// bare ESC or separator, a truncated or non-hex escape, or a decoded length
/// above `max_len` rejects the candidate.
fn unescape(field: &[u8], max_len: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;
    while i < field.len() {
        match field[i] {
            ESCAPE => {
                let hi = hex_val(*field.get(i + 1)?)?;
                let lo = hex_val(*field.get(i + 2)?)?;
                out.push(hi << 4 | lo);
                i += 3;
            }
            ESC | SEPARATOR => return None,
            other => {
                out.push(other);
                i += 1;
            }
        }
        if out.len() > max_len {
            return None;
        }
    }
    Some(out)
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
