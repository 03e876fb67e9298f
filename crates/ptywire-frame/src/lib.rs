//! Out-of-band command framing for terminal streams.
//!
//! A REPL running inside a terminal writes its normal output to the stream,
//! but can additionally embed a delimited command frame that a supervising
//! host detects and extracts without disturbing rendering. Every frame is:
//! - An APC introducer (`ESC _ pw ;`) terminal emulators swallow silently
//! - A pipe id routing the frame to a logical side channel
//! - A `;` separator and a percent-escaped payload
//! - A string terminator (`ESC \`)
//!
//! Reserved bytes inside fields are escaped, so arbitrary pipe ids and
//! payloads round-trip and the grammar is unambiguous. Scanning is
//! fail-closed: anything short of a complete well-formed frame is ordinary
//! terminal output.

pub mod codec;
pub mod error;
pub mod reader;
pub mod scanner;
pub mod writer;

#[cfg(feature = "async")]
pub mod framed;

pub use codec::{
    encode_frame, frame_text, scan_bytes, Frame, FrameConfig, FrameMatch, DEFAULT_MAX_PAYLOAD,
    DEFAULT_MAX_PIPE, INTRODUCER, SEPARATOR, TERMINATOR,
};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, StreamDemux, StreamEvent};
pub use scanner::Scanner;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use framed::WireCodec;
