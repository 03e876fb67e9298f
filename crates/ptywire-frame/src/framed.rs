use std::collections::VecDeque;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::FrameError;
use crate::reader::{StreamDemux, StreamEvent};

/// `tokio_util::codec` adapter for async hosts.
///
/// Decoding applies the same withholding policy as
/// [`StreamDemux`](crate::reader::StreamDemux); encoding accepts whole
/// [`Frame`]s. Wrap the PTY half in `Framed::new(io, WireCodec::new())`.
#[derive(Debug, Default)]
pub struct WireCodec {
    demux: StreamDemux,
    pending: VecDeque<StreamEvent>,
}

impl WireCodec {
    /// Create a codec with default size caps.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a codec with explicit size caps.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            demux: StreamDemux::with_config(config),
            pending: VecDeque::new(),
        }
    }
}

impl Decoder for WireCodec {
    type Item = StreamEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>, FrameError> {
        if !src.is_empty() {
            let chunk = src.split_to(src.len());
            self.pending.extend(self.demux.push(&chunk));
        }
        Ok(self.pending.pop_front())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>, FrameError> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        Ok(self.demux.finish())
    }
}

impl Encoder<Frame> for WireCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        let config = self.demux.config();
        if frame.pipe.len() > config.max_pipe_len {
            return Err(FrameError::PipeTooLong {
                len: frame.pipe.len(),
                max: config.max_pipe_len,
            });
        }
        if frame.payload.len() > config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: config.max_payload_size,
            });
        }
        encode_frame(&frame.pipe, &frame.payload, dst);
        Ok(())
    }
}
