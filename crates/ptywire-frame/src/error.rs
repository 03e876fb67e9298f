/// Errors that can occur while emitting or streaming frames.
///
/// Scan failures are not errors: a chunk without a well-formed frame is an
/// expected, frequent condition and is reported as `None`/`false` by the
/// decoding APIs. `FrameError` covers the I/O layers and encode-side caps.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The pipe identifier exceeds the configured maximum length.
    #[error("pipe id too long ({len} bytes, max {max})")]
    PipeTooLong { len: usize, max: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing the stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended.
    #[error("stream closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
