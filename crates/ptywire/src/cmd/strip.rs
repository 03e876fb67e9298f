use std::fs::File;
use std::io::{self, Read, Write};

use ptywire_frame::{FrameError, FrameReader, StreamEvent};
use tracing::debug;

use crate::cmd::StripArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};

pub fn run(args: StripArgs) -> CliResult<i32> {
    let source: Box<dyn Read> = match &args.path {
        Some(path) => Box::new(
            File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?,
        ),
        None => Box::new(io::stdin()),
    };

    let stdout = io::stdout();
    strip_stream(source, stdout.lock())?;
    Ok(SUCCESS)
}

fn strip_stream<R: Read, W: Write>(source: R, mut sink: W) -> CliResult<()> {
    let mut reader = FrameReader::new(source);

    loop {
        match reader.next_event() {
            Ok(StreamEvent::Text(bytes)) => {
                sink.write_all(&bytes)
                    .map_err(|err| io_error("write failed", err))?;
            }
            Ok(StreamEvent::Frame(frame)) => {
                debug!(
                    pipe = %frame.pipe,
                    payload_len = frame.payload.len(),
                    "frame stripped"
                );
            }
            Err(FrameError::Closed) => break,
            Err(err) => return Err(frame_error("strip failed", err)),
        }
    }

    sink.flush().map_err(|err| io_error("flush failed", err))
}
