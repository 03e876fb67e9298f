use std::fs::File;
use std::io::Read;

use ptywire_frame::{FrameError, FrameReader, StreamEvent};
use tracing::debug;

use crate::cmd::WatchArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_frame, print_raw, OutputFormat};

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let source_label = args
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "stdin".to_string());

    let source: Box<dyn Read> = match &args.path {
        Some(path) => Box::new(
            File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?,
        ),
        None => Box::new(std::io::stdin()),
    };

    let extracted = watch_stream(source, &args, &source_label, format)?;
    debug!(frames = extracted, "watch finished");
    Ok(SUCCESS)
}

fn watch_stream<R: Read>(
    source: R,
    args: &WatchArgs,
    source_label: &str,
    format: OutputFormat,
) -> CliResult<usize> {
    let mut reader = FrameReader::new(source);
    let mut extracted = 0usize;

    loop {
        match reader.next_event() {
            Ok(StreamEvent::Frame(frame)) => {
                if !pipe_selected(args.pipes.as_deref(), &frame.pipe) {
                    continue;
                }
                print_frame(&frame, source_label, format);
                extracted += 1;
                if args.count.is_some_and(|limit| extracted >= limit) {
                    break;
                }
            }
            Ok(StreamEvent::Text(bytes)) => {
                if args.passthrough {
                    print_raw(&bytes);
                }
            }
            Err(FrameError::Closed) => break,
            Err(err) => return Err(frame_error("watch failed", err)),
        }
    }

    Ok(extracted)
}

fn pipe_selected(filter: Option<&[String]>, pipe: &str) -> bool {
    match filter {
        Some(pipes) => pipes.iter().any(|candidate| candidate == pipe),
        None => true,
    }
}
