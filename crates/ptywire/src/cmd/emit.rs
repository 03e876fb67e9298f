use std::fs;
use std::io::{self, Read};

use ptywire_frame::FrameWriter;

use crate::cmd::EmitArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: EmitArgs) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;

    let stdout = io::stdout();
    let mut writer = FrameWriter::new(stdout.lock());
    writer
        .emit(&args.pipe, &payload)
        .map_err(|err| frame_error("emit failed", err))?;

    Ok(SUCCESS)
}

fn resolve_payload(args: &EmitArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }

    let mut payload = Vec::new();
    io::stdin()
        .read_to_end(&mut payload)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(json: Option<&str>, data: Option<&str>) -> EmitArgs {
        EmitArgs {
            pipe: "0123abcd".to_string(),
            json: json.map(str::to_string),
            data: data.map(str::to_string),
            file: None,
        }
    }

    #[test]
    fn data_payload_passes_through() {
        let payload = resolve_payload(&args(None, Some("getwd()"))).unwrap();
        assert_eq!(payload, b"getwd()");
    }

    #[test]
    fn json_payload_is_validated() {
        let payload = resolve_payload(&args(Some(r#"{"run":"pwd"}"#), None)).unwrap();
        assert_eq!(payload, br#"{"run":"pwd"}"#);

        let err = resolve_payload(&args(Some("{not json"), None)).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn missing_file_maps_to_io_error() {
        let args = EmitArgs {
            pipe: "p".to_string(),
            json: None,
            data: None,
            file: Some("/nonexistent/ptywire-payload".into()),
        };
        assert!(resolve_payload(&args).is_err());
    }
}
