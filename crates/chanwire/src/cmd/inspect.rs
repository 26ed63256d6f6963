use std::fs;
use std::io::{Cursor, Read};

use chanwire_frame::{FrameConfig, FrameError, FrameReader};
use tracing::debug;

use crate::cmd::InspectArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frames, FrameSummary, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let input = read_input(&args)?;
    let config = FrameConfig {
        max_frame_size: args.max_frame_size,
        ..FrameConfig::default()
    };
    let mut reader = FrameReader::with_config(Cursor::new(input), config);

    let mut frames = Vec::new();
    while args.count.is_none_or(|count| frames.len() < count) {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) if reader.buffered() == 0 => break,
            Err(err) => return Err(frame_error("read failed", err)),
        };
        frame
            .read_body()
            .map_err(|err| frame_error(&format!("frame {} is invalid", frame.id()), err.into()))?;
        frames.push((FrameSummary::from_lazy(&frame), frame.as_bytes().to_vec()));
    }
    debug!(frames = frames.len(), "inspected input");

    print_frames(&frames, format);
    Ok(SUCCESS)
}

fn read_input(args: &InspectArgs) -> CliResult<Vec<u8>> {
    let raw = if args.input.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|err| io_error("failed reading stdin", err))?;
        buf
    } else {
        fs::read(&args.input)
            .map_err(|err| io_error(&format!("failed reading {}", args.input.display()), err))?
    };
    if !args.hex {
        return Ok(raw);
    }
    let text: String = String::from_utf8_lossy(&raw)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    hex::decode(text)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex input: {err}")))
}
