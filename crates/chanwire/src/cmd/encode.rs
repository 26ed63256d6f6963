use std::fs;

use bytes::Bytes;
use chanwire_frame::{Frame, FrameConfig, FrameWriter, Headers};
use chanwire_request::{Channel, OutRequest, RequestOptions};
use tracing::debug;

use crate::cmd::{parse_duration, EncodeArgs};
use crate::exit::{frame_error, io_error, request_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_encoded, EncodeSummary, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let options = RequestOptions {
        service: args.service.clone(),
        headers: parse_headers(&args.headers)?,
        timeout: parse_duration(&args.timeout)?,
        checksum_type: args.checksum,
        max_frame_size: args.max_frame_size,
        ..RequestOptions::default()
    };
    let arg3 = resolve_arg3(&args)?;

    let mut frames: Vec<Frame> = Vec::new();
    let mut req = OutRequest::new(args.id, options, Channel::default());
    req.send(
        &mut frames,
        Bytes::from(args.arg1.clone()),
        Bytes::from(args.arg2.clone()),
        arg3,
    )
    .map_err(|err| request_error("encode failed", err))?;

    let config = FrameConfig {
        max_frame_size: args.max_frame_size,
        ..FrameConfig::default()
    };
    let mut writer = FrameWriter::with_config(Vec::new(), config);
    writer
        .write_frames(&frames)
        .map_err(|err| frame_error("encode failed", err))?;
    let bytes = writer.into_inner();
    debug!(frames = frames.len(), bytes = bytes.len(), "encoded call");

    let output = match &args.out {
        Some(path) => {
            fs::write(path, &bytes).map_err(|err| {
                io_error(&format!("failed writing {}", path.display()), err)
            })?;
            Some(path.display().to_string())
        }
        None => None,
    };
    let summary = EncodeSummary {
        id: args.id,
        service: args.service,
        endpoint: req.endpoint().to_string(),
        frames: frames.len(),
        bytes: bytes.len(),
        hex: output.is_none().then(|| hex::encode(&bytes)),
        output,
    };

    match (&summary.output, format) {
        // raw bytes already went to the file
        (Some(_), OutputFormat::Raw) => {}
        _ => print_encoded(&summary, &bytes, format),
    }
    Ok(SUCCESS)
}

fn parse_headers(raw: &[String]) -> CliResult<Headers> {
    let mut headers = Headers::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(CliError::new(
                USAGE,
                format!("header must be KEY=VALUE: {entry}"),
            ));
        };
        if key.is_empty() {
            return Err(CliError::new(USAGE, format!("header key is empty: {entry}")));
        }
        headers.insert(key, value);
    }
    Ok(headers)
}

fn resolve_arg3(args: &EncodeArgs) -> CliResult<Bytes> {
    if let Some(arg3) = &args.arg3 {
        return Ok(Bytes::from(arg3.clone()));
    }
    if let Some(path) = &args.arg3_file {
        return fs::read(path)
            .map(Bytes::from)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Bytes::new())
}
