use std::path::PathBuf;
use std::time::Duration;

use chanwire_frame::{ChecksumType, MAX_FRAME_SIZE};
use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod inspect;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a call request into frames.
    Encode(EncodeArgs),
    /// Decode a stream of frames and print their fields.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Service being called.
    #[arg(long)]
    pub service: String,
    /// Endpoint name.
    #[arg(long, default_value = "")]
    pub arg1: String,
    /// Application headers.
    #[arg(long, default_value = "")]
    pub arg2: String,
    /// Body as a string.
    #[arg(long, conflicts_with = "arg3_file")]
    pub arg3: Option<String>,
    /// Read the body from a file.
    #[arg(long, value_name = "PATH", conflicts_with = "arg3")]
    pub arg3_file: Option<PathBuf>,
    /// Transport header (repeatable), e.g. `cn=caller`.
    #[arg(long = "header", short = 'H', value_name = "KEY=VALUE")]
    pub headers: Vec<String>,
    /// Frame id.
    #[arg(long, default_value = "1")]
    pub id: u32,
    /// Call timeout, sent as the TTL (e.g. 5s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Checksum type: none, crc32, crc32c.
    #[arg(long, default_value = "crc32")]
    pub checksum: ChecksumType,
    /// Largest frame to emit; longer args continue in CallRequestCont frames.
    #[arg(long, default_value_t = MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
    /// Write the frames to a file instead of stdout.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// File of concatenated frames, or `-` for stdin.
    pub input: PathBuf,
    /// Input is hex text rather than raw bytes.
    #[arg(long)]
    pub hex: bool,
    /// Stop after N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Reject frames larger than this.
    #[arg(long, default_value_t = MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }
}
