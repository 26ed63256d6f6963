use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use chanwire_frame::{ChecksumType, LazyFrame};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Fields of one frame, read through its lazy accessors.
#[derive(Serialize, Debug, Default)]
pub struct FrameSummary {
    pub id: u32,
    pub frame_type: &'static str,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg1: Option<String>,
}

impl FrameSummary {
    /// Summarize `frame`. Fields the frame type does not carry stay empty.
    pub fn from_lazy<B: AsRef<[u8]>>(frame: &LazyFrame<B>) -> Self {
        let headers = frame.read_headers().ok().map(|(_, headers)| headers);
        let arg1 = frame
            .read_arg1(headers.as_ref())
            .ok()
            .map(|(_, arg1)| preview(arg1));
        Self {
            id: frame.id(),
            frame_type: frame.frame_type().name(),
            size: frame.size(),
            flags: frame.read_flags().ok().map(|(_, flags)| flags),
            terminal: frame.is_frame_terminal().ok(),
            ttl: frame.read_ttl().ok().map(|(_, ttl)| ttl),
            service: frame.read_service().ok().map(|(_, s)| s.to_string()),
            code: frame.read_code().ok().map(|(_, code)| code),
            message: frame.read_message().ok().map(|(_, m)| m.to_string()),
            checksum: frame.read_checksum().ok().map(|(_, c)| match c.kind {
                ChecksumType::None => c.kind.name().to_string(),
                kind => format!("{kind}:{:08x}", c.value),
            }),
            headers: headers.map(|headers| {
                headers
                    .iter()
                    .map(|(k, v)| (preview(k), preview(v)))
                    .collect()
            }),
            arg1,
        }
    }

    fn detail(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ttl) = self.ttl {
            parts.push(format!("ttl={ttl}"));
        }
        if let Some(code) = self.code {
            parts.push(format!("code={code:#04x}"));
        }
        if let Some(message) = &self.message {
            parts.push(format!("message={message}"));
        }
        if let Some(checksum) = &self.checksum {
            parts.push(format!("csum={checksum}"));
        }
        if let Some(headers) = &self.headers {
            for (k, v) in headers {
                parts.push(format!("{k}={v}"));
            }
        }
        parts.join(" ")
    }
}

pub fn print_frames(frames: &[(FrameSummary, Vec<u8>)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for (summary, _) in frames {
                println!(
                    "{}",
                    serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "TYPE", "SIZE", "FLAGS", "SERVICE", "ARG1", "DETAIL"]);
            for (summary, _) in frames {
                table.add_row(vec![
                    summary.id.to_string(),
                    summary.frame_type.to_string(),
                    summary.size.to_string(),
                    summary.flags.map(|f| format!("{f:#04x}")).unwrap_or_default(),
                    summary.service.clone().unwrap_or_default(),
                    summary.arg1.clone().unwrap_or_default(),
                    summary.detail(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (summary, _) in frames {
                println!(
                    "id={} type={} size={} {}",
                    summary.id,
                    summary.frame_type,
                    summary.size,
                    summary.detail()
                );
            }
        }
        OutputFormat::Raw => {
            for (_, bytes) in frames {
                print_raw(bytes);
            }
        }
    }
}

#[derive(Serialize, Debug)]
pub struct EncodeSummary {
    pub id: u32,
    pub service: String,
    pub endpoint: String,
    pub frames: usize,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

pub fn print_encoded(summary: &EncodeSummary, bytes: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Encoded call:");
            println!("  Id:       {}", summary.id);
            println!("  Service:  {}", summary.service);
            println!("  Endpoint: {}", summary.endpoint);
            println!("  Frames:   {}", summary.frames);
            println!("  Bytes:    {}", summary.bytes);
            if let Some(path) = &summary.output {
                println!("  Output:   {path}");
            }
            if let Some(hex) = &summary.hex {
                println!("  Hex:      {hex}");
            }
        }
        OutputFormat::Raw => print_raw(bytes),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn preview(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};
    use chanwire_frame::{
        encode_frame, CallRequest, Checksum, ErrorCode, ErrorResponse, Frame, FrameBody, Headers,
    };

    fn lazy(frame: &Frame) -> LazyFrame<BytesMut> {
        let mut buf = BytesMut::new();
        encode_frame(frame, &mut buf).unwrap();
        LazyFrame::parse(buf).unwrap()
    }

    #[test]
    fn call_request_summary() {
        let frame = Frame::new(
            3,
            FrameBody::CallRequest(CallRequest {
                flags: 0,
                ttl: 99,
                service: "castle".into(),
                headers: Headers::new().with("cn", "mario"),
                checksum: Checksum::none(),
                args: vec![Bytes::from_static(b"door")],
                ..CallRequest::default()
            }),
        );
        let summary = FrameSummary::from_lazy(&lazy(&frame));
        assert_eq!(summary.frame_type, "call-request");
        assert_eq!(summary.ttl, Some(99));
        assert_eq!(summary.service.as_deref(), Some("castle"));
        assert_eq!(summary.arg1.as_deref(), Some("door"));
        assert_eq!(summary.terminal, Some(true));
        assert_eq!(summary.checksum.as_deref(), Some("none"));
        assert_eq!(
            summary.headers.unwrap().get("cn").map(String::as_str),
            Some("mario")
        );
    }

    #[test]
    fn error_summary_skips_call_fields() {
        let frame = Frame::new(
            8,
            FrameBody::ErrorResponse(ErrorResponse {
                code: ErrorCode::Busy,
                message: "later".into(),
                ..ErrorResponse::default()
            }),
        );
        let summary = FrameSummary::from_lazy(&lazy(&frame));
        assert_eq!(summary.code, Some(ErrorCode::Busy.code()));
        assert_eq!(summary.message.as_deref(), Some("later"));
        assert!(summary.flags.is_none());
        assert!(summary.arg1.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("service").is_none());
        assert_eq!(json["id"], 8);
    }
}
