//! Call bodies: the four frame types that carry argument chunks.

use std::sync::OnceLock;

use bytes::Bytes;
use chanwire_rw::{
    check_remaining, Field, LengthResult, ReadResult, Rw, RwError, StringRw, StructRw,
    VariableBufferRw, WriteResult, UINT16_BE, UINT32_BE, UINT8,
};

use crate::checksum::{Checksum, ChecksumRw};
use crate::headers::{Headers, CALL_HEADERS};
use crate::trace::{Tracing, TracingRw};
use crate::types::FLAG_FRAGMENT;

/// Most argument chunks a single call frame may carry.
pub const MAX_ARGS: usize = 3;

/// Service name codec (`service~1`).
pub const SERVICE: StringRw<u8> = StringRw::new(UINT8);

/// Argument chunk codec (`arg~2`).
pub const ARG: VariableBufferRw<u16> = VariableBufferRw::new(UINT16_BE);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallRequest {
    pub flags: u8,
    pub ttl: u32,
    pub tracing: Tracing,
    pub service: String,
    pub headers: Headers,
    pub checksum: Checksum,
    pub args: Vec<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallResponse {
    pub flags: u8,
    pub code: u8,
    pub tracing: Tracing,
    pub headers: Headers,
    pub checksum: Checksum,
    pub args: Vec<Bytes>,
}

/// Body of both CallRequestCont and CallResponseCont.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallCont {
    pub flags: u8,
    pub checksum: Checksum,
    pub args: Vec<Bytes>,
}

impl CallRequest {
    pub fn is_terminal(&self) -> bool {
        self.flags & FLAG_FRAGMENT == 0
    }
}

impl CallResponse {
    pub fn is_terminal(&self) -> bool {
        self.flags & FLAG_FRAGMENT == 0
    }
}

impl CallCont {
    pub fn new(flags: u8, checksum: Checksum, args: Vec<Bytes>) -> Self {
        Self {
            flags,
            checksum,
            args,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.flags & FLAG_FRAGMENT == 0
    }
}

/// Argument chunks running to the end of the body.
///
/// The buffer handed to [`Rw::read_from`] must end where the body ends; the
/// frame codec guarantees this by bounding the slice to the frame size.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgsRw;

impl Rw for ArgsRw {
    type Value = Vec<Bytes>;

    fn byte_length(&self, value: &Vec<Bytes>) -> LengthResult {
        if value.len() > MAX_ARGS {
            return Err(RwError::invalid(
                format!("{} args exceed the limit of {MAX_ARGS}", value.len()),
                0,
            ));
        }
        value
            .iter()
            .try_fold(0, |total, arg| Ok(total + ARG.byte_length(arg)?))
    }

    fn write_into(&self, value: &Vec<Bytes>, buffer: &mut [u8], offset: usize) -> WriteResult {
        let length = self.byte_length(value)?;
        check_remaining(buffer, offset, length)?;
        value
            .iter()
            .try_fold(offset, |offset, arg| ARG.write_into(arg, buffer, offset))
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<Vec<Bytes>> {
        let mut args = Vec::new();
        let mut offset = offset;
        while offset < buffer.len() {
            if args.len() == MAX_ARGS {
                return Err(RwError::invalid("more than 3 args in frame", offset));
            }
            let (end, arg) = ARG.read_slice(buffer, offset)?;
            args.push(Bytes::copy_from_slice(arg));
            offset = end;
        }
        Ok((offset, args))
    }
}

pub fn call_request_rw() -> &'static StructRw<CallRequest> {
    static RW: OnceLock<StructRw<CallRequest>> = OnceLock::new();
    RW.get_or_init(|| {
        StructRw::new("CallRequest")
            .field(Field::new("flags", UINT8, |b: &CallRequest| &b.flags, |b, v| b.flags = v))
            .field(Field::new("ttl", UINT32_BE, |b: &CallRequest| &b.ttl, |b, v| b.ttl = v))
            .field(Field::new(
                "tracing",
                TracingRw,
                |b: &CallRequest| &b.tracing,
                |b, v| b.tracing = v,
            ))
            .field(Field::new(
                "service",
                SERVICE,
                |b: &CallRequest| &b.service,
                |b, v| b.service = v,
            ))
            .field(Field::new(
                "headers",
                CALL_HEADERS,
                |b: &CallRequest| &b.headers,
                |b, v| b.headers = v,
            ))
            .field(Field::new(
                "csum",
                ChecksumRw,
                |b: &CallRequest| &b.checksum,
                |b, v| b.checksum = v,
            ))
            .field(Field::new("args", ArgsRw, |b: &CallRequest| &b.args, |b, v| b.args = v))
    })
}

pub fn call_response_rw() -> &'static StructRw<CallResponse> {
    static RW: OnceLock<StructRw<CallResponse>> = OnceLock::new();
    RW.get_or_init(|| {
        StructRw::new("CallResponse")
            .field(Field::new("flags", UINT8, |b: &CallResponse| &b.flags, |b, v| b.flags = v))
            .field(Field::new("code", UINT8, |b: &CallResponse| &b.code, |b, v| b.code = v))
            .field(Field::new(
                "tracing",
                TracingRw,
                |b: &CallResponse| &b.tracing,
                |b, v| b.tracing = v,
            ))
            .field(Field::new(
                "headers",
                CALL_HEADERS,
                |b: &CallResponse| &b.headers,
                |b, v| b.headers = v,
            ))
            .field(Field::new(
                "csum",
                ChecksumRw,
                |b: &CallResponse| &b.checksum,
                |b, v| b.checksum = v,
            ))
            .field(Field::new("args", ArgsRw, |b: &CallResponse| &b.args, |b, v| b.args = v))
    })
}

pub fn call_cont_rw() -> &'static StructRw<CallCont> {
    static RW: OnceLock<StructRw<CallCont>> = OnceLock::new();
    RW.get_or_init(|| {
        StructRw::new("CallCont")
            .field(Field::new("flags", UINT8, |b: &CallCont| &b.flags, |b, v| b.flags = v))
            .field(Field::new(
                "csum",
                ChecksumRw,
                |b: &CallCont| &b.checksum,
                |b, v| b.checksum = v,
            ))
            .field(Field::new("args", ArgsRw, |b: &CallCont| &b.args, |b, v| b.args = v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumType;
    use crate::headers::{ARG_SCHEME, CALLER_NAME};
    use chanwire_rw::{from_bytes, to_bytes};

    fn castle() -> CallRequest {
        CallRequest {
            flags: 42,
            ttl: 99,
            tracing: Tracing::new(1, 3, 5),
            service: "castle".into(),
            headers: Headers::new()
                .with(CALLER_NAME, "mario")
                .with(ARG_SCHEME, "plumber"),
            checksum: Checksum::none(),
            args: vec![
                Bytes::from_static(b"door"),
                Bytes::from_static(b"key"),
                Bytes::from_static(b"turn"),
            ],
        }
    }

    #[test]
    fn call_request_field_order() {
        let bytes = to_bytes(call_request_rw(), &castle()).unwrap();
        assert_eq!(bytes[0], 42);
        assert_eq!(&bytes[1..5], &[0, 0, 0, 99]);
        assert_eq!(bytes[30], 6);
        assert_eq!(&bytes[31..37], b"castle");
        assert_eq!(bytes[37], 2);
        assert_eq!(&bytes[bytes.len() - 6..], &[0, 4, b't', b'u', b'r', b'n']);
        assert_eq!(from_bytes(call_request_rw(), &bytes).unwrap(), castle());
    }

    #[test]
    fn call_response_with_empty_arg1() {
        let res = CallResponse {
            flags: 0,
            code: 1,
            tracing: Tracing::default(),
            headers: Headers::new().with(ARG_SCHEME, "plumber"),
            checksum: Checksum::new(ChecksumType::Crc32, 7),
            args: vec![Bytes::new(), Bytes::from_static(b"creak")],
        };
        let bytes = to_bytes(call_response_rw(), &res).unwrap();
        assert_eq!(from_bytes(call_response_rw(), &bytes).unwrap(), res);
        assert!(res.is_terminal());
    }

    #[test]
    fn cont_carries_only_flags_checksum_args() {
        let cont = CallCont::new(
            FLAG_FRAGMENT,
            Checksum::none(),
            vec![Bytes::from_static(b"key")],
        );
        let bytes = to_bytes(call_cont_rw(), &cont).unwrap();
        assert_eq!(bytes.as_ref(), &[0x01, 0x00, 0x00, 0x03, b'k', b'e', b'y']);
        assert!(!cont.is_terminal());
    }

    #[test]
    fn args_limit_enforced_both_ways() {
        let four = vec![Bytes::new(); 4];
        assert!(ArgsRw.byte_length(&four).is_err());
        let wire = [0u8; 8];
        let err = ArgsRw.read_from(&wire, 0).unwrap_err();
        assert!(matches!(err, RwError::InvalidValue { offset: 6, .. }));
    }

    #[test]
    fn truncated_arg_is_short_buffer() {
        let err = ArgsRw.read_from(&[0x00, 0x05, b'a'], 0).unwrap_err();
        assert!(err.is_short_buffer());
    }
}
