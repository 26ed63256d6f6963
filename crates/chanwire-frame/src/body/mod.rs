//! Frame bodies and the type-keyed body table.

mod call;
mod control;

use std::sync::OnceLock;

use bytes::Bytes;
use chanwire_rw::{CaseTable, LengthResult, ReadResult, Rw, VariantRw, WriteResult};

pub use call::{
    call_cont_rw, call_request_rw, call_response_rw, ArgsRw, CallCont, CallRequest, CallResponse,
    ARG, MAX_ARGS, SERVICE,
};
pub use control::{
    cancel_rw, claim_rw, error_response_rw, init_rw, Cancel, Claim, ErrorCodeRw, ErrorResponse,
    Init, MESSAGE, PROTOCOL_VERSION,
};

use crate::checksum::Checksum;
use crate::types::{FrameType, FLAG_FRAGMENT};

/// A decoded frame body, one variant per frame type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FrameBody {
    InitRequest(Init),
    InitResponse(Init),
    CallRequest(CallRequest),
    CallResponse(CallResponse),
    CallRequestCont(CallCont),
    CallResponseCont(CallCont),
    Cancel(Cancel),
    Claim(Claim),
    #[default]
    PingRequest,
    PingResponse,
    ErrorResponse(ErrorResponse),
}

/// Mutable view of the fields every call body shares.
pub struct CallParts<'a> {
    pub flags: &'a mut u8,
    pub checksum: &'a mut Checksum,
    pub args: &'a mut Vec<Bytes>,
}

impl FrameBody {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::InitRequest(_) => FrameType::InitRequest,
            Self::InitResponse(_) => FrameType::InitResponse,
            Self::CallRequest(_) => FrameType::CallRequest,
            Self::CallResponse(_) => FrameType::CallResponse,
            Self::CallRequestCont(_) => FrameType::CallRequestCont,
            Self::CallResponseCont(_) => FrameType::CallResponseCont,
            Self::Cancel(_) => FrameType::Cancel,
            Self::Claim(_) => FrameType::Claim,
            Self::PingRequest => FrameType::PingRequest,
            Self::PingResponse => FrameType::PingResponse,
            Self::ErrorResponse(_) => FrameType::ErrorResponse,
        }
    }

    pub fn call_parts_mut(&mut self) -> Option<CallParts<'_>> {
        let (flags, checksum, args) = match self {
            Self::CallRequest(b) => (&mut b.flags, &mut b.checksum, &mut b.args),
            Self::CallResponse(b) => (&mut b.flags, &mut b.checksum, &mut b.args),
            Self::CallRequestCont(b) | Self::CallResponseCont(b) => {
                (&mut b.flags, &mut b.checksum, &mut b.args)
            }
            _ => return None,
        };
        Some(CallParts {
            flags,
            checksum,
            args,
        })
    }

    pub fn flags(&self) -> Option<u8> {
        match self {
            Self::CallRequest(b) => Some(b.flags),
            Self::CallResponse(b) => Some(b.flags),
            Self::CallRequestCont(b) | Self::CallResponseCont(b) => Some(b.flags),
            _ => None,
        }
    }

    pub fn checksum(&self) -> Option<&Checksum> {
        match self {
            Self::CallRequest(b) => Some(&b.checksum),
            Self::CallResponse(b) => Some(&b.checksum),
            Self::CallRequestCont(b) | Self::CallResponseCont(b) => Some(&b.checksum),
            _ => None,
        }
    }

    pub fn args(&self) -> Option<&[Bytes]> {
        match self {
            Self::CallRequest(b) => Some(&b.args),
            Self::CallResponse(b) => Some(&b.args),
            Self::CallRequestCont(b) | Self::CallResponseCont(b) => Some(&b.args),
            _ => None,
        }
    }

    /// Whether this is the last frame of its call. Error responses always
    /// end the call; bodies without call semantics have no answer.
    pub fn is_terminal(&self) -> Option<bool> {
        match self {
            Self::ErrorResponse(_) => Some(true),
            _ => self.flags().map(|flags| flags & FLAG_FRAGMENT == 0),
        }
    }
}

/// Codec for bodies with no bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRw;

impl Rw for EmptyRw {
    type Value = ();

    fn byte_length(&self, _value: &()) -> LengthResult {
        Ok(0)
    }

    fn write_into(&self, _value: &(), _buffer: &mut [u8], offset: usize) -> WriteResult {
        Ok(offset)
    }

    fn read_from(&self, _buffer: &[u8], offset: usize) -> ReadResult<()> {
        Ok((offset, ()))
    }
}

/// Frame type code to body codec. Unknown codes have no entry.
pub fn body_table() -> &'static CaseTable<u8, FrameBody> {
    static TABLE: OnceLock<CaseTable<u8, FrameBody>> = OnceLock::new();
    TABLE.get_or_init(|| {
        CaseTable::new()
            .case(
                FrameType::InitRequest.code(),
                VariantRw::new("init", init_rw(), FrameBody::InitRequest, |b| match b {
                    FrameBody::InitRequest(v) => Some(v),
                    _ => None,
                }),
            )
            .case(
                FrameType::InitResponse.code(),
                VariantRw::new("init", init_rw(), FrameBody::InitResponse, |b| match b {
                    FrameBody::InitResponse(v) => Some(v),
                    _ => None,
                }),
            )
            .case(
                FrameType::CallRequest.code(),
                VariantRw::new(
                    "call_request",
                    call_request_rw(),
                    FrameBody::CallRequest,
                    |b| match b {
                        FrameBody::CallRequest(v) => Some(v),
                        _ => None,
                    },
                ),
            )
            .case(
                FrameType::CallResponse.code(),
                VariantRw::new(
                    "call_response",
                    call_response_rw(),
                    FrameBody::CallResponse,
                    |b| match b {
                        FrameBody::CallResponse(v) => Some(v),
                        _ => None,
                    },
                ),
            )
            .case(
                FrameType::CallRequestCont.code(),
                VariantRw::new(
                    "call_request_cont",
                    call_cont_rw(),
                    FrameBody::CallRequestCont,
                    |b| match b {
                        FrameBody::CallRequestCont(v) => Some(v),
                        _ => None,
                    },
                ),
            )
            .case(
                FrameType::CallResponseCont.code(),
                VariantRw::new(
                    "call_response_cont",
                    call_cont_rw(),
                    FrameBody::CallResponseCont,
                    |b| match b {
                        FrameBody::CallResponseCont(v) => Some(v),
                        _ => None,
                    },
                ),
            )
            .case(
                FrameType::Cancel.code(),
                VariantRw::new("cancel", cancel_rw(), FrameBody::Cancel, |b| match b {
                    FrameBody::Cancel(v) => Some(v),
                    _ => None,
                }),
            )
            .case(
                FrameType::Claim.code(),
                VariantRw::new("claim", claim_rw(), FrameBody::Claim, |b| match b {
                    FrameBody::Claim(v) => Some(v),
                    _ => None,
                }),
            )
            .case(
                FrameType::PingRequest.code(),
                VariantRw::new("ping", EmptyRw, |()| FrameBody::PingRequest, |b| match b {
                    FrameBody::PingRequest => Some(&()),
                    _ => None,
                }),
            )
            .case(
                FrameType::PingResponse.code(),
                VariantRw::new("ping", EmptyRw, |()| FrameBody::PingResponse, |b| match b {
                    FrameBody::PingResponse => Some(&()),
                    _ => None,
                }),
            )
            .case(
                FrameType::ErrorResponse.code(),
                VariantRw::new(
                    "error_response",
                    error_response_rw(),
                    FrameBody::ErrorResponse,
                    |b| match b {
                        FrameBody::ErrorResponse(v) => Some(v),
                        _ => None,
                    },
                ),
            )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorCode;
    use chanwire_rw::to_bytes;

    #[test]
    fn every_frame_type_has_a_case() {
        for t in FrameType::ALL {
            assert!(body_table().contains(t.code()), "{t}");
        }
        assert!(!body_table().contains(0x50));
    }

    #[test]
    fn variant_mismatch_is_rejected() {
        let rw = body_table().lookup(FrameType::Claim.code(), 0).unwrap();
        assert!(rw.byte_length(&FrameBody::PingRequest).is_err());
        assert_eq!(rw.byte_length(&FrameBody::Claim(Claim::default())).unwrap(), 29);
    }

    #[test]
    fn ping_bodies_are_empty() {
        let rw = body_table().lookup(FrameType::PingResponse.code(), 0).unwrap();
        assert!(to_bytes(rw, &FrameBody::PingResponse).unwrap().is_empty());
        assert_eq!(rw.read_from(&[], 0).unwrap(), (0, FrameBody::PingResponse));
    }

    #[test]
    fn terminal_rules() {
        let mut body =
            FrameBody::CallRequestCont(CallCont::new(FLAG_FRAGMENT, Checksum::none(), vec![]));
        assert_eq!(body.is_terminal(), Some(false));
        *body.call_parts_mut().unwrap().flags = 0;
        assert_eq!(body.is_terminal(), Some(true));

        let err = FrameBody::ErrorResponse(ErrorResponse {
            code: ErrorCode::Timeout,
            ..ErrorResponse::default()
        });
        assert_eq!(err.is_terminal(), Some(true));
        assert_eq!(FrameBody::PingRequest.is_terminal(), None);
        assert!(FrameBody::PingRequest.call_parts_mut().is_none());
    }
}
