//! Zero-copy frame views.
//!
//! A [`LazyFrame`] decodes only the 16-byte header up front. Every accessor
//! re-scans the body from its start using the same layout rules as the eager
//! codecs and stops as soon as the requested field is found, returning a
//! value borrowed from the frame's buffer where it can.
//!
//! Field offsets are absolute within the frame buffer (the header included):
//!
//! ```text
//! CallRequest      flags@16 ttl@17 tracing@21 service@46 headers csum args
//! CallResponse     flags@16 code@17 tracing@18 headers@43 csum args
//! Call*Cont        flags@16 csum@17 args
//! ErrorResponse    code@16 tracing@17 message@42
//! Cancel           ttl@16 tracing@20 why@45
//! Claim            ttl@16 tracing@20
//! Init*            version@16 headers@18
//! ```
//!
//! `set_id` and `write_ttl` patch the buffer in place. A caller that changes a
//! checksum-covered field is responsible for recomputing the checksum; neither
//! of these fields is covered.

use chanwire_rw::atoms::Integer;
use chanwire_rw::{
    check_remaining, ReadResult, Rw, RwError, WriteResult, UINT16_BE, UINT32_BE, UINT8,
};

use crate::body::{body_table, FrameBody, ARG, MESSAGE, SERVICE};
use crate::checksum::{Checksum, ChecksumRw};
use crate::codec::{Frame, FrameHeader};
use crate::headers::{HeadersRw, CALL_HEADERS, INIT_HEADERS};
use crate::trace::{Tracing, TracingRw};
use crate::types::{FrameType, FLAG_FRAGMENT, HEADER_SIZE};

const FLAGS: usize = 16;
const CALL_REQ_TTL: usize = 17;
const CALL_REQ_TRACING: usize = 21;
const CALL_REQ_SERVICE: usize = 46;
const CALL_RES_CODE: usize = 17;
const CALL_RES_TRACING: usize = 18;
const CALL_RES_HEADERS: usize = 43;
const CONT_CSUM: usize = 17;
const ERROR_CODE: usize = 16;
const ERROR_TRACING: usize = 17;
const ERROR_MESSAGE: usize = 42;
const CANCEL_TTL: usize = 16;
const CANCEL_TRACING: usize = 20;
const CANCEL_WHY: usize = 45;
const INIT_VERSION: usize = 16;
const INIT_HEADERS_AT: usize = 18;
const ID: usize = 4;

/// A frame whose body is decoded on demand.
///
/// `B` is the backing storage: a borrowed slice of a receive buffer
/// (`&[u8]`, or `&mut [u8]` for in-place patching), or an owned buffer split
/// off a connection's read buffer.
#[derive(Debug, Clone)]
pub struct LazyFrame<B> {
    size: u16,
    frame_type: FrameType,
    id: u32,
    buffer: B,
}

impl<'a> LazyFrame<&'a [u8]> {
    /// View the frame at `offset`, returning the offset just past it.
    pub fn read(buffer: &'a [u8], offset: usize) -> ReadResult<Self> {
        let (_, header) = FrameHeader::read(buffer, offset)?;
        let size = usize::from(header.size);
        check_remaining(buffer, offset, size)?;
        let frame = Self::from_header(header, &buffer[offset..offset + size]);
        Ok((offset + size, frame))
    }
}

impl<'a> LazyFrame<&'a mut [u8]> {
    /// Mutable view of the frame at `offset`, returning the offset just past it.
    pub fn read_mut(buffer: &'a mut [u8], offset: usize) -> ReadResult<Self> {
        let (_, header) = FrameHeader::read(buffer, offset)?;
        let size = usize::from(header.size);
        check_remaining(buffer, offset, size)?;
        let frame = Self::from_header(header, &mut buffer[offset..offset + size]);
        Ok((offset + size, frame))
    }
}

impl<B> LazyFrame<B> {
    fn from_header(header: FrameHeader, buffer: B) -> Self {
        Self {
            size: header.size,
            frame_type: header.frame_type,
            id: header.id,
            buffer,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    /// Total frame size, header included.
    pub fn size(&self) -> usize {
        usize::from(self.size)
    }

    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            size: self.size,
            frame_type: self.frame_type,
            id: self.id,
        }
    }

    pub fn into_inner(self) -> B {
        self.buffer
    }

    fn no_field(&self, field: &'static str) -> RwError {
        RwError::NoSuchField {
            structure: self.frame_type.name(),
            field,
        }
    }
}

impl<B: AsRef<[u8]>> LazyFrame<B> {
    /// Wrap a buffer that holds exactly one frame.
    pub fn parse(buffer: B) -> Result<Self, RwError> {
        let bytes = buffer.as_ref();
        let (_, header) = FrameHeader::read(bytes, 0)?;
        let size = usize::from(header.size);
        check_remaining(bytes, 0, size)?;
        if bytes.len() != size {
            return Err(RwError::invalid(
                format!("{} bytes past frame end", bytes.len() - size),
                size,
            ));
        }
        Ok(Self::from_header(header, buffer))
    }

    /// The whole frame, header included.
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_ref()
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.as_bytes()[HEADER_SIZE..]
    }

    pub fn read_flags(&self) -> ReadResult<u8> {
        if !self.frame_type.is_call() {
            return Err(self.no_field("flags"));
        }
        UINT8.read_from(self.as_bytes(), FLAGS)
    }

    pub fn read_ttl(&self) -> ReadResult<u32> {
        let offset = match self.frame_type {
            FrameType::CallRequest => CALL_REQ_TTL,
            FrameType::Cancel | FrameType::Claim => CANCEL_TTL,
            _ => return Err(self.no_field("ttl")),
        };
        UINT32_BE.read_from(self.as_bytes(), offset)
    }

    pub fn read_tracing(&self) -> ReadResult<Tracing> {
        let offset = match self.frame_type {
            FrameType::CallRequest => CALL_REQ_TRACING,
            FrameType::CallResponse => CALL_RES_TRACING,
            FrameType::ErrorResponse => ERROR_TRACING,
            FrameType::Cancel | FrameType::Claim => CANCEL_TRACING,
            _ => return Err(self.no_field("tracing")),
        };
        TracingRw.read_from(self.as_bytes(), offset)
    }

    pub fn read_service(&self) -> ReadResult<&str> {
        if self.frame_type != FrameType::CallRequest {
            return Err(self.no_field("service"));
        }
        SERVICE.read_str(self.as_bytes(), CALL_REQ_SERVICE)
    }

    /// Response code of a CallResponse or error code of an ErrorResponse.
    pub fn read_code(&self) -> ReadResult<u8> {
        let offset = match self.frame_type {
            FrameType::CallResponse => CALL_RES_CODE,
            FrameType::ErrorResponse => ERROR_CODE,
            _ => return Err(self.no_field("code")),
        };
        UINT8.read_from(self.as_bytes(), offset)
    }

    /// ErrorResponse message or Cancel reason.
    pub fn read_message(&self) -> ReadResult<&str> {
        let offset = match self.frame_type {
            FrameType::ErrorResponse => ERROR_MESSAGE,
            FrameType::Cancel => CANCEL_WHY,
            _ => return Err(self.no_field("message")),
        };
        MESSAGE.read_str(self.as_bytes(), offset)
    }

    pub fn read_version(&self) -> ReadResult<u16> {
        match self.frame_type {
            FrameType::InitRequest | FrameType::InitResponse => {
                UINT16_BE.read_from(self.as_bytes(), INIT_VERSION)
            }
            _ => Err(self.no_field("version")),
        }
    }

    pub fn read_headers(&self) -> ReadResult<LazyHeaders<'_>> {
        let bytes = self.as_bytes();
        match self.frame_type {
            FrameType::CallRequest => {
                let offset = SERVICE.skip(bytes, CALL_REQ_SERVICE)?;
                LazyHeaders::scan(&CALL_HEADERS, bytes, offset)
            }
            FrameType::CallResponse => LazyHeaders::scan(&CALL_HEADERS, bytes, CALL_RES_HEADERS),
            FrameType::InitRequest | FrameType::InitResponse => {
                LazyHeaders::scan(&INIT_HEADERS, bytes, INIT_HEADERS_AT)
            }
            _ => Err(self.no_field("headers")),
        }
    }

    /// Offset of the checksum, reusing already scanned headers when given.
    fn checksum_offset(&self, headers: Option<&LazyHeaders<'_>>) -> Result<usize, RwError> {
        let bytes = self.as_bytes();
        match (self.frame_type, headers) {
            (FrameType::CallRequest | FrameType::CallResponse, Some(headers)) => Ok(headers.end()),
            (FrameType::CallRequest, None) => {
                let offset = SERVICE.skip(bytes, CALL_REQ_SERVICE)?;
                CALL_HEADERS.skip(bytes, offset)
            }
            (FrameType::CallResponse, None) => CALL_HEADERS.skip(bytes, CALL_RES_HEADERS),
            (FrameType::CallRequestCont | FrameType::CallResponseCont, _) => Ok(CONT_CSUM),
            _ => Err(self.no_field("csum")),
        }
    }

    pub fn read_checksum(&self) -> ReadResult<Checksum> {
        let offset = self.checksum_offset(None)?;
        ChecksumRw.read_from(self.as_bytes(), offset)
    }

    /// The first argument chunk of a CallRequest or CallResponse, borrowed
    /// from the frame. Pass the result of [`LazyFrame::read_headers`] to skip
    /// rescanning the header map.
    pub fn read_arg1(&self, headers: Option<&LazyHeaders<'_>>) -> ReadResult<&[u8]> {
        if !matches!(
            self.frame_type,
            FrameType::CallRequest | FrameType::CallResponse
        ) {
            return Err(self.no_field("arg1"));
        }
        let bytes = self.as_bytes();
        let (offset, _) = ChecksumRw.read_from(bytes, self.checksum_offset(headers)?)?;
        ARG.read_slice(bytes, offset)
    }

    /// `!(flags & FRAGMENT)` for call bodies; error responses always end a call.
    pub fn is_frame_terminal(&self) -> Result<bool, RwError> {
        match self.frame_type {
            FrameType::ErrorResponse => Ok(true),
            _ => {
                let (_, flags) = self.read_flags()?;
                Ok(flags & FLAG_FRAGMENT == 0)
            }
        }
    }

    /// Materialize the body with the eager codecs.
    pub fn read_body(&self) -> ReadResult<FrameBody> {
        let bytes = self.as_bytes();
        let rw = body_table().lookup(self.frame_type.code(), 3)?;
        let (end, body) = rw.read_from(bytes, HEADER_SIZE)?;
        if end != bytes.len() {
            return Err(RwError::invalid(
                format!("body ends at {end}, frame size says {}", bytes.len()),
                end,
            ));
        }
        Ok((end, body))
    }

    pub fn to_frame(&self) -> Result<Frame, RwError> {
        let (_, body) = self.read_body()?;
        Ok(Frame::new(self.id, body))
    }

    /// Copy the frame, including any in-place patches, into `buffer`.
    pub fn write_into(&self, buffer: &mut [u8], offset: usize) -> WriteResult {
        let bytes = self.as_bytes();
        check_remaining(buffer, offset, bytes.len())?;
        buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(offset + bytes.len())
    }

    /// Copy into a view over owned storage.
    pub fn to_owned_frame(&self) -> LazyFrame<Vec<u8>> {
        LazyFrame {
            size: self.size,
            frame_type: self.frame_type,
            id: self.id,
            buffer: self.as_bytes().to_vec(),
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> LazyFrame<B> {
    /// Rewrite the frame id in place.
    pub fn set_id(&mut self, id: u32) -> WriteResult {
        let end = UINT32_BE.write_into(&id, self.buffer.as_mut(), ID)?;
        self.id = id;
        Ok(end)
    }

    /// Rewrite the TTL of a CallRequest, Cancel or Claim in place.
    pub fn write_ttl(&mut self, ttl: u32) -> WriteResult {
        let offset = match self.frame_type {
            FrameType::CallRequest => CALL_REQ_TTL,
            FrameType::Cancel | FrameType::Claim => CANCEL_TTL,
            _ => return Err(self.no_field("ttl")),
        };
        UINT32_BE.write_into(&ttl, self.buffer.as_mut(), offset)
    }
}

/// Header map scanned from a frame, keys and values borrowed from its buffer.
#[derive(Debug, Clone, Default)]
pub struct LazyHeaders<'a> {
    pairs: Vec<(&'a [u8], &'a [u8])>,
    end: usize,
}

impl<'a> LazyHeaders<'a> {
    fn scan<N: Integer, S: Integer>(
        rw: &HeadersRw<N, S>,
        buffer: &'a [u8],
        offset: usize,
    ) -> ReadResult<Self> {
        let (mut offset, count) = rw.read_count(buffer, offset)?;
        let buf = rw.string_rw().buffer_rw();
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let (end, key) = buf.read_slice(buffer, offset)?;
            let (end, value) = buf.read_slice(buffer, end)?;
            pairs.push((key, value));
            offset = end;
        }
        Ok((offset, LazyHeaders { pairs, end: offset }))
    }

    /// Value for `key`. Candidates whose length differs from the key's are
    /// rejected before any bytes are compared.
    pub fn get_value(&self, key: impl AsRef<[u8]>) -> Option<&'a [u8]> {
        let key = key.as_ref();
        self.pairs
            .iter()
            .filter(|(k, _)| k.len() == key.len())
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + '_ {
        self.pairs.iter().copied()
    }

    /// Offset just past the header map in the frame buffer.
    pub fn end(&self) -> usize {
        self.end
    }
}
