use std::sync::OnceLock;
use std::time::Duration;

use bytes::BytesMut;
use chanwire_rw::{
    check_remaining, Computed, Field, FieldRw, Hook, LengthResult, ReadResult, Reserved, Rw,
    RwError, StructRw, WriteResult, UINT16_BE, UINT32_BE, UINT8,
};

use crate::body::{body_table, FrameBody};
use crate::error::{FrameError, Result};
use crate::lazy::LazyFrame;
use crate::types::{FrameType, HEADER_SIZE, MAX_FRAME_SIZE};

/// A fully decoded frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// Correlates requests and responses; 0 is reserved for connection-level frames.
    pub id: u32,
    pub body: FrameBody,
}

impl Frame {
    pub fn new(id: u32, body: FrameBody) -> Self {
        Self { id, body }
    }

    pub fn frame_type(&self) -> FrameType {
        self.body.frame_type()
    }

    /// Total encoded size including the header.
    pub fn wire_size(&self) -> Result<usize> {
        Ok(frame_rw().byte_length(self)?)
    }
}

/// The fixed 16-byte header: `size:2 type:1 reserved:1 id:4 reserved:8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub size: u16,
    pub frame_type: FrameType,
    pub id: u32,
}

impl FrameHeader {
    /// Decode a header at `offset`. The size must cover at least the header
    /// and the type must be known; the body bytes need not be present yet.
    pub fn read(buffer: &[u8], offset: usize) -> ReadResult<FrameHeader> {
        check_remaining(buffer, offset, HEADER_SIZE)?;
        let (_, size) = UINT16_BE.read_from(buffer, offset)?;
        if usize::from(size) < HEADER_SIZE {
            return Err(RwError::invalid(
                format!("frame size {size} smaller than header"),
                offset,
            ));
        }
        let frame_type = FrameType::try_from_code(buffer[offset + 2], offset + 3)?;
        let (_, id) = UINT32_BE.read_from(buffer, offset + 4)?;
        let header = FrameHeader {
            size,
            frame_type,
            id,
        };
        Ok((offset + HEADER_SIZE, header))
    }
}

/// Configuration for frame reading, writing and fragmentation.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum encoded frame size in bytes. Default: 0xFFFF.
    pub max_frame_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Scratch state threaded through the frame struct codec.
#[derive(Debug, Default)]
pub struct FrameContext {
    start: usize,
    size: u16,
    frame_type: u8,
}

struct BodyField;

impl FieldRw<Frame, FrameContext> for BodyField {
    fn name(&self) -> &'static str {
        "body"
    }

    fn byte_length(&self, frame: &Frame, ctx: &FrameContext) -> LengthResult {
        body_table()
            .lookup(ctx.frame_type, 0)?
            .byte_length(&frame.body)
    }

    fn write_into(
        &self,
        frame: &Frame,
        ctx: &FrameContext,
        buffer: &mut [u8],
        offset: usize,
    ) -> WriteResult {
        body_table()
            .lookup(ctx.frame_type, offset)?
            .write_into(&frame.body, buffer, offset)
    }

    fn read_into(
        &self,
        frame: &mut Frame,
        ctx: &mut FrameContext,
        buffer: &[u8],
        offset: usize,
    ) -> WriteResult {
        let size = usize::from(ctx.size);
        if size < HEADER_SIZE {
            return Err(RwError::invalid(
                format!("frame size {size} smaller than header"),
                ctx.start,
            ));
        }
        let end = ctx.start + size;
        check_remaining(buffer, offset, end - offset)?;
        let rw = body_table().lookup(ctx.frame_type, ctx.start + 3)?;
        let (body_end, body) = rw.read_from(&buffer[..end], offset)?;
        if body_end != end {
            return Err(RwError::invalid(
                format!("body ends at {body_end}, frame size says {end}"),
                body_end,
            ));
        }
        frame.body = body;
        Ok(end)
    }
}

fn prepare_size(frame: &Frame, ctx: &mut FrameContext) -> std::result::Result<(), RwError> {
    let code = frame.frame_type().code();
    let body = body_table().lookup(code, 0)?.byte_length(&frame.body)?;
    ctx.size = UINT16_BE.from_len(HEADER_SIZE + body, 0)?;
    ctx.frame_type = code;
    Ok(())
}

/// The eager frame codec: fixed header, then the body selected by type.
pub fn frame_rw() -> &'static StructRw<Frame, FrameContext> {
    static RW: OnceLock<StructRw<Frame, FrameContext>> = OnceLock::new();
    RW.get_or_init(|| {
        StructRw::new("Frame")
            .field(
                Hook::new("size")
                    .on_prepare(prepare_size)
                    .on_read(|_: &mut Frame, ctx: &mut FrameContext, _: &[u8], offset: usize| {
                        ctx.start = offset;
                        Ok(offset)
                    }),
            )
            .field(Computed::new(
                "size",
                UINT16_BE,
                |_: &Frame, ctx: &FrameContext| ctx.size,
                |_, ctx, size| ctx.size = size,
            ))
            .field(Computed::new(
                "type",
                UINT8,
                |_: &Frame, ctx: &FrameContext| ctx.frame_type,
                |_, ctx, code| ctx.frame_type = code,
            ))
            .field(Reserved::new("reserved", 1))
            .field(Field::new("id", UINT32_BE, |f: &Frame| &f.id, |f, id| f.id = id))
            .field(Reserved::new("reserved", 8))
            .field(BodyField)
    })
}

/// Encode a frame, appending it to `dst`.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let length = frame_rw().byte_length(frame)?;
    let start = dst.len();
    dst.resize(start + length, 0);
    if let Err(err) = frame_rw().write_into(frame, &mut dst[start..], 0) {
        dst.truncate(start);
        return Err(err.into());
    }
    Ok(())
}

/// Decode the next frame from a buffer as a lazy frame.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, the frame's bytes are split off the front of the buffer.
pub fn decode_frame(
    src: &mut BytesMut,
    max_frame_size: usize,
) -> Result<Option<LazyFrame<BytesMut>>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let (_, header) = FrameHeader::read(src, 0)?;
    let size = usize::from(header.size);
    if size > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size,
            max: max_frame_size,
        });
    }
    if src.len() < size {
        return Ok(None);
    }

    let bytes = src.split_to(size);
    Ok(Some(LazyFrame::parse(bytes)?))
}
