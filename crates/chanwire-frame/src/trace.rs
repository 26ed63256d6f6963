use chanwire_rw::{check_remaining, LengthResult, ReadResult, Rw, WriteResult};

/// Encoded width of [`Tracing`]: three 8-byte ids and a flags byte.
pub const TRACING_SIZE: usize = 25;

/// Distributed tracing identifiers propagated with a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Tracing {
    pub span_id: u64,
    pub parent_id: u64,
    pub trace_id: u64,
    pub flags: u8,
}

impl Tracing {
    pub fn new(span_id: u64, parent_id: u64, trace_id: u64) -> Self {
        Self {
            span_id,
            parent_id,
            trace_id,
            flags: 0,
        }
    }

    pub fn with_flags(self, flags: u8) -> Self {
        Self { flags, ..self }
    }
}

/// Codec for `spanid:8 parentid:8 traceid:8 flags:1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRw;

impl Rw for TracingRw {
    type Value = Tracing;

    fn byte_length(&self, _value: &Tracing) -> LengthResult {
        Ok(TRACING_SIZE)
    }

    fn write_into(&self, value: &Tracing, buffer: &mut [u8], offset: usize) -> WriteResult {
        check_remaining(buffer, offset, TRACING_SIZE)?;
        let dst = &mut buffer[offset..offset + TRACING_SIZE];
        dst[0..8].copy_from_slice(&value.span_id.to_be_bytes());
        dst[8..16].copy_from_slice(&value.parent_id.to_be_bytes());
        dst[16..24].copy_from_slice(&value.trace_id.to_be_bytes());
        dst[24] = value.flags;
        Ok(offset + TRACING_SIZE)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<Tracing> {
        check_remaining(buffer, offset, TRACING_SIZE)?;
        let src = &buffer[offset..offset + TRACING_SIZE];
        let id = |at: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&src[at..at + 8]);
            u64::from_be_bytes(word)
        };
        let tracing = Tracing {
            span_id: id(0),
            parent_id: id(8),
            trace_id: id(16),
            flags: src[24],
        };
        Ok((offset + TRACING_SIZE, tracing))
    }
}
