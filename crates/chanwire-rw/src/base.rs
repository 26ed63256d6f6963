use std::sync::Arc;

use bytes::BytesMut;

use crate::error::RwError;

/// Encoded byte length of a value.
pub type LengthResult = Result<usize, RwError>;

/// Offset just past the bytes a write produced.
pub type WriteResult = Result<usize, RwError>;

/// Offset just past the bytes a read consumed, and the decoded value.
pub type ReadResult<T> = Result<(usize, T), RwError>;

/// A paired length/write/read codec for one value type.
///
/// Implementations must agree with themselves: for any value accepted by
/// [`Rw::byte_length`], [`Rw::write_into`] writes exactly that many bytes and
/// [`Rw::read_from`] over those bytes yields an equal value.
pub trait Rw {
    type Value;

    /// Number of bytes `value` encodes to. Side-effect free.
    fn byte_length(&self, value: &Self::Value) -> LengthResult;

    /// Encode `value` into `buffer` starting at `offset`.
    fn write_into(&self, value: &Self::Value, buffer: &mut [u8], offset: usize) -> WriteResult;

    /// Decode a value from `buffer` starting at `offset`.
    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<Self::Value>;
}

/// A type-erased codec, as stored in case tables and struct fields.
pub type BoxedRw<V> = Box<dyn Rw<Value = V> + Send + Sync>;

impl<R: Rw + ?Sized> Rw for &R {
    type Value = R::Value;

    fn byte_length(&self, value: &Self::Value) -> LengthResult {
        (**self).byte_length(value)
    }

    fn write_into(&self, value: &Self::Value, buffer: &mut [u8], offset: usize) -> WriteResult {
        (**self).write_into(value, buffer, offset)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<Self::Value> {
        (**self).read_from(buffer, offset)
    }
}

impl<R: Rw + ?Sized> Rw for Box<R> {
    type Value = R::Value;

    fn byte_length(&self, value: &Self::Value) -> LengthResult {
        (**self).byte_length(value)
    }

    fn write_into(&self, value: &Self::Value, buffer: &mut [u8], offset: usize) -> WriteResult {
        (**self).write_into(value, buffer, offset)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<Self::Value> {
        (**self).read_from(buffer, offset)
    }
}

impl<R: Rw + ?Sized> Rw for Arc<R> {
    type Value = R::Value;

    fn byte_length(&self, value: &Self::Value) -> LengthResult {
        (**self).byte_length(value)
    }

    fn write_into(&self, value: &Self::Value, buffer: &mut [u8], offset: usize) -> WriteResult {
        (**self).write_into(value, buffer, offset)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<Self::Value> {
        (**self).read_from(buffer, offset)
    }
}

/// Fail with [`RwError::ShortBuffer`] unless `needed` bytes remain past `offset`.
pub fn check_remaining(buffer: &[u8], offset: usize, needed: usize) -> Result<(), RwError> {
    if buffer.len().saturating_sub(offset) < needed {
        return Err(RwError::short(needed, buffer.len(), offset));
    }
    Ok(())
}

/// Encode `value` into a freshly allocated buffer of exactly its byte length.
pub fn to_bytes<R: Rw + ?Sized>(rw: &R, value: &R::Value) -> Result<BytesMut, RwError> {
    let length = rw.byte_length(value)?;
    let mut buf = BytesMut::zeroed(length);
    let end = rw.write_into(value, &mut buf, 0)?;
    if end != length {
        return Err(RwError::invalid(
            format!("wrote {end} bytes, byte length reported {length}"),
            end,
        ));
    }
    Ok(buf)
}

/// Decode a value that must occupy all of `bytes`.
pub fn from_bytes<R: Rw + ?Sized>(rw: &R, bytes: &[u8]) -> Result<R::Value, RwError> {
    let (end, value) = rw.read_from(bytes, 0)?;
    if end != bytes.len() {
        return Err(RwError::invalid(
            format!("{} trailing bytes after value", bytes.len() - end),
            end,
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{UINT16_BE, UINT8};

    #[test]
    fn check_remaining_reports_shortfall() {
        let buf = [0u8; 3];
        assert!(check_remaining(&buf, 1, 2).is_ok());
        let err = check_remaining(&buf, 2, 4).unwrap_err();
        assert_eq!(
            err,
            RwError::ShortBuffer {
                expected: 4,
                actual: 1,
                offset: 2
            }
        );
    }

    #[test]
    fn check_remaining_past_end() {
        let err = check_remaining(&[0u8; 2], 5, 1).unwrap_err();
        assert!(matches!(err, RwError::ShortBuffer { actual: 0, .. }));
    }

    #[test]
    fn to_bytes_sizes_exactly() {
        let buf = to_bytes(&UINT16_BE, &0x1234).unwrap();
        assert_eq!(buf.as_ref(), &[0x12, 0x34]);
    }

    #[test]
    fn from_bytes_rejects_trailing() {
        let err = from_bytes(&UINT8, &[1, 2]).unwrap_err();
        assert!(matches!(err, RwError::InvalidValue { offset: 1, .. }));
        assert_eq!(from_bytes(&UINT8, &[7]).unwrap(), 7);
    }

    #[test]
    fn references_and_boxes_are_codecs() {
        let boxed: BoxedRw<u16> = Box::new(UINT16_BE);
        let by_ref = &boxed;
        assert_eq!(by_ref.byte_length(&1).unwrap(), 2);
        let shared = Arc::new(UINT8);
        assert_eq!(shared.read_from(&[9], 0).unwrap(), (1, 9));
    }
}
