//! Size-prefixed byte blobs and strings.

use bytes::Bytes;

use crate::atoms::{Integer, IntegerRw};
use crate::base::{check_remaining, LengthResult, ReadResult, Rw, WriteResult};
use crate::error::RwError;

/// A byte blob preceded by its length, encoded with `size`.
///
/// Writing an absent blob (see [`VariableBufferRw::write_slice`] with `None`)
/// produces a zero-length entry.
#[derive(Debug, Clone, Copy)]
pub struct VariableBufferRw<T> {
    size: IntegerRw<T>,
}

impl<T: Integer> VariableBufferRw<T> {
    pub const fn new(size: IntegerRw<T>) -> Self {
        Self { size }
    }

    pub fn size_rw(&self) -> &IntegerRw<T> {
        &self.size
    }

    /// Encoded length of an optional slice.
    pub fn slice_length(&self, bytes: Option<&[u8]>) -> LengthResult {
        let len = bytes.map_or(0, <[u8]>::len);
        self.size.from_len(len, 0)?;
        Ok(self.size.width() + len)
    }

    /// Write an optional slice; `None` writes a zero size and no bytes.
    pub fn write_slice(
        &self,
        bytes: Option<&[u8]>,
        buffer: &mut [u8],
        offset: usize,
    ) -> WriteResult {
        let bytes = bytes.unwrap_or_default();
        let size = self.size.from_len(bytes.len(), offset)?;
        check_remaining(buffer, offset, self.size.width() + bytes.len())?;
        let start = self.size.write_into(&size, buffer, offset)?;
        let end = start + bytes.len();
        buffer[start..end].copy_from_slice(bytes);
        Ok(end)
    }

    /// Read the blob as a borrowed slice of `buffer`, without copying.
    pub fn read_slice<'a>(&self, buffer: &'a [u8], offset: usize) -> ReadResult<&'a [u8]> {
        let (start, size) = self.size.read_from(buffer, offset)?;
        let len = size
            .to_usize()
            .ok_or_else(|| RwError::invalid("negative size prefix", offset))?;
        check_remaining(buffer, start, len)?;
        Ok((start + len, &buffer[start..start + len]))
    }

    /// Offset just past the blob at `offset`, without touching its bytes.
    pub fn skip(&self, buffer: &[u8], offset: usize) -> WriteResult {
        self.read_slice(buffer, offset).map(|(end, _)| end)
    }
}

impl<T: Integer> Rw for VariableBufferRw<T> {
    type Value = Bytes;

    fn byte_length(&self, value: &Bytes) -> LengthResult {
        self.slice_length(Some(value))
    }

    fn write_into(&self, value: &Bytes, buffer: &mut [u8], offset: usize) -> WriteResult {
        self.write_slice(Some(value), buffer, offset)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<Bytes> {
        let (end, slice) = self.read_slice(buffer, offset)?;
        Ok((end, Bytes::copy_from_slice(slice)))
    }
}

/// A UTF-8 string carried in a [`VariableBufferRw`].
#[derive(Debug, Clone, Copy)]
pub struct StringRw<T> {
    inner: VariableBufferRw<T>,
}

impl<T: Integer> StringRw<T> {
    pub const fn new(size: IntegerRw<T>) -> Self {
        Self {
            inner: VariableBufferRw::new(size),
        }
    }

    /// The underlying blob codec, for callers that want raw bytes.
    pub fn buffer_rw(&self) -> &VariableBufferRw<T> {
        &self.inner
    }

    /// Read the string borrowed from `buffer`.
    pub fn read_str<'a>(&self, buffer: &'a [u8], offset: usize) -> ReadResult<&'a str> {
        let (end, slice) = self.inner.read_slice(buffer, offset)?;
        let text = std::str::from_utf8(slice)
            .map_err(|err| RwError::invalid(format!("invalid utf-8: {err}"), offset))?;
        Ok((end, text))
    }

    pub fn skip(&self, buffer: &[u8], offset: usize) -> WriteResult {
        self.inner.skip(buffer, offset)
    }
}

impl<T: Integer> Rw for StringRw<T> {
    type Value = String;

    fn byte_length(&self, value: &String) -> LengthResult {
        self.inner.slice_length(Some(value.as_bytes()))
    }

    fn write_into(&self, value: &String, buffer: &mut [u8], offset: usize) -> WriteResult {
        self.inner.write_slice(Some(value.as_bytes()), buffer, offset)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<String> {
        let (end, text) = self.read_str(buffer, offset)?;
        Ok((end, text.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{UINT16_BE, UINT8};
    use crate::base::to_bytes;

    const BUF16: VariableBufferRw<u16> = VariableBufferRw::new(UINT16_BE);
    const STR1: StringRw<u8> = StringRw::new(UINT8);

    #[test]
    fn writes_size_then_bytes() {
        let bytes = to_bytes(&BUF16, &Bytes::from_static(b"door")).unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0x04, b'd', b'o', b'o', b'r']);
        let (end, value) = BUF16.read_from(&bytes, 0).unwrap();
        assert_eq!(end, 6);
        assert_eq!(value.as_ref(), b"door");
    }

    #[test]
    fn absent_writes_empty_entry() {
        let mut buf = [0xffu8; 4];
        assert_eq!(BUF16.slice_length(None).unwrap(), 2);
        assert_eq!(BUF16.write_slice(None, &mut buf, 1).unwrap(), 3);
        assert_eq!(buf, [0xff, 0x00, 0x00, 0xff]);
    }

    #[test]
    fn oversized_blob_is_range_error() {
        let tiny = VariableBufferRw::new(UINT8);
        let big = Bytes::from(vec![0u8; 256]);
        assert!(matches!(
            tiny.byte_length(&big).unwrap_err(),
            RwError::Range { value: 256, .. }
        ));
        let mut buf = vec![0u8; 300];
        assert!(tiny.write_into(&big, &mut buf, 0).is_err());
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn short_body_after_size() {
        let err = BUF16.read_from(&[0x00, 0x05, b'a', b'b'], 0).unwrap_err();
        assert_eq!(
            err,
            RwError::ShortBuffer {
                expected: 5,
                actual: 2,
                offset: 2
            }
        );
    }

    #[test]
    fn short_write_is_atomic() {
        let mut buf = [0u8; 4];
        let err = BUF16
            .write_into(&Bytes::from_static(b"abc"), &mut buf, 0)
            .unwrap_err();
        assert!(err.is_short_buffer());
        assert_eq!(buf, [0; 4]);
    }

    #[test]
    fn read_slice_borrows() {
        let wire = [0x00, 0x03, b'k', b'e', b'y', 0x09];
        let (end, slice) = BUF16.read_slice(&wire, 0).unwrap();
        assert_eq!(end, 5);
        assert_eq!(slice, b"key");
        assert_eq!(slice.as_ptr(), wire[2..].as_ptr());
        assert_eq!(BUF16.skip(&wire, 0).unwrap(), 5);
    }

    #[test]
    fn strings_round_trip_and_validate() {
        let bytes = to_bytes(&STR1, &"castle".to_string()).unwrap();
        assert_eq!(bytes[0], 6);
        assert_eq!(STR1.read_from(&bytes, 0).unwrap(), (7, "castle".to_string()));
        assert_eq!(STR1.read_str(&bytes, 0).unwrap(), (7, "castle"));

        let err = STR1.read_from(&[0x02, 0xc3, 0x28], 0).unwrap_err();
        assert!(matches!(err, RwError::InvalidValue { offset: 0, .. }));
    }
}
