//! Transport headers: a small ordered string map with a count prefix.

use chanwire_rw::{
    atoms::Integer, IntegerRw, LengthResult, ReadResult, Rw, RwError, StringRw, WriteResult,
    UINT16_BE, UINT8,
};

/// Header key naming the calling service.
pub const CALLER_NAME: &str = "cn";

/// Header key naming the argument scheme.
pub const ARG_SCHEME: &str = "as";

/// Ordered key/value headers. Keys are unique; encode order is insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// `nh:N (key~S value~S){nh}`.
#[derive(Debug, Clone, Copy)]
pub struct HeadersRw<N, S> {
    count: IntegerRw<N>,
    string: StringRw<S>,
}

/// Call body headers: one-byte count, one-byte string sizes.
pub const CALL_HEADERS: HeadersRw<u8, u8> = HeadersRw::new(UINT8, StringRw::new(UINT8));

/// Init body headers: two-byte count, two-byte string sizes.
pub const INIT_HEADERS: HeadersRw<u16, u16> = HeadersRw::new(UINT16_BE, StringRw::new(UINT16_BE));

impl<N: Integer, S: Integer> HeadersRw<N, S> {
    pub const fn new(count: IntegerRw<N>, string: StringRw<S>) -> Self {
        Self { count, string }
    }

    pub fn count_rw(&self) -> &IntegerRw<N> {
        &self.count
    }

    pub fn string_rw(&self) -> &StringRw<S> {
        &self.string
    }

    /// Read the entry count at `offset`.
    pub fn read_count(&self, buffer: &[u8], offset: usize) -> ReadResult<usize> {
        let (end, count) = self.count.read_from(buffer, offset)?;
        let count = count
            .to_usize()
            .ok_or_else(|| RwError::invalid("negative header count", offset))?;
        Ok((end, count))
    }

    /// Offset just past the headers at `offset`.
    pub fn skip(&self, buffer: &[u8], offset: usize) -> WriteResult {
        let (mut offset, count) = self.read_count(buffer, offset)?;
        for _ in 0..count {
            offset = self.string.skip(buffer, offset)?;
            offset = self.string.skip(buffer, offset)?;
        }
        Ok(offset)
    }
}

impl<N: Integer, S: Integer> Rw for HeadersRw<N, S> {
    type Value = Headers;

    fn byte_length(&self, value: &Headers) -> LengthResult {
        self.count.from_len(value.len(), 0)?;
        value.entries.iter().try_fold(self.count.width(), |total, (k, v)| {
            Ok(total + self.string.byte_length(k)? + self.string.byte_length(v)?)
        })
    }

    fn write_into(&self, value: &Headers, buffer: &mut [u8], offset: usize) -> WriteResult {
        let length = self.byte_length(value)?;
        chanwire_rw::check_remaining(buffer, offset, length)?;
        let count = self.count.from_len(value.len(), offset)?;
        let mut offset = self.count.write_into(&count, buffer, offset)?;
        for (k, v) in &value.entries {
            offset = self.string.write_into(k, buffer, offset)?;
            offset = self.string.write_into(v, buffer, offset)?;
        }
        Ok(offset)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<Headers> {
        let (mut offset, count) = self.read_count(buffer, offset)?;
        let mut headers = Headers::new();
        for _ in 0..count {
            let key_offset = offset;
            let (end, key) = self.string.read_str(buffer, offset)?;
            let (end, value) = self.string.read_str(buffer, end)?;
            if headers.get(key).is_some() {
                return Err(RwError::invalid(
                    format!("duplicate header key {key:?}"),
                    key_offset,
                ));
            }
            headers.entries.push((key.to_owned(), value.to_owned()));
            offset = end;
        }
        Ok((offset, headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanwire_rw::{from_bytes, to_bytes};

    fn mario() -> Headers {
        Headers::new().with(CALLER_NAME, "mario").with(ARG_SCHEME, "plumber")
    }

    #[test]
    fn call_headers_layout() {
        let bytes = to_bytes(&CALL_HEADERS, &mario()).unwrap();
        assert_eq!(bytes[0], 2);
        assert_eq!(&bytes[1..4], &[2, b'c', b'n']);
        assert_eq!(bytes[4], 5);
        assert_eq!(bytes.len(), 1 + 3 + 6 + 3 + 8);
        assert_eq!(from_bytes(&CALL_HEADERS, &bytes).unwrap(), mario());
        assert_eq!(CALL_HEADERS.skip(&bytes, 0).unwrap(), bytes.len());
    }

    #[test]
    fn init_headers_use_wide_sizes() {
        let headers = Headers::new().with("host_port", "127.0.0.1:4040");
        let bytes = to_bytes(&INIT_HEADERS, &headers).unwrap();
        assert_eq!(&bytes[..4], &[0x00, 0x01, 0x00, 0x09]);
        assert_eq!(from_bytes(&INIT_HEADERS, &bytes).unwrap(), headers);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut headers = mario();
        headers.insert(CALLER_NAME, "luigi");
        assert_eq!(headers.get("cn"), Some("luigi"));
        assert_eq!(headers.iter().next(), Some(("cn", "luigi")));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn duplicate_keys_rejected() {
        let wire = [2, 1, b'k', 1, b'a', 1, b'k', 1, b'b'];
        let err = CALL_HEADERS.read_from(&wire, 0).unwrap_err();
        assert!(matches!(err, RwError::InvalidValue { offset: 5, .. }));
    }

    #[test]
    fn too_many_headers_is_range_error() {
        let headers: Headers = (0..256).map(|i| (format!("k{i}"), "")).collect();
        let err = CALL_HEADERS.byte_length(&headers).unwrap_err();
        assert!(matches!(err, RwError::Range { value: 256, .. }));
    }
}
