//! Tagged unions: a discriminant followed by a case-specific body.

use std::collections::BTreeMap;

use crate::atoms::{Integer, IntegerRw};
use crate::base::{BoxedRw, LengthResult, ReadResult, Rw, WriteResult};
use crate::error::RwError;

/// Discriminant to body-codec mapping.
pub struct CaseTable<K, V> {
    cases: BTreeMap<K, BoxedRw<V>>,
}

impl<K: Integer + Ord, V> CaseTable<K, V> {
    pub fn new() -> Self {
        Self {
            cases: BTreeMap::new(),
        }
    }

    pub fn case(mut self, key: K, rw: impl Rw<Value = V> + Send + Sync + 'static) -> Self {
        self.cases.insert(key, Box::new(rw));
        self
    }

    pub fn contains(&self, key: K) -> bool {
        self.cases.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.cases.keys().copied()
    }

    /// The codec registered for `key`, or [`RwError::InvalidSwitchValue`].
    pub fn lookup(&self, key: K, offset: usize) -> Result<&BoxedRw<V>, RwError> {
        self.cases.get(&key).ok_or(RwError::InvalidSwitchValue {
            value: key.into(),
            offset,
        })
    }
}

impl<K: Integer + Ord, V> Default for CaseTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A discriminant codec followed by the body codec its value selects.
///
/// Values are `(discriminant, body)` pairs.
pub struct SwitchRw<K, V> {
    discriminant: IntegerRw<K>,
    cases: CaseTable<K, V>,
}

impl<K: Integer + Ord, V> SwitchRw<K, V> {
    pub fn new(discriminant: IntegerRw<K>, cases: CaseTable<K, V>) -> Self {
        Self {
            discriminant,
            cases,
        }
    }

    pub fn cases(&self) -> &CaseTable<K, V> {
        &self.cases
    }
}

impl<K: Integer + Ord, V> Rw for SwitchRw<K, V> {
    type Value = (K, V);

    fn byte_length(&self, (key, body): &(K, V)) -> LengthResult {
        let rw = self.cases.lookup(*key, 0)?;
        Ok(self.discriminant.width() + rw.byte_length(body)?)
    }

    fn write_into(&self, (key, body): &(K, V), buffer: &mut [u8], offset: usize) -> WriteResult {
        let rw = self.cases.lookup(*key, offset)?;
        let length = self.discriminant.width() + rw.byte_length(body)?;
        crate::base::check_remaining(buffer, offset, length)?;
        let offset = self.discriminant.write_into(key, buffer, offset)?;
        rw.write_into(body, buffer, offset)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<(K, V)> {
        let (offset, key) = self.discriminant.read_from(buffer, offset)?;
        let rw = self.cases.lookup(key, offset)?;
        let (offset, body) = rw.read_from(buffer, offset)?;
        Ok((offset, (key, body)))
    }
}

/// Adapts a concrete body codec into one case of an enum `V`.
///
/// `wrap` lifts a decoded body into the enum; `unwrap` projects the enum back
/// to the body, returning `None` when the enum holds a different case.
pub struct VariantRw<R: Rw, V> {
    name: &'static str,
    rw: R,
    wrap: fn(R::Value) -> V,
    unwrap: fn(&V) -> Option<&R::Value>,
}

impl<R: Rw, V> VariantRw<R, V> {
    pub fn new(
        name: &'static str,
        rw: R,
        wrap: fn(R::Value) -> V,
        unwrap: fn(&V) -> Option<&R::Value>,
    ) -> Self {
        Self {
            name,
            rw,
            wrap,
            unwrap,
        }
    }

    fn body<'a>(&self, value: &'a V) -> Result<&'a R::Value, RwError> {
        (self.unwrap)(value).ok_or(RwError::NoSuchField {
            structure: std::any::type_name::<V>(),
            field: self.name,
        })
    }
}

impl<R: Rw, V> Rw for VariantRw<R, V> {
    type Value = V;

    fn byte_length(&self, value: &V) -> LengthResult {
        self.rw.byte_length(self.body(value)?)
    }

    fn write_into(&self, value: &V, buffer: &mut [u8], offset: usize) -> WriteResult {
        self.rw.write_into(self.body(value)?, buffer, offset)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<V> {
        let (offset, body) = self.rw.read_from(buffer, offset)?;
        Ok((offset, (self.wrap)(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{UINT16_BE, UINT32_BE, UINT8};
    use crate::base::{from_bytes, to_bytes};
    use crate::variable::StringRw;

    #[derive(Debug, Clone, PartialEq)]
    enum Shape {
        Count(u32),
        Label(String),
    }

    fn shape_rw() -> SwitchRw<u8, Shape> {
        let cases = CaseTable::new()
            .case(
                0,
                VariantRw::new(
                    "count",
                    UINT32_BE,
                    Shape::Count,
                    |s: &Shape| match s {
                        Shape::Count(n) => Some(n),
                        _ => None,
                    },
                ),
            )
            .case(
                1,
                VariantRw::new(
                    "label",
                    StringRw::new(UINT16_BE),
                    Shape::Label,
                    |s: &Shape| match s {
                        Shape::Label(l) => Some(l),
                        _ => None,
                    },
                ),
            );
        SwitchRw::new(UINT8, cases)
    }

    #[test]
    fn discriminant_selects_body() {
        let rw = shape_rw();
        let bytes = to_bytes(&rw, &(1, Shape::Label("hi".into()))).unwrap();
        assert_eq!(bytes.as_ref(), &[0x01, 0x00, 0x02, b'h', b'i']);
        assert_eq!(
            from_bytes(&rw, &bytes).unwrap(),
            (1, Shape::Label("hi".into()))
        );

        let bytes = to_bytes(&rw, &(0, Shape::Count(7))).unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0, 0, 0, 7]);
    }

    #[test]
    fn unknown_discriminant_on_read() {
        let err = shape_rw().read_from(&[0x02, 0xff, 0xff], 0).unwrap_err();
        assert_eq!(
            err,
            RwError::InvalidSwitchValue {
                value: 2,
                offset: 1
            }
        );
    }

    #[test]
    fn unknown_discriminant_on_write_leaves_buffer() {
        let rw = shape_rw();
        let mut buf = [0xccu8; 8];
        let err = rw.write_into(&(2, Shape::Count(1)), &mut buf, 0).unwrap_err();
        assert!(matches!(err, RwError::InvalidSwitchValue { value: 2, .. }));
        assert_eq!(buf, [0xcc; 8]);
        assert!(rw.byte_length(&(9, Shape::Count(1))).is_err());
    }

    #[test]
    fn mismatched_case_is_rejected() {
        let rw = shape_rw();
        let err = rw.byte_length(&(0, Shape::Label("x".into()))).unwrap_err();
        assert!(matches!(err, RwError::NoSuchField { field: "count", .. }));
    }

    #[test]
    fn short_body_after_discriminant() {
        let err = shape_rw().read_from(&[0x00, 0x01], 0).unwrap_err();
        assert_eq!(
            err,
            RwError::ShortBuffer {
                expected: 4,
                actual: 1,
                offset: 1
            }
        );
        let mut buf = [0u8; 3];
        assert!(shape_rw()
            .write_into(&(0, Shape::Count(5)), &mut buf, 0)
            .unwrap_err()
            .is_short_buffer());
        assert_eq!(buf, [0; 3]);
    }

    #[test]
    fn table_introspection() {
        let rw = shape_rw();
        assert!(rw.cases().contains(1));
        assert!(!rw.cases().contains(2));
        assert_eq!(rw.cases().keys().collect::<Vec<_>>(), [0, 1]);
    }
}
