//! Fixed-width atoms.
//!
//! Integers are bounds-checked on write against the codec's `min`/`max`
//! (the full range of the Rust type unless narrowed with
//! [`IntegerRw::bounded`]). Floats carry no bounds.

use bytes::{Buf, BufMut};

use crate::base::{check_remaining, LengthResult, ReadResult, Rw, WriteResult};
use crate::error::RwError;

/// Byte order of a multi-byte atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// A plain-old-data value with a fixed encoded width.
pub trait Atom: Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    const WIDTH: usize;

    fn get(src: &[u8], endian: Endian) -> Self;
    fn put(self, dst: &mut [u8], endian: Endian);
}

/// An integer atom. Conversions to `usize` back size prefixes.
pub trait Integer: Atom + PartialOrd + Into<i128> {
    const MIN: Self;
    const MAX: Self;

    fn from_usize(n: usize) -> Option<Self>;
    fn to_usize(self) -> Option<usize>;
}

macro_rules! atom {
    ($ty:ty, $get_be:ident, $get_le:ident, $put_be:ident, $put_le:ident) => {
        impl Atom for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn get(mut src: &[u8], endian: Endian) -> Self {
                match endian {
                    Endian::Big => src.$get_be(),
                    Endian::Little => src.$get_le(),
                }
            }

            fn put(self, mut dst: &mut [u8], endian: Endian) {
                match endian {
                    Endian::Big => dst.$put_be(self),
                    Endian::Little => dst.$put_le(self),
                }
            }
        }
    };
}

macro_rules! integer {
    ($ty:ty, $get_be:ident, $get_le:ident, $put_be:ident, $put_le:ident) => {
        atom!($ty, $get_be, $get_le, $put_be, $put_le);

        impl Integer for $ty {
            const MIN: Self = <$ty>::MIN;
            const MAX: Self = <$ty>::MAX;

            fn from_usize(n: usize) -> Option<Self> {
                <$ty>::try_from(n).ok()
            }

            fn to_usize(self) -> Option<usize> {
                usize::try_from(self).ok()
            }
        }
    };
}

integer!(u8, get_u8, get_u8, put_u8, put_u8);
integer!(i8, get_i8, get_i8, put_i8, put_i8);
integer!(u16, get_u16, get_u16_le, put_u16, put_u16_le);
integer!(i16, get_i16, get_i16_le, put_i16, put_i16_le);
integer!(u32, get_u32, get_u32_le, put_u32, put_u32_le);
integer!(i32, get_i32, get_i32_le, put_i32, put_i32_le);
integer!(u64, get_u64, get_u64_le, put_u64, put_u64_le);
integer!(i64, get_i64, get_i64_le, put_i64, put_i64_le);
atom!(f32, get_f32, get_f32_le, put_f32, put_f32_le);
atom!(f64, get_f64, get_f64_le, put_f64, put_f64_le);

/// Codec for an unbounded fixed-width atom (floats and doubles).
#[derive(Debug, Clone, Copy)]
pub struct AtomRw<T> {
    endian: Endian,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Atom> AtomRw<T> {
    pub const fn new(endian: Endian) -> Self {
        Self {
            endian,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn width(&self) -> usize {
        T::WIDTH
    }
}

impl<T: Atom> Rw for AtomRw<T> {
    type Value = T;

    fn byte_length(&self, _value: &T) -> LengthResult {
        Ok(T::WIDTH)
    }

    fn write_into(&self, value: &T, buffer: &mut [u8], offset: usize) -> WriteResult {
        check_remaining(buffer, offset, T::WIDTH)?;
        value.put(&mut buffer[offset..offset + T::WIDTH], self.endian);
        Ok(offset + T::WIDTH)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<T> {
        check_remaining(buffer, offset, T::WIDTH)?;
        let value = T::get(&buffer[offset..offset + T::WIDTH], self.endian);
        Ok((offset + T::WIDTH, value))
    }
}

/// Codec for a range-checked integer.
#[derive(Debug, Clone, Copy)]
pub struct IntegerRw<T> {
    endian: Endian,
    min: T,
    max: T,
}

impl<T: Integer> IntegerRw<T> {
    /// Full-range codec for `T`.
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            min: T::MIN,
            max: T::MAX,
        }
    }

    /// Narrow the accepted range for writes.
    pub fn bounded(self, min: T, max: T) -> Self {
        Self { min, max, ..self }
    }

    pub fn width(&self) -> usize {
        T::WIDTH
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Range-check `value` as if it were about to be written at `offset`.
    pub fn check(&self, value: T, offset: usize) -> Result<(), RwError> {
        if value < self.min || value > self.max {
            return Err(self.range_error(value.into(), offset));
        }
        Ok(())
    }

    /// Convert a length into this codec's value type, or fail with a range error.
    pub fn from_len(&self, len: usize, offset: usize) -> Result<T, RwError> {
        let value = T::from_usize(len).ok_or_else(|| self.range_error(len as i128, offset))?;
        self.check(value, offset)?;
        Ok(value)
    }

    fn range_error(&self, value: i128, offset: usize) -> RwError {
        RwError::Range {
            value,
            min: self.min.into(),
            max: self.max.into(),
            offset,
        }
    }
}

impl<T: Integer> Rw for IntegerRw<T> {
    type Value = T;

    fn byte_length(&self, _value: &T) -> LengthResult {
        Ok(T::WIDTH)
    }

    fn write_into(&self, value: &T, buffer: &mut [u8], offset: usize) -> WriteResult {
        self.check(*value, offset)?;
        check_remaining(buffer, offset, T::WIDTH)?;
        value.put(&mut buffer[offset..offset + T::WIDTH], self.endian);
        Ok(offset + T::WIDTH)
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<T> {
        check_remaining(buffer, offset, T::WIDTH)?;
        let value = T::get(&buffer[offset..offset + T::WIDTH], self.endian);
        Ok((offset + T::WIDTH, value))
    }
}

macro_rules! integer_const {
    ($name:ident, $ty:ty, $endian:expr) => {
        pub const $name: IntegerRw<$ty> = IntegerRw {
            endian: $endian,
            min: <$ty>::MIN,
            max: <$ty>::MAX,
        };
    };
}

integer_const!(INT8, i8, Endian::Big);
integer_const!(UINT8, u8, Endian::Big);
integer_const!(INT16_BE, i16, Endian::Big);
integer_const!(INT16_LE, i16, Endian::Little);
integer_const!(UINT16_BE, u16, Endian::Big);
integer_const!(UINT16_LE, u16, Endian::Little);
integer_const!(INT32_BE, i32, Endian::Big);
integer_const!(INT32_LE, i32, Endian::Little);
integer_const!(UINT32_BE, u32, Endian::Big);
integer_const!(UINT32_LE, u32, Endian::Little);
integer_const!(INT64_BE, i64, Endian::Big);
integer_const!(INT64_LE, i64, Endian::Little);
integer_const!(UINT64_BE, u64, Endian::Big);
integer_const!(UINT64_LE, u64, Endian::Little);

pub const FLOAT_BE: AtomRw<f32> = AtomRw::new(Endian::Big);
pub const FLOAT_LE: AtomRw<f32> = AtomRw::new(Endian::Little);
pub const DOUBLE_BE: AtomRw<f64> = AtomRw::new(Endian::Big);
pub const DOUBLE_LE: AtomRw<f64> = AtomRw::new(Endian::Little);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::to_bytes;

    #[test]
    fn integer_layouts() {
        assert_eq!(to_bytes(&UINT8, &0xab).unwrap().as_ref(), &[0xab]);
        assert_eq!(to_bytes(&INT8, &-1).unwrap().as_ref(), &[0xff]);
        assert_eq!(
            to_bytes(&UINT16_BE, &0x0102).unwrap().as_ref(),
            &[0x01, 0x02]
        );
        assert_eq!(
            to_bytes(&UINT16_LE, &0x0102).unwrap().as_ref(),
            &[0x02, 0x01]
        );
        assert_eq!(
            to_bytes(&INT32_BE, &-2).unwrap().as_ref(),
            &[0xff, 0xff, 0xff, 0xfe]
        );
        assert_eq!(
            to_bytes(&UINT32_LE, &0x0a0b0c0d).unwrap().as_ref(),
            &[0x0d, 0x0c, 0x0b, 0x0a]
        );
        assert_eq!(
            to_bytes(&UINT64_BE, &1).unwrap().as_ref(),
            &[0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn reads_advance_by_width() {
        let buf = [0x00, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(UINT16_BE.read_from(&buf, 1).unwrap(), (3, 0x0102));
        assert_eq!(UINT16_LE.read_from(&buf, 1).unwrap(), (3, 0x0201));
        assert_eq!(UINT32_BE.read_from(&buf, 1).unwrap(), (5, 0x01020304));
        assert_eq!(INT16_LE.read_from(&[0xfe, 0xff], 0).unwrap(), (2, -2));
    }

    #[test]
    fn doubles_match_ieee_layout() {
        let bytes = to_bytes(&DOUBLE_BE, &37.775497).unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0x40, 0x42, 0xe3, 0x43, 0x7c, 0x56, 0x92, 0xb4]
        );
        assert_eq!(DOUBLE_BE.read_from(&bytes, 0).unwrap(), (8, 37.775497));

        let le = to_bytes(&FLOAT_LE, &1.5).unwrap();
        assert_eq!(FLOAT_LE.read_from(&le, 0).unwrap(), (4, 1.5));
        assert_eq!(FLOAT_BE.width(), 4);
    }

    #[test]
    fn short_read_reports_requirement() {
        let err = UINT32_BE.read_from(&[0, 0, 0], 0).unwrap_err();
        assert_eq!(
            err,
            RwError::ShortBuffer {
                expected: 4,
                actual: 3,
                offset: 0
            }
        );
        let err = DOUBLE_LE.read_from(&[0; 10], 4).unwrap_err();
        assert!(err.is_short_buffer());
    }

    #[test]
    fn short_write_leaves_buffer_untouched() {
        let mut buf = [0xeeu8; 3];
        let err = UINT32_BE.write_into(&0x01020304, &mut buf, 0).unwrap_err();
        assert!(err.is_short_buffer());
        assert_eq!(buf, [0xee; 3]);

        let err = UINT16_BE.write_into(&7, &mut buf, 2).unwrap_err();
        assert!(err.is_short_buffer());
        assert_eq!(buf, [0xee; 3]);
    }

    #[test]
    fn bounded_write_rejects_out_of_range() {
        let ttl = UINT32_BE.bounded(1, 60_000);
        let mut buf = [0u8; 4];
        let err = ttl.write_into(&0, &mut buf, 0).unwrap_err();
        assert_eq!(
            err,
            RwError::Range {
                value: 0,
                min: 1,
                max: 60_000,
                offset: 0
            }
        );
        assert!(ttl.write_into(&60_001, &mut buf, 0).is_err());
        assert_eq!(ttl.write_into(&500, &mut buf, 0).unwrap(), 4);
        assert_eq!(buf, [0, 0, 0x01, 0xf4]);
    }

    #[test]
    fn range_is_checked_before_space() {
        let small = UINT8.bounded(0, 10);
        let err = small.write_into(&11, &mut [], 0).unwrap_err();
        assert!(matches!(err, RwError::Range { value: 11, .. }));
    }

    #[test]
    fn from_len_checks_type_and_bounds() {
        assert_eq!(UINT16_BE.from_len(65_535, 0).unwrap(), u16::MAX);
        let err = UINT16_BE.from_len(65_536, 3).unwrap_err();
        assert!(matches!(
            err,
            RwError::Range {
                value: 65_536,
                max: 65_535,
                offset: 3,
                ..
            }
        ));
        let err = UINT8.bounded(0, 4).from_len(5, 0).unwrap_err();
        assert!(matches!(err, RwError::Range { max: 4, .. }));
    }
}
