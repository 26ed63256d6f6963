//! Composable binary read/write combinators.
//!
//! Every codec implements [`Rw`]: it can report the encoded length of a value,
//! write the value into a caller-provided buffer at an offset, and read a value
//! back from a buffer at an offset. Nothing panics and nothing throws; every
//! operation returns a typed result that the caller must check before trusting
//! the returned offset.
//!
//! Building blocks, leaves first:
//! - [`atoms`]: fixed-width integers and floats, big- and little-endian
//! - [`variable`]: size-prefixed byte blobs and UTF-8 strings
//! - [`structure`]: ordered fields composed into an aggregate
//! - [`switch`]: tagged unions keyed by a discriminant

pub mod atoms;
pub mod base;
pub mod error;
pub mod structure;
pub mod switch;
pub mod variable;

pub use atoms::{
    AtomRw, Endian, IntegerRw, DOUBLE_BE, DOUBLE_LE, FLOAT_BE, FLOAT_LE, INT16_BE, INT16_LE,
    INT32_BE, INT32_LE, INT64_BE, INT64_LE, INT8, UINT16_BE, UINT16_LE, UINT32_BE, UINT32_LE,
    UINT64_BE, UINT64_LE, UINT8,
};
pub use base::{
    check_remaining, from_bytes, to_bytes, BoxedRw, LengthResult, ReadResult, Rw, WriteResult,
};
pub use error::{Result, RwError};
pub use structure::{Computed, Field, FieldRw, Hook, Reserved, StructRw};
pub use switch::{CaseTable, SwitchRw, VariantRw};
pub use variable::{StringRw, VariableBufferRw};
