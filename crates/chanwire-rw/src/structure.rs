//! Struct codecs.
//!
//! A [`StructRw`] is an ordered list of fields. Encoding runs in two passes:
//! every field first gets a chance to [`prepare`](FieldRw::prepare) a scratch
//! context `C` (this is where a field whose value depends on a later sibling,
//! such as a frame's total size, gets computed), then fields are sized and
//! written in declaration order against that context. Decoding threads the same
//! kind of context through the fields so that a later field can see what an
//! earlier one read.

use crate::base::{check_remaining, LengthResult, ReadResult, Rw, WriteResult};
use crate::error::RwError;

/// One field of a [`StructRw<T, C>`].
pub trait FieldRw<T, C>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the field has a value to encode.
    fn is_present(&self, _value: &T) -> bool {
        true
    }

    /// First encode pass: record dependent quantities into `ctx`.
    fn prepare(&self, _value: &T, _ctx: &mut C) -> Result<(), RwError> {
        Ok(())
    }

    fn byte_length(&self, value: &T, ctx: &C) -> LengthResult;

    fn write_into(&self, value: &T, ctx: &C, buffer: &mut [u8], offset: usize) -> WriteResult;

    /// Decode this field into `value`, returning the new offset.
    fn read_into(&self, value: &mut T, ctx: &mut C, buffer: &[u8], offset: usize) -> WriteResult;
}

enum Getter<T, V> {
    Always(fn(&T) -> &V),
    Optional(fn(&T) -> Option<&V>),
}

/// A named field copied to and from an attribute of `T`.
pub struct Field<T, R: Rw> {
    name: &'static str,
    rw: R,
    get: Getter<T, R::Value>,
    set: fn(&mut T, R::Value),
}

impl<T, R: Rw> Field<T, R> {
    pub fn new(
        name: &'static str,
        rw: R,
        get: fn(&T) -> &R::Value,
        set: fn(&mut T, R::Value),
    ) -> Self {
        Self {
            name,
            rw,
            get: Getter::Always(get),
            set,
        }
    }

    /// A field that may be unset on the value; encoding an unset field fails
    /// with [`RwError::MissingStructField`].
    pub fn required(
        name: &'static str,
        rw: R,
        get: fn(&T) -> Option<&R::Value>,
        set: fn(&mut T, R::Value),
    ) -> Self {
        Self {
            name,
            rw,
            get: Getter::Optional(get),
            set,
        }
    }

    fn value<'a>(&self, value: &'a T) -> Option<&'a R::Value> {
        match self.get {
            Getter::Always(get) => Some(get(value)),
            Getter::Optional(get) => get(value),
        }
    }

    fn missing(&self) -> RwError {
        RwError::MissingStructField {
            structure: short_type_name::<T>(),
            field: self.name,
        }
    }
}

impl<T, C, R> FieldRw<T, C> for Field<T, R>
where
    R: Rw + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_present(&self, value: &T) -> bool {
        self.value(value).is_some()
    }

    fn byte_length(&self, value: &T, _ctx: &C) -> LengthResult {
        let field = self.value(value).ok_or_else(|| self.missing())?;
        self.rw.byte_length(field)
    }

    fn write_into(&self, value: &T, _ctx: &C, buffer: &mut [u8], offset: usize) -> WriteResult {
        let field = self.value(value).ok_or_else(|| self.missing())?;
        self.rw.write_into(field, buffer, offset)
    }

    fn read_into(&self, value: &mut T, _ctx: &mut C, buffer: &[u8], offset: usize) -> WriteResult {
        let (offset, field) = self.rw.read_from(buffer, offset)?;
        (self.set)(value, field);
        Ok(offset)
    }
}

/// `T`'s name without its module path or generic arguments.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A field whose encoded value is derived from the prepared context rather
/// than stored on `T` (a length or type tag, for example).
pub struct Computed<T, C, R: Rw> {
    name: &'static str,
    rw: R,
    compute: fn(&T, &C) -> R::Value,
    store: fn(&mut T, &mut C, R::Value),
}

impl<T, C, R: Rw> Computed<T, C, R> {
    pub fn new(
        name: &'static str,
        rw: R,
        compute: fn(&T, &C) -> R::Value,
        store: fn(&mut T, &mut C, R::Value),
    ) -> Self {
        Self {
            name,
            rw,
            compute,
            store,
        }
    }
}

impl<T, C, R> FieldRw<T, C> for Computed<T, C, R>
where
    R: Rw + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn byte_length(&self, value: &T, ctx: &C) -> LengthResult {
        self.rw.byte_length(&(self.compute)(value, ctx))
    }

    fn write_into(&self, value: &T, ctx: &C, buffer: &mut [u8], offset: usize) -> WriteResult {
        self.rw.write_into(&(self.compute)(value, ctx), buffer, offset)
    }

    fn read_into(&self, value: &mut T, ctx: &mut C, buffer: &[u8], offset: usize) -> WriteResult {
        let (offset, field) = self.rw.read_from(buffer, offset)?;
        (self.store)(value, ctx, field);
        Ok(offset)
    }
}

type PrepareHook<T, C> = fn(&T, &mut C) -> Result<(), RwError>;
type ReadHook<T, C> = fn(&mut T, &mut C, &[u8], usize) -> WriteResult;

/// A field with no stored value and no bytes of its own, used to compute
/// dependent quantities before encoding or to validate after decoding.
pub struct Hook<T, C> {
    name: &'static str,
    prepare: Option<PrepareHook<T, C>>,
    read: Option<ReadHook<T, C>>,
}

impl<T, C> Hook<T, C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            prepare: None,
            read: None,
        }
    }

    pub fn on_prepare(mut self, hook: PrepareHook<T, C>) -> Self {
        self.prepare = Some(hook);
        self
    }

    pub fn on_read(mut self, hook: ReadHook<T, C>) -> Self {
        self.read = Some(hook);
        self
    }
}

impl<T, C> FieldRw<T, C> for Hook<T, C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn prepare(&self, value: &T, ctx: &mut C) -> Result<(), RwError> {
        match self.prepare {
            Some(hook) => hook(value, ctx),
            None => Ok(()),
        }
    }

    fn byte_length(&self, _value: &T, _ctx: &C) -> LengthResult {
        Ok(0)
    }

    fn write_into(&self, _value: &T, _ctx: &C, _buffer: &mut [u8], offset: usize) -> WriteResult {
        Ok(offset)
    }

    fn read_into(&self, value: &mut T, ctx: &mut C, buffer: &[u8], offset: usize) -> WriteResult {
        match self.read {
            Some(hook) => hook(value, ctx, buffer, offset),
            None => Ok(offset),
        }
    }
}

/// `width` reserved bytes: written as zeros, skipped on read.
pub struct Reserved {
    name: &'static str,
    width: usize,
}

impl Reserved {
    pub fn new(name: &'static str, width: usize) -> Self {
        Self { name, width }
    }
}

impl<T, C> FieldRw<T, C> for Reserved {
    fn name(&self) -> &'static str {
        self.name
    }

    fn byte_length(&self, _value: &T, _ctx: &C) -> LengthResult {
        Ok(self.width)
    }

    fn write_into(&self, _value: &T, _ctx: &C, buffer: &mut [u8], offset: usize) -> WriteResult {
        check_remaining(buffer, offset, self.width)?;
        buffer[offset..offset + self.width].fill(0);
        Ok(offset + self.width)
    }

    fn read_into(&self, _value: &mut T, _ctx: &mut C, buffer: &[u8], offset: usize) -> WriteResult {
        check_remaining(buffer, offset, self.width)?;
        Ok(offset + self.width)
    }
}

/// Ordered composition of fields into an aggregate `T`.
pub struct StructRw<T, C = ()> {
    name: &'static str,
    fields: Vec<Box<dyn FieldRw<T, C>>>,
}

impl<T, C> StructRw<T, C>
where
    T: Default,
    C: Default,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// Append a field in emission order.
    pub fn field(mut self, field: impl FieldRw<T, C> + 'static) -> Self {
        self.fields.push(Box::new(field));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.name())
    }

    fn prepare(&self, value: &T) -> Result<C, RwError> {
        let mut ctx = C::default();
        for field in &self.fields {
            if !field.is_present(value) {
                return Err(RwError::MissingStructField {
                    structure: self.name,
                    field: field.name(),
                });
            }
            field.prepare(value, &mut ctx)?;
        }
        Ok(ctx)
    }

    fn length_with(&self, value: &T, ctx: &C) -> LengthResult {
        self.fields.iter().try_fold(0usize, |total, field| {
            let length = field.byte_length(value, ctx).map_err(|err| self.own(err))?;
            Ok(total + length)
        })
    }

    /// Report missing fields against this struct's name.
    fn own(&self, err: RwError) -> RwError {
        match err {
            RwError::MissingStructField { field, .. } => RwError::MissingStructField {
                structure: self.name,
                field,
            },
            err => err,
        }
    }
}

impl<T, C> Rw for StructRw<T, C>
where
    T: Default,
    C: Default,
{
    type Value = T;

    fn byte_length(&self, value: &T) -> LengthResult {
        let ctx = self.prepare(value)?;
        self.length_with(value, &ctx)
    }

    fn write_into(&self, value: &T, buffer: &mut [u8], offset: usize) -> WriteResult {
        let ctx = self.prepare(value)?;
        let length = self.length_with(value, &ctx)?;
        check_remaining(buffer, offset, length)?;
        self.fields.iter().try_fold(offset, |offset, field| {
            field
                .write_into(value, &ctx, buffer, offset)
                .map_err(|err| self.own(err))
        })
    }

    fn read_from(&self, buffer: &[u8], offset: usize) -> ReadResult<T> {
        let mut value = T::default();
        let mut ctx = C::default();
        let mut offset = offset;
        for field in &self.fields {
            offset = field.read_into(&mut value, &mut ctx, buffer, offset)?;
        }
        Ok((offset, value))
    }
}
