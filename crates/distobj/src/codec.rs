// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field codec - packed little-endian encode/decode of distributed object fields.
//!
//! Unlike CDR there is no alignment: every value is written back to back,
//! strings and blobs carry a `u16` length prefix. The cursor is stateful over
//! the remaining bytes of a message, so callers must decode in wire order.

use crate::registry::{ClassDescriptor, FieldDef, FieldKind};
use thiserror::Error;

/// Errors raised while decoding a message body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer underflow: needed {needed} bytes at offset {offset}, {remaining} left")]
    BufferUnderflow {
        needed: usize,
        offset: usize,
        remaining: usize,
    },

    #[error("message too short: expected {expected} bytes, got {actual}")]
    MessageTooShort { expected: usize, actual: usize },

    #[error("unknown message type: {0}")]
    UnknownMessageType(u16),

    #[error("class {class} has no field with index {index}")]
    UnknownFieldIndex { class: String, index: u16 },

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
}

/// Errors raised while encoding an outbound field update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("class {class} has no field named {field:?}")]
    UnknownField { class: String, field: String },

    #[error("field {field:?} takes {expected} args, got {actual}")]
    ArgCount {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("field {field:?} arg {position}: expected {expected:?}, got {actual:?}")]
    ArgKind {
        field: String,
        position: usize,
        expected: FieldKind,
        actual: FieldKind,
    },

    #[error("{0} bytes exceed the u16 length prefix")]
    TooLong(usize),
}

/// A single typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float64(f64),
    Bool(bool),
    String(String),
    Blob(Vec<u8>),
}

impl FieldValue {
    /// The kind this value encodes as.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Int8(_) => FieldKind::Int8,
            FieldValue::Int16(_) => FieldKind::Int16,
            FieldValue::Int32(_) => FieldKind::Int32,
            FieldValue::Int64(_) => FieldKind::Int64,
            FieldValue::UInt8(_) => FieldKind::UInt8,
            FieldValue::UInt16(_) => FieldKind::UInt16,
            FieldValue::UInt32(_) => FieldKind::UInt32,
            FieldValue::UInt64(_) => FieldKind::UInt64,
            FieldValue::Float64(_) => FieldKind::Float64,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Blob(_) => FieldKind::Blob,
        }
    }
}

/// One decoded field: its name and its args in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub name: String,
    pub args: Vec<FieldValue>,
}

/// Fields decoded out of a generate message, in wire order.
pub type AppliedFields = Vec<DecodedField>;

// ---------------------------------------------------------------------------
// FieldWriter
// ---------------------------------------------------------------------------

/// Packed little-endian writer.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write a length-prefixed byte run (u16 LE length).
    pub fn put_bytes(&mut self, v: &[u8]) -> Result<(), EncodeError> {
        let len = u16::try_from(v.len()).map_err(|_| EncodeError::TooLong(v.len()))?;
        self.put_u16(len);
        self.buf.extend_from_slice(v);
        Ok(())
    }

    /// Write one argument value.
    pub fn put_value(&mut self, value: &FieldValue) -> Result<(), EncodeError> {
        match value {
            FieldValue::Int8(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Int16(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Int32(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Int64(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::UInt8(v) => self.put_u8(*v),
            FieldValue::UInt16(v) => self.put_u16(*v),
            FieldValue::UInt32(v) => self.put_u32(*v),
            FieldValue::UInt64(v) => self.put_u64(*v),
            FieldValue::Float64(v) => self.buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Bool(v) => self.put_u8(u8::from(*v)),
            FieldValue::String(s) => self.put_bytes(s.as_bytes())?,
            FieldValue::Blob(b) => self.put_bytes(b)?,
        }
        Ok(())
    }

    /// Write a field's args after checking them against its definition.
    pub fn put_field_args(&mut self, field: &FieldDef, args: &[FieldValue]) -> Result<(), EncodeError> {
        check_args(field, args)?;
        for arg in args {
            self.put_value(arg)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

fn check_args(field: &FieldDef, args: &[FieldValue]) -> Result<(), EncodeError> {
    if args.len() != field.params.len() {
        return Err(EncodeError::ArgCount {
            field: field.name.clone(),
            expected: field.params.len(),
            actual: args.len(),
        });
    }
    for (position, (arg, expected)) in args.iter().zip(&field.params).enumerate() {
        if arg.kind() != *expected {
            return Err(EncodeError::ArgKind {
                field: field.name.clone(),
                position,
                expected: *expected,
                actual: arg.kind(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// FieldCursor
// ---------------------------------------------------------------------------

/// Stateful read position over a message buffer.
#[derive(Debug)]
pub struct FieldCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::BufferUnderflow {
                needed: n,
                offset: self.pos,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn get_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn get_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    /// Read a u16-length-prefixed byte run.
    pub fn get_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.get_u16()? as usize;
        self.take(len)
    }

    /// Read one value of the given kind.
    pub fn get_value(&mut self, kind: FieldKind) -> Result<FieldValue, DecodeError> {
        let value = match kind {
            FieldKind::Int8 => FieldValue::Int8(i8::from_le_bytes(self.take_array()?)),
            FieldKind::Int16 => FieldValue::Int16(i16::from_le_bytes(self.take_array()?)),
            FieldKind::Int32 => FieldValue::Int32(i32::from_le_bytes(self.take_array()?)),
            FieldKind::Int64 => FieldValue::Int64(i64::from_le_bytes(self.take_array()?)),
            FieldKind::UInt8 => FieldValue::UInt8(self.get_u8()?),
            FieldKind::UInt16 => FieldValue::UInt16(self.get_u16()?),
            FieldKind::UInt32 => FieldValue::UInt32(self.get_u32()?),
            FieldKind::UInt64 => FieldValue::UInt64(self.get_u64()?),
            FieldKind::Float64 => FieldValue::Float64(f64::from_le_bytes(self.take_array()?)),
            FieldKind::Bool => FieldValue::Bool(self.get_u8()? != 0),
            FieldKind::String => {
                let raw = self.get_bytes()?;
                let s = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)?;
                FieldValue::String(s.to_string())
            }
            FieldKind::Blob => FieldValue::Blob(self.get_bytes()?.to_vec()),
        };
        Ok(value)
    }

    /// Read all args of one field.
    pub fn get_field(&mut self, field: &FieldDef) -> Result<DecodedField, DecodeError> {
        let args = field
            .params
            .iter()
            .map(|kind| self.get_value(*kind))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DecodedField {
            name: field.name.clone(),
            args,
        })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }
}

// ---------------------------------------------------------------------------
// Descriptor-driven decode/encode
// ---------------------------------------------------------------------------

/// Decode every `required` field of the class, in declaration order.
pub fn decode_required_fields(
    descriptor: &ClassDescriptor,
    cursor: &mut FieldCursor<'_>,
) -> Result<AppliedFields, DecodeError> {
    descriptor
        .fields()
        .iter()
        .filter(|f| f.required)
        .map(|f| cursor.get_field(f))
        .collect()
}

/// Decode the required fields followed by a counted list of
/// `(field index, args)` pairs.
pub fn decode_optional_fields(
    descriptor: &ClassDescriptor,
    cursor: &mut FieldCursor<'_>,
) -> Result<AppliedFields, DecodeError> {
    let mut fields = decode_required_fields(descriptor, cursor)?;
    let count = cursor.get_u16()?;
    fields.reserve(count as usize);
    for _ in 0..count {
        fields.push(decode_indexed_field(descriptor, cursor)?);
    }
    Ok(fields)
}

/// Decode one `(field index, args)` pair, as carried by a field update.
pub fn decode_single_field(
    descriptor: &ClassDescriptor,
    cursor: &mut FieldCursor<'_>,
) -> Result<DecodedField, DecodeError> {
    decode_indexed_field(descriptor, cursor)
}

fn decode_indexed_field(
    descriptor: &ClassDescriptor,
    cursor: &mut FieldCursor<'_>,
) -> Result<DecodedField, DecodeError> {
    let index = cursor.get_u16()?;
    let field = descriptor
        .field_by_index(index)
        .ok_or_else(|| DecodeError::UnknownFieldIndex {
            class: descriptor.name().to_string(),
            index,
        })?;
    cursor.get_field(field)
}

/// Encode `(field index, args)` for a named field of the class.
pub fn encode_field(
    descriptor: &ClassDescriptor,
    field_name: &str,
    args: &[FieldValue],
    writer: &mut FieldWriter,
) -> Result<(), EncodeError> {
    let (index, field) =
        descriptor
            .field_by_name(field_name)
            .ok_or_else(|| EncodeError::UnknownField {
                class: descriptor.name().to_string(),
                field: field_name.to_string(),
            })?;
    writer.put_u16(index);
    writer.put_field_args(field, args)
}
