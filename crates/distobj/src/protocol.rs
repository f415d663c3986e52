// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lifecycle wire messages between the server and the client repository.
//!
//! Every message starts with a `u16` LE message type. The body layout per
//! type is fixed: class id (generate variants), then object id, then the
//! field payload, which is left undecoded here because reading it needs the
//! class descriptor.

use crate::codec::{self, DecodeError, EncodeError, FieldCursor, FieldValue, FieldWriter};
use crate::object::{ClassId, ObjectId};
use crate::registry::ClassDescriptor;

// --- Message type constants ---

pub const MSG_OBJECT_UPDATE_FIELD: u16 = 24;
pub const MSG_OBJECT_DISABLE: u16 = 25;
pub const MSG_OBJECT_DELETE: u16 = 27;
pub const MSG_GENERATE_WITH_REQUIRED: u16 = 34;
pub const MSG_GENERATE_WITH_REQUIRED_OTHER: u16 = 35;

/// Size of the message type prefix in bytes.
pub const HEADER_SIZE: usize = 2;

/// Which field decode a generate message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateKind {
    /// Required fields only.
    Required,
    /// Required fields followed by a counted list of optional ones.
    RequiredOther,
}

/// A lifecycle message with its field payload still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleMessage<'a> {
    Generate {
        kind: GenerateKind,
        class_id: ClassId,
        object_id: ObjectId,
        fields: &'a [u8],
    },
    UpdateField {
        object_id: ObjectId,
        field: &'a [u8],
    },
    Disable {
        object_id: ObjectId,
    },
    Delete {
        object_id: ObjectId,
    },
}

impl LifecycleMessage<'_> {
    pub fn object_id(&self) -> ObjectId {
        match self {
            LifecycleMessage::Generate { object_id, .. }
            | LifecycleMessage::UpdateField { object_id, .. }
            | LifecycleMessage::Disable { object_id }
            | LifecycleMessage::Delete { object_id } => *object_id,
        }
    }

    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleMessage::Generate {
                kind: GenerateKind::Required,
                ..
            } => "generate",
            LifecycleMessage::Generate {
                kind: GenerateKind::RequiredOther,
                ..
            } => "generate-other",
            LifecycleMessage::UpdateField { .. } => "update-field",
            LifecycleMessage::Disable { .. } => "disable",
            LifecycleMessage::Delete { .. } => "delete",
        }
    }
}

// --- Message parsing (decode) ---

/// Parse the message type and ids of a raw message.
pub fn parse_message(data: &[u8]) -> Result<LifecycleMessage<'_>, DecodeError> {
    if data.len() < HEADER_SIZE {
        return Err(DecodeError::MessageTooShort {
            expected: HEADER_SIZE,
            actual: data.len(),
        });
    }
    let mut cursor = FieldCursor::new(data);
    let message_type = cursor.get_u16()?;
    let body = &data[HEADER_SIZE..];

    match message_type {
        MSG_GENERATE_WITH_REQUIRED => parse_generate(body, GenerateKind::Required),
        MSG_GENERATE_WITH_REQUIRED_OTHER => parse_generate(body, GenerateKind::RequiredOther),
        MSG_OBJECT_UPDATE_FIELD => {
            let object_id = read_object_id(body)?;
            Ok(LifecycleMessage::UpdateField {
                object_id,
                field: &body[4..],
            })
        }
        MSG_OBJECT_DISABLE => Ok(LifecycleMessage::Disable {
            object_id: read_object_id(body)?,
        }),
        MSG_OBJECT_DELETE => Ok(LifecycleMessage::Delete {
            object_id: read_object_id(body)?,
        }),
        unknown => Err(DecodeError::UnknownMessageType(unknown)),
    }
}

fn parse_generate(body: &[u8], kind: GenerateKind) -> Result<LifecycleMessage<'_>, DecodeError> {
    if body.len() < 6 {
        return Err(DecodeError::MessageTooShort {
            expected: HEADER_SIZE + 6,
            actual: HEADER_SIZE + body.len(),
        });
    }
    let mut cursor = FieldCursor::new(body);
    let class_id = ClassId(cursor.get_u16()?);
    let object_id = ObjectId(cursor.get_u32()?);
    Ok(LifecycleMessage::Generate {
        kind,
        class_id,
        object_id,
        fields: &body[6..],
    })
}

fn read_object_id(body: &[u8]) -> Result<ObjectId, DecodeError> {
    if body.len() < 4 {
        return Err(DecodeError::MessageTooShort {
            expected: HEADER_SIZE + 4,
            actual: HEADER_SIZE + body.len(),
        });
    }
    Ok(ObjectId(FieldCursor::new(body).get_u32()?))
}

// --- Message builders (encode) ---

fn header(message_type: u16, capacity: usize) -> FieldWriter {
    let mut w = FieldWriter::with_capacity(HEADER_SIZE + capacity);
    w.put_u16(message_type);
    w
}

/// Build a GENERATE_WITH_REQUIRED message around an encoded field payload.
pub fn build_generate(class_id: ClassId, object_id: ObjectId, fields: &[u8]) -> Vec<u8> {
    build_generate_kind(GenerateKind::Required, class_id, object_id, fields)
}

/// Build a GENERATE_WITH_REQUIRED_OTHER message around an encoded field payload.
pub fn build_generate_other(class_id: ClassId, object_id: ObjectId, fields: &[u8]) -> Vec<u8> {
    build_generate_kind(GenerateKind::RequiredOther, class_id, object_id, fields)
}

fn build_generate_kind(
    kind: GenerateKind,
    class_id: ClassId,
    object_id: ObjectId,
    fields: &[u8],
) -> Vec<u8> {
    let message_type = match kind {
        GenerateKind::Required => MSG_GENERATE_WITH_REQUIRED,
        GenerateKind::RequiredOther => MSG_GENERATE_WITH_REQUIRED_OTHER,
    };
    let mut w = header(message_type, 6 + fields.len());
    w.put_u16(class_id.0);
    w.put_u32(object_id.0);
    let mut msg = w.finish();
    msg.extend_from_slice(fields);
    msg
}

/// Build an OBJECT_DISABLE message.
pub fn build_disable(object_id: ObjectId) -> Vec<u8> {
    let mut w = header(MSG_OBJECT_DISABLE, 4);
    w.put_u32(object_id.0);
    w.finish()
}

/// Build an OBJECT_DELETE message.
pub fn build_delete(object_id: ObjectId) -> Vec<u8> {
    let mut w = header(MSG_OBJECT_DELETE, 4);
    w.put_u32(object_id.0);
    w.finish()
}

/// Build an OBJECT_UPDATE_FIELD message for a named field of the class.
///
/// This is the encoding used for outbound updates too.
pub fn build_update_field(
    descriptor: &ClassDescriptor,
    object_id: ObjectId,
    field_name: &str,
    args: &[FieldValue],
) -> Result<Vec<u8>, EncodeError> {
    let mut w = header(MSG_OBJECT_UPDATE_FIELD, 6);
    w.put_u32(object_id.0);
    codec::encode_field(descriptor, field_name, args, &mut w)?;
    Ok(w.finish())
}

/// Encode required field values in declaration order, for building generate
/// payloads. `values` holds one args list per required field.
pub fn encode_required_fields(
    descriptor: &ClassDescriptor,
    values: &[Vec<FieldValue>],
) -> Result<Vec<u8>, EncodeError> {
    let mut w = FieldWriter::new();
    let required: Vec<_> = descriptor.fields().iter().filter(|f| f.required).collect();
    if required.len() != values.len() {
        return Err(EncodeError::ArgCount {
            field: format!("{}::<required>", descriptor.name()),
            expected: required.len(),
            actual: values.len(),
        });
    }
    for (field, args) in required.into_iter().zip(values) {
        w.put_field_args(field, args)?;
    }
    Ok(w.finish())
}

/// Encode required values followed by the `(name, args)` optional fields.
pub fn encode_optional_fields(
    descriptor: &ClassDescriptor,
    required: &[Vec<FieldValue>],
    optional: &[(&str, Vec<FieldValue>)],
) -> Result<Vec<u8>, EncodeError> {
    let mut payload = encode_required_fields(descriptor, required)?;
    let count = u16::try_from(optional.len()).map_err(|_| EncodeError::TooLong(optional.len()))?;
    let mut w = FieldWriter::new();
    w.put_u16(count);
    for (name, args) in optional {
        codec::encode_field(descriptor, name, args, &mut w)?;
    }
    payload.extend_from_slice(&w.finish());
    Ok(payload)
}
