// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Distributed object identity and the capability set the repository drives.

use crate::codec::{AppliedFields, DecodedField, FieldValue};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Object id assigned by the remote peer (u32 on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric class id from the schema (u16 on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u16);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A locally mirrored object whose authoritative state lives on the server.
///
/// The repository only decides *when* these run; what an object does with
/// its fields is up to the concrete type.
pub trait DistributedObject: Send {
    /// Id assigned at construction.
    fn object_id(&self) -> ObjectId;

    /// Apply the fields carried by a generate-with-required message.
    fn apply_required_fields(&mut self, fields: AppliedFields);

    /// Apply the fields carried by a generate-with-required-other message.
    fn apply_optional_fields(&mut self, fields: AppliedFields);

    /// Apply one field update.
    fn apply_field(&mut self, field: DecodedField);

    /// Release the object. Called exactly once, when it leaves the system.
    fn finalize(&mut self);

    fn as_any(&self) -> &dyn Any;
}

/// Generic object that keeps the latest args of every field it has seen.
///
/// Used as the fallback type for classes with no dedicated implementation.
#[derive(Debug)]
pub struct FieldObject {
    object_id: ObjectId,
    class_name: String,
    fields: BTreeMap<String, Vec<FieldValue>>,
    generates: u32,
    finalized: Arc<AtomicBool>,
}

impl FieldObject {
    pub fn new(object_id: ObjectId, class_name: &str) -> Self {
        Self {
            object_id,
            class_name: class_name.to_string(),
            fields: BTreeMap::new(),
            generates: 0,
            finalized: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn field(&self, name: &str) -> Option<&[FieldValue]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<FieldValue>> {
        &self.fields
    }

    /// Number of generate messages applied to this instance.
    pub fn generate_count(&self) -> u32 {
        self.generates
    }

    /// Flag that flips once `finalize` runs; stays readable after the
    /// object itself is dropped.
    pub fn finalized_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.finalized)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    fn store(&mut self, fields: AppliedFields) {
        for field in fields {
            self.fields.insert(field.name, field.args);
        }
    }
}

impl DistributedObject for FieldObject {
    fn object_id(&self) -> ObjectId {
        self.object_id
    }

    fn apply_required_fields(&mut self, fields: AppliedFields) {
        self.generates += 1;
        self.store(fields);
    }

    fn apply_optional_fields(&mut self, fields: AppliedFields) {
        self.generates += 1;
        self.store(fields);
    }

    fn apply_field(&mut self, field: DecodedField) {
        self.fields.insert(field.name, field.args);
    }

    fn finalize(&mut self) {
        self.finalized.store(true, Ordering::Release);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
