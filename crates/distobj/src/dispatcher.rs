// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lifecycle dispatcher.
//!
//! Applies lifecycle messages to the live table and the retention cache:
//!
//! | Message       | Live                    | Cached                  | Absent                     |
//! |---------------|-------------------------|-------------------------|----------------------------|
//! | generate      | re-apply fields         | revive, apply fields    | construct, apply, insert   |
//! | disable       | move to cache           | warn                    | warn                       |
//! | delete        | remove, finalize        | remove, finalize        | warn                       |
//! | update field  | apply field             | protocol violation      | protocol violation         |
//!
//! Field payloads are decoded before anything is mutated, so a message that
//! fails to decode leaves both stores untouched.

use crate::cache::RetentionCache;
use crate::codec::{self, AppliedFields, DecodeError, EncodeError, FieldCursor, FieldValue};
use crate::object::{ClassId, DistributedObject, ObjectId};
use crate::protocol::{self, GenerateKind, LifecycleMessage};
use crate::registry::{ClassDescriptor, ClassDescriptorRegistry};
use crate::table::{ObjectTable, TableError};
use crate::transport::Transport;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Where an object id currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    Absent,
    Live,
    Cached,
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectState::Absent => write!(f, "absent"),
            ObjectState::Live => write!(f, "live"),
            ObjectState::Cached => write!(f, "cached"),
        }
    }
}

/// The peer (or the local application) broke the lifecycle protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("generate for object {object_id} names unknown class {class_id}")]
    UnknownClass {
        class_id: ClassId,
        object_id: ObjectId,
    },

    #[error("field update for object {object_id}, which is {state}")]
    UpdateNotLive {
        object_id: ObjectId,
        state: ObjectState,
    },

    #[error("outbound update for object {object_id}, which is {state}")]
    SendNotLive {
        object_id: ObjectId,
        state: ObjectState,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("object table invariant broken: {0}")]
    Invariant(#[from] TableError),
}

impl DispatchError {
    /// Whether the message pump must stop on this error.
    ///
    /// Undecodable messages are dropped; encode errors belong to the caller
    /// of an outbound update.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DispatchError::Protocol(_) | DispatchError::Invariant(_))
    }
}

/// Owns the object stores and drives the lifecycle state machine.
pub struct LifecycleDispatcher {
    registry: Arc<ClassDescriptorRegistry>,
    table: ObjectTable,
    cache: RetentionCache,
}

impl LifecycleDispatcher {
    pub fn new(registry: Arc<ClassDescriptorRegistry>, cache_capacity: usize) -> Self {
        Self {
            registry,
            table: ObjectTable::new(),
            cache: RetentionCache::new(cache_capacity),
        }
    }

    pub fn registry(&self) -> &ClassDescriptorRegistry {
        &self.registry
    }

    pub fn table(&self) -> &ObjectTable {
        &self.table
    }

    pub fn cache(&self) -> &RetentionCache {
        &self.cache
    }

    pub fn state(&self, id: ObjectId) -> ObjectState {
        if self.table.contains(id) {
            ObjectState::Live
        } else if self.cache.contains(id) {
            ObjectState::Cached
        } else {
            ObjectState::Absent
        }
    }

    /// Live object by id.
    pub fn object(&self, id: ObjectId) -> Option<&dyn DistributedObject> {
        self.table.get(id).ok().map(|e| &*e.object)
    }

    /// Live object downcast to its concrete type.
    pub fn object_as<T: 'static>(&self, id: ObjectId) -> Option<&T> {
        self.object(id)?.as_any().downcast_ref::<T>()
    }

    /// Descriptor a live object is currently bound to.
    pub fn descriptor_of(&self, id: ObjectId) -> Option<&Arc<ClassDescriptor>> {
        self.table.get(id).ok().map(|e| &e.descriptor)
    }

    /// Parse and apply one raw message.
    pub fn handle(&mut self, data: &[u8]) -> Result<(), DispatchError> {
        let message = protocol::parse_message(data)?;
        self.dispatch(message)
    }

    /// Apply one parsed message.
    pub fn dispatch(&mut self, message: LifecycleMessage<'_>) -> Result<(), DispatchError> {
        match message {
            LifecycleMessage::Generate {
                kind,
                class_id,
                object_id,
                fields,
            } => self.generate(kind, class_id, object_id, fields),
            LifecycleMessage::UpdateField { object_id, field } => {
                self.update_field(object_id, field)
            }
            LifecycleMessage::Disable { object_id } => {
                self.disable(object_id);
                Ok(())
            }
            LifecycleMessage::Delete { object_id } => {
                self.delete(object_id);
                Ok(())
            }
        }
    }

    fn generate(
        &mut self,
        kind: GenerateKind,
        class_id: ClassId,
        object_id: ObjectId,
        payload: &[u8],
    ) -> Result<(), DispatchError> {
        let descriptor = self
            .registry
            .lookup_by_id(class_id)
            .map(Arc::clone)
            .map_err(|_| ProtocolViolation::UnknownClass {
                class_id,
                object_id,
            })?;

        let mut cursor = FieldCursor::new(payload);
        let fields = match kind {
            GenerateKind::Required => codec::decode_required_fields(&descriptor, &mut cursor)?,
            GenerateKind::RequiredOther => {
                codec::decode_optional_fields(&descriptor, &mut cursor)?
            }
        };

        if let Ok(entry) = self.table.get_mut(object_id) {
            if entry.descriptor.id() != descriptor.id() {
                tracing::warn!(
                    "Generate for live object {} names class {}, keeping {}",
                    object_id,
                    descriptor.name(),
                    entry.descriptor.name()
                );
            }
            tracing::debug!("Object {} regenerated while live", object_id);
            apply_generate(&mut *entry.object, kind, fields);
            return Ok(());
        }

        let mut object = match self.cache.retrieve(object_id) {
            Some(object) => {
                tracing::debug!("Object {} revived from retention cache", object_id);
                object
            }
            None => {
                tracing::debug!("Object {} generated as {}", object_id, descriptor.name());
                descriptor.construct(object_id)
            }
        };
        apply_generate(&mut *object, kind, fields);
        self.table.insert(object_id, object, descriptor)?;
        Ok(())
    }

    fn update_field(&mut self, object_id: ObjectId, payload: &[u8]) -> Result<(), DispatchError> {
        if !self.table.contains(object_id) {
            return Err(ProtocolViolation::UpdateNotLive {
                object_id,
                state: self.state(object_id),
            }
            .into());
        }
        let entry = self.table.get_mut(object_id)?;
        let mut cursor = FieldCursor::new(payload);
        let field = codec::decode_single_field(&entry.descriptor, &mut cursor)?;
        tracing::trace!("Object {} field {} updated", object_id, field.name);
        entry.object.apply_field(field);
        Ok(())
    }

    fn disable(&mut self, object_id: ObjectId) {
        match self.table.remove(object_id) {
            Ok(entry) => {
                tracing::debug!("Object {} disabled into retention cache", object_id);
                self.cache.insert(object_id, entry.object);
            }
            Err(_) if self.cache.contains(object_id) => {
                tracing::warn!("Disable for object {}, which is already cached", object_id);
            }
            Err(_) => {
                tracing::warn!("Disable for unknown object {}", object_id);
            }
        }
    }

    fn delete(&mut self, object_id: ObjectId) {
        match self.table.remove(object_id) {
            Ok(mut entry) => {
                tracing::debug!("Object {} deleted", object_id);
                entry.object.finalize();
            }
            Err(_) if self.cache.delete(object_id) => {
                tracing::debug!("Cached object {} deleted", object_id);
            }
            Err(_) => {
                tracing::warn!("Delete for unknown object {}", object_id);
            }
        }
    }

    /// Encode a field update for a live object and hand it to the transport.
    pub fn send_field_update<T: Transport + ?Sized>(
        &self,
        transport: &T,
        object_id: ObjectId,
        field_name: &str,
        args: &[FieldValue],
    ) -> Result<(), DispatchError> {
        let entry = self
            .table
            .get(object_id)
            .map_err(|_| ProtocolViolation::SendNotLive {
                object_id,
                state: self.state(object_id),
            })?;
        let message = protocol::build_update_field(&entry.descriptor, object_id, field_name, args)?;
        transport.send(message);
        Ok(())
    }

    /// Finalize every live and cached object.
    pub fn clear(&mut self) {
        tracing::debug!(
            "Clearing {} live and {} cached objects",
            self.table.len(),
            self.cache.len()
        );
        self.table.clear();
        self.cache.clear();
    }
}

impl fmt::Debug for LifecycleDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleDispatcher")
            .field("classes", &self.registry.len())
            .field("live", &self.table.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

fn apply_generate(object: &mut dyn DistributedObject, kind: GenerateKind, fields: AppliedFields) {
    match kind {
        GenerateKind::Required => object.apply_required_fields(fields),
        GenerateKind::RequiredOther => object.apply_optional_fields(fields),
    }
}
