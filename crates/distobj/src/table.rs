// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Live object table.
//!
//! Each live object is stored together with the descriptor used to decode
//! its updates, so the two can never drift apart.

use crate::object::{DistributedObject, ObjectId};
use crate::registry::ClassDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("object {0} is already live")]
    AlreadyLive(ObjectId),

    #[error("object {0} is not live")]
    NotFound(ObjectId),
}

/// A live object and the class it is interpreted as.
pub struct LiveEntry {
    pub object: Box<dyn DistributedObject>,
    pub descriptor: Arc<ClassDescriptor>,
}

impl std::fmt::Debug for LiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveEntry")
            .field("object_id", &self.object.object_id())
            .field("class", &self.descriptor.name())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ObjectTable {
    entries: HashMap<ObjectId, LiveEntry>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ObjectId) -> Result<&LiveEntry, TableError> {
        self.entries.get(&id).ok_or(TableError::NotFound(id))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Result<&mut LiveEntry, TableError> {
        self.entries.get_mut(&id).ok_or(TableError::NotFound(id))
    }

    /// Insert a new live object. The id must not already be live.
    pub fn insert(
        &mut self,
        id: ObjectId,
        object: Box<dyn DistributedObject>,
        descriptor: Arc<ClassDescriptor>,
    ) -> Result<(), TableError> {
        if self.entries.contains_key(&id) {
            return Err(TableError::AlreadyLive(id));
        }
        self.entries.insert(id, LiveEntry { object, descriptor });
        Ok(())
    }

    /// Remove the whole entry.
    pub fn remove(&mut self, id: ObjectId) -> Result<LiveEntry, TableError> {
        self.entries.remove(&id).ok_or(TableError::NotFound(id))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Finalize and drop every live object.
    pub fn clear(&mut self) {
        for (_, mut entry) in self.entries.drain() {
            entry.object.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ClassId, FieldObject};

    fn avatar() -> Arc<ClassDescriptor> {
        Arc::new(ClassDescriptor::new(ClassId(1), "Avatar", vec![]))
    }

    fn object(id: u32) -> Box<dyn DistributedObject> {
        Box::new(FieldObject::new(ObjectId(id), "Avatar"))
    }

    #[test]
    fn test_insert_get_remove() {
        let mut table = ObjectTable::new();
        table.insert(ObjectId(7), object(7), avatar()).unwrap();

        assert!(table.contains(ObjectId(7)));
        assert_eq!(table.get(ObjectId(7)).unwrap().descriptor.name(), "Avatar");

        let entry = table.remove(ObjectId(7)).unwrap();
        assert_eq!(entry.object.object_id(), ObjectId(7));
        assert!(table.is_empty());
        assert_eq!(
            table.remove(ObjectId(7)).unwrap_err(),
            TableError::NotFound(ObjectId(7))
        );
    }

    #[test]
    fn test_insert_existing_id_fails() {
        let mut table = ObjectTable::new();
        table.insert(ObjectId(1), object(1), avatar()).unwrap();
        let err = table.insert(ObjectId(1), object(1), avatar()).unwrap_err();
        assert_eq!(err, TableError::AlreadyLive(ObjectId(1)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_ids_sorted() {
        let mut table = ObjectTable::new();
        for id in [9, 2, 5] {
            table.insert(ObjectId(id), object(id), avatar()).unwrap();
        }
        assert_eq!(table.ids(), vec![ObjectId(2), ObjectId(5), ObjectId(9)]);
    }

    #[test]
    fn test_clear_finalizes() {
        let mut table = ObjectTable::new();
        let obj = FieldObject::new(ObjectId(4), "Avatar");
        let flag = obj.finalized_flag();
        table.insert(ObjectId(4), Box::new(obj), avatar()).unwrap();

        table.clear();
        assert!(table.is_empty());
        assert!(flag.load(std::sync::atomic::Ordering::Acquire));
    }
}
