// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Class descriptor registry.
//!
//! Built once from the schema plus explicit constructor registrations and
//! read-only afterwards. Lookups are by numeric class id (wire path) or by
//! class name (application path).

use crate::object::{ClassId, DistributedObject, FieldObject, ObjectId};
use crate::schema::ClassDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Registry errors. Everything except the lookups is a load-time failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate class id {0}")]
    DuplicateId(ClassId),

    #[error("duplicate class name {0:?}")]
    DuplicateName(String),

    #[error("no constructor registered for class {0:?}")]
    MissingConstructor(String),

    #[error("constructor registered for unknown class {0:?}")]
    UnusedConstructor(String),

    #[error("class id {0} not found")]
    IdNotFound(ClassId),

    #[error("class {0:?} not found")]
    NameNotFound(String),
}

/// Wire type of one field parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float64,
    Bool,
    String,
    Blob,
}

/// One field of a class: its name, parameter kinds and whether it is sent
/// with every generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub params: Vec<FieldKind>,
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    pub fn required(name: &str, params: Vec<FieldKind>) -> Self {
        Self {
            name: name.to_string(),
            params,
            required: true,
        }
    }

    pub fn optional(name: &str, params: Vec<FieldKind>) -> Self {
        Self {
            name: name.to_string(),
            params,
            required: false,
        }
    }
}

/// Builds a fresh object for a class.
pub type Constructor = Arc<dyn Fn(ObjectId) -> Box<dyn DistributedObject> + Send + Sync>;

/// Metadata for one distributed class.
#[derive(Clone)]
pub struct ClassDescriptor {
    id: ClassId,
    name: String,
    fields: Vec<FieldDef>,
    constructor: Constructor,
}

impl ClassDescriptor {
    /// Descriptor whose instances are [`FieldObject`]s.
    pub fn new(id: ClassId, name: &str, fields: Vec<FieldDef>) -> Self {
        Self::with_constructor(id, name, fields, field_object_constructor(name))
    }

    pub fn with_constructor(
        id: ClassId,
        name: &str,
        fields: Vec<FieldDef>,
        constructor: Constructor,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            fields,
            constructor,
        }
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_by_index(&self, index: u16) -> Option<&FieldDef> {
        self.fields.get(index as usize)
    }

    /// Field and its wire index.
    pub fn field_by_name(&self, name: &str) -> Option<(u16, &FieldDef)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .and_then(|(i, f)| Some((u16::try_from(i).ok()?, f)))
    }

    /// Construct a new instance bound to `object_id`.
    pub fn construct(&self, object_id: ObjectId) -> Box<dyn DistributedObject> {
        (self.constructor)(object_id)
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Read-only map of class id / class name to descriptor.
#[derive(Debug, Default)]
pub struct ClassDescriptorRegistry {
    by_id: HashMap<ClassId, Arc<ClassDescriptor>>,
    by_name: HashMap<String, Arc<ClassDescriptor>>,
}

impl ClassDescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a registry assembled from schema definitions.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Add a descriptor under both its id and its name.
    pub fn register(&mut self, descriptor: ClassDescriptor) -> Result<(), RegistryError> {
        if self.by_id.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateId(descriptor.id));
        }
        if self.by_name.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateName(descriptor.name.clone()));
        }
        let descriptor = Arc::new(descriptor);
        self.by_name
            .insert(descriptor.name.clone(), Arc::clone(&descriptor));
        self.by_id.insert(descriptor.id, descriptor);
        Ok(())
    }

    pub fn lookup_by_id(&self, id: ClassId) -> Result<&Arc<ClassDescriptor>, RegistryError> {
        self.by_id.get(&id).ok_or(RegistryError::IdNotFound(id))
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<&Arc<ClassDescriptor>, RegistryError> {
        self.by_name
            .get(name)
            .ok_or_else(|| RegistryError::NameNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Descriptors ordered by class id.
    pub fn descriptors(&self) -> Vec<&Arc<ClassDescriptor>> {
        let mut all: Vec<_> = self.by_id.values().collect();
        all.sort_by_key(|d| d.id);
        all
    }
}

/// Pairs schema class definitions with constructors registered by name.
///
/// Whoever assembles the repository registers the concrete types here; there
/// is no implicit global list of known object types.
#[derive(Default)]
pub struct RegistryBuilder {
    constructors: HashMap<String, Constructor>,
    fallback_to_field_objects: bool,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor for one class name.
    pub fn constructor<F>(mut self, class_name: &str, f: F) -> Self
    where
        F: Fn(ObjectId) -> Box<dyn DistributedObject> + Send + Sync + 'static,
    {
        self.constructors.insert(class_name.to_string(), Arc::new(f));
        self
    }

    /// Build [`FieldObject`]s for every class without its own constructor.
    pub fn field_objects_for_unregistered(mut self) -> Self {
        self.fallback_to_field_objects = true;
        self
    }

    /// Build the registry. Fails on duplicate ids/names, on classes without
    /// a constructor, and on constructors naming no class.
    pub fn build(
        mut self,
        definitions: Vec<ClassDefinition>,
    ) -> Result<ClassDescriptorRegistry, RegistryError> {
        let mut registry = ClassDescriptorRegistry::new();

        for def in definitions {
            if registry.by_name.contains_key(&def.name) {
                return Err(RegistryError::DuplicateName(def.name));
            }
            let constructor = match self.constructors.remove(&def.name) {
                Some(ctor) => ctor,
                None if self.fallback_to_field_objects => field_object_constructor(&def.name),
                None => return Err(RegistryError::MissingConstructor(def.name)),
            };
            registry.register(ClassDescriptor::with_constructor(
                ClassId(def.id),
                &def.name,
                def.fields,
                constructor,
            ))?;
        }

        if let Some(name) = self.constructors.into_keys().min() {
            return Err(RegistryError::UnusedConstructor(name));
        }

        tracing::debug!("Class registry built with {} classes", registry.len());
        Ok(registry)
    }
}

fn field_object_constructor(class_name: &str) -> Constructor {
    let class_name = class_name.to_string();
    Arc::new(move |object_id| {
        Box::new(FieldObject::new(object_id, &class_name)) as Box<dyn DistributedObject>
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: u16, name: &str) -> ClassDefinition {
        ClassDefinition {
            id,
            name: name.to_string(),
            fields: vec![FieldDef::required("x", vec![FieldKind::Int32])],
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = ClassDescriptorRegistry::new();
        reg.register(ClassDescriptor::new(ClassId(1), "Avatar", vec![]))
            .unwrap();

        assert_eq!(reg.lookup_by_id(ClassId(1)).unwrap().name(), "Avatar");
        assert_eq!(reg.lookup_by_name("Avatar").unwrap().id(), ClassId(1));
        assert_eq!(
            reg.lookup_by_id(ClassId(2)).unwrap_err(),
            RegistryError::IdNotFound(ClassId(2))
        );
        assert!(matches!(
            reg.lookup_by_name("Ghost"),
            Err(RegistryError::NameNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_id_and_name_rejected() {
        let mut reg = ClassDescriptorRegistry::new();
        reg.register(ClassDescriptor::new(ClassId(1), "Avatar", vec![]))
            .unwrap();

        let err = reg
            .register(ClassDescriptor::new(ClassId(1), "Other", vec![]))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateId(ClassId(1)));

        let err = reg
            .register(ClassDescriptor::new(ClassId(2), "Avatar", vec![]))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("Avatar".into()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_builder_requires_constructor() {
        let err = ClassDescriptorRegistry::builder()
            .build(vec![def(1, "Avatar")])
            .unwrap_err();
        assert_eq!(err, RegistryError::MissingConstructor("Avatar".into()));
    }

    #[test]
    fn test_builder_rejects_unused_constructor() {
        let err = ClassDescriptorRegistry::builder()
            .constructor("Avatar", |id| Box::new(FieldObject::new(id, "Avatar")))
            .constructor("Zombie", |id| Box::new(FieldObject::new(id, "Zombie")))
            .build(vec![def(1, "Avatar")])
            .unwrap_err();
        assert_eq!(err, RegistryError::UnusedConstructor("Zombie".into()));
    }

    #[test]
    fn test_builder_fallback_builds_field_objects() {
        let reg = ClassDescriptorRegistry::builder()
            .field_objects_for_unregistered()
            .build(vec![def(1, "Avatar"), def(2, "Door")])
            .unwrap();

        let obj = reg.lookup_by_id(ClassId(2)).unwrap().construct(ObjectId(9));
        let obj = obj.as_any().downcast_ref::<FieldObject>().unwrap();
        assert_eq!(obj.class_name(), "Door");
        assert_eq!(obj.object_id(), ObjectId(9));
    }

    #[test]
    fn test_field_by_name_returns_index() {
        let desc = ClassDescriptor::new(
            ClassId(1),
            "Avatar",
            vec![
                FieldDef::required("a", vec![]),
                FieldDef::optional("b", vec![FieldKind::Bool]),
            ],
        );
        let (index, field) = desc.field_by_name("b").unwrap();
        assert_eq!(index, 1);
        assert!(!field.required);
        assert!(desc.field_by_index(2).is_none());
    }

    #[test]
    fn test_field_past_wire_index_range_not_addressable() {
        let mut fields: Vec<_> = (0..=u16::MAX as usize)
            .map(|i| FieldDef::optional(&format!("f{}", i), vec![]))
            .collect();
        fields.push(FieldDef::optional("overflow", vec![]));
        let desc = ClassDescriptor::new(ClassId(1), "Wide", fields);

        assert_eq!(desc.field_by_name("f65535").map(|(i, _)| i), Some(u16::MAX));
        assert!(desc.field_by_name("overflow").is_none());
    }

    #[test]
    fn test_builder_duplicate_name_with_constructor() {
        let err = ClassDescriptorRegistry::builder()
            .constructor("Avatar", |id| Box::new(FieldObject::new(id, "Avatar")))
            .build(vec![def(1, "Avatar"), def(2, "Avatar")])
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("Avatar".into()));
    }
}
