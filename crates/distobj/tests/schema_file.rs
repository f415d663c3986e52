// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The bundled example schema loads and builds a registry.

use distobj::{load_schema, ClassDescriptorRegistry, ClassId, FieldKind, RepositoryConfig};
use std::path::Path;

fn example_schema() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("classes.toml")
}

#[test]
fn test_example_schema_builds_registry() {
    let classes = load_schema(example_schema()).unwrap();
    let registry = ClassDescriptorRegistry::builder()
        .field_objects_for_unregistered()
        .build(classes)
        .unwrap();

    let avatar = registry.lookup_by_name("Avatar").unwrap();
    assert_eq!(avatar.id(), ClassId(1));
    let (index, pos) = avatar.field_by_name("pos").unwrap();
    assert_eq!(index, 1);
    assert_eq!(pos.params, vec![FieldKind::Int32; 3]);

    let door = registry.lookup_by_id(ClassId(2)).unwrap();
    assert_eq!(door.fields().iter().filter(|f| f.required).count(), 1);
}

#[test]
fn test_generated_config_points_at_loadable_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("distobj.toml");

    let config = RepositoryConfig {
        schema_path: example_schema(),
        ..Default::default()
    };
    config.to_file(&path).unwrap();

    let loaded = RepositoryConfig::from_file(&path).unwrap();
    assert_eq!(load_schema(&loaded.schema_path).unwrap().len(), 2);
}
