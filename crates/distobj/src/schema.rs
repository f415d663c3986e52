// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Class-definition file loader.
//!
//! A schema lists every distributed class with its numeric id and ordered
//! fields. TOML is the primary format; `.json` files are accepted too.
//!
//! ```toml
//! [[classes]]
//! id = 1
//! name = "Avatar"
//!
//! [[classes.fields]]
//! name = "x"
//! params = ["int32"]
//! required = true
//! ```

use crate::registry::FieldDef;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Schema loading errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate class id {0}")]
    DuplicateClassId(u16),

    #[error("duplicate class name {0:?}")]
    DuplicateClassName(String),

    #[error("class {class:?} declares field {field:?} twice")]
    DuplicateField { class: String, field: String },

    #[error("class {0:?} has more fields than a u16 index can address")]
    TooManyFields(String),

    #[error("class with id {0} has an empty name")]
    EmptyName(u16),
}

/// One class as written in the schema file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub classes: Vec<ClassDefinition>,
}

impl SchemaFile {
    /// Check ids, names and per-class field names for uniqueness.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();

        for class in &self.classes {
            if class.name.is_empty() {
                return Err(SchemaError::EmptyName(class.id));
            }
            if !ids.insert(class.id) {
                return Err(SchemaError::DuplicateClassId(class.id));
            }
            if !names.insert(class.name.as_str()) {
                return Err(SchemaError::DuplicateClassName(class.name.clone()));
            }
            if class.fields.len() > u16::MAX as usize + 1 {
                return Err(SchemaError::TooManyFields(class.name.clone()));
            }

            let mut fields = HashSet::new();
            for field in &class.fields {
                if !fields.insert(field.name.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        class: class.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Parse and validate a TOML schema.
pub fn parse_schema(content: &str) -> Result<Vec<ClassDefinition>, SchemaError> {
    let file: SchemaFile = toml::from_str(content)?;
    file.validate()?;
    Ok(file.classes)
}

/// Parse and validate a JSON schema.
pub fn parse_schema_json(content: &str) -> Result<Vec<ClassDefinition>, SchemaError> {
    let file: SchemaFile = serde_json::from_str(content)?;
    file.validate()?;
    Ok(file.classes)
}

/// Load a schema file, choosing the format by extension (`.json` or TOML).
pub fn load_schema<P: AsRef<Path>>(path: P) -> Result<Vec<ClassDefinition>, SchemaError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let classes = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_schema_json(&content)?,
        _ => parse_schema(&content)?,
    };
    tracing::info!("Loaded {} classes from {:?}", classes.len(), path);
    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldKind;

    const AVATAR: &str = r#"
[[classes]]
id = 1
name = "Avatar"

[[classes.fields]]
name = "name"
params = ["string"]
required = true

[[classes.fields]]
name = "x"
params = ["int32"]
required = true

[[classes.fields]]
name = "emote"
params = ["uint8", "float64"]

[[classes]]
id = 2
name = "Door"
"#;

    #[test]
    fn test_parse_toml_schema() {
        let classes = parse_schema(AVATAR).unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].name, "Avatar");
        assert_eq!(classes[0].fields.len(), 3);
        assert_eq!(
            classes[0].fields[2].params,
            vec![FieldKind::UInt8, FieldKind::Float64]
        );
        assert!(!classes[0].fields[2].required);
        assert!(classes[1].fields.is_empty());
    }

    #[test]
    fn test_duplicate_class_id_rejected() {
        let src = r#"
[[classes]]
id = 1
name = "A"

[[classes]]
id = 1
name = "B"
"#;
        assert!(matches!(
            parse_schema(src),
            Err(SchemaError::DuplicateClassId(1))
        ));
    }

    #[test]
    fn test_duplicate_class_name_rejected() {
        let src = r#"
[[classes]]
id = 1
name = "A"

[[classes]]
id = 2
name = "A"
"#;
        assert!(matches!(
            parse_schema(src),
            Err(SchemaError::DuplicateClassName(_))
        ));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let src = r#"
[[classes]]
id = 1
name = "A"

[[classes.fields]]
name = "x"
params = ["int8"]

[[classes.fields]]
name = "x"
params = ["int16"]
"#;
        assert!(matches!(
            parse_schema(src),
            Err(SchemaError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_unknown_param_kind_is_parse_error() {
        let src = r#"
[[classes]]
id = 1
name = "A"

[[classes.fields]]
name = "x"
params = ["quaternion"]
"#;
        assert!(matches!(parse_schema(src), Err(SchemaError::Toml(_))));
    }

    #[test]
    fn test_load_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.json");
        std::fs::write(
            &path,
            r#"{"classes":[{"id":7,"name":"Lamp","fields":[{"name":"on","params":["bool"],"required":true}]}]}"#,
        )
        .unwrap();

        let classes = load_schema(&path).unwrap();
        assert_eq!(classes[0].id, 7);
        assert_eq!(classes[0].fields[0].params, vec![FieldKind::Bool]);
    }
}
