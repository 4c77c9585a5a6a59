pub mod provider;

pub use provider::{FileSchemaProvider, SchemaProvider, StaticSchemaProvider};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema not found for namespace: {0}")]
    NotFound(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("Unknown relation target '{target}' on {type_name}.{field}")]
    UnknownRelation {
        type_name: String,
        field: String,
        target: String,
    },

    #[error("Schema I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Scalar value kinds a field can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Id,
    Integer,
    Number,
    Boolean,
    Date,
    DateTime,
}

impl ScalarType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Integer | ScalarType::Number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Relation { target: String, many: bool },
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self.kind {
            FieldKind::Scalar(scalar) => Some(scalar),
            FieldKind::Relation { .. } => None,
        }
    }

    pub fn relation_target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Relation { target, .. } => Some(target),
            FieldKind::Scalar(_) => None,
        }
    }
}

/// One entity type with a case-insensitive field lookup table built at load time
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
}

impl TypeDef {
    fn new(name: String, mut fields: Vec<FieldDef>) -> Self {
        if !fields.iter().any(|f| f.name == "id") {
            fields.insert(
                0,
                FieldDef {
                    name: "id".to_string(),
                    kind: FieldKind::Scalar(ScalarType::Id),
                },
            );
        }
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.to_ascii_lowercase(), i))
            .collect();
        Self { name, fields, index }
    }

    /// Case-insensitive field lookup
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.fields[i])
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// Field/type graph for one namespace
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: HashMap<String, TypeDef>,
}

impl Schema {
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types
            .get(name)
            .or_else(|| self.types.values().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Parse a YAML (or JSON, which is valid YAML) schema document
    pub fn from_yaml(content: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument = serde_yaml::from_str(content)?;
        Self::from_document(document)
    }

    pub fn from_document(document: SchemaDocument) -> Result<Self, SchemaError> {
        let mut types = HashMap::new();
        for type_doc in document.types {
            if type_doc.name.is_empty() {
                return Err(SchemaError::InvalidFormat("type name cannot be empty".to_string()));
            }
            let mut fields = Vec::with_capacity(type_doc.properties.len());
            for (field_name, property) in type_doc.properties {
                let kind = property.kind(&type_doc.name, &field_name)?;
                fields.push(FieldDef { name: field_name, kind });
            }
            // Stable field order regardless of map iteration
            fields.sort_by(|a, b| a.name.cmp(&b.name));
            let type_def = TypeDef::new(type_doc.name.clone(), fields);
            types.insert(type_doc.name, type_def);
        }

        let schema = Schema { types };
        schema.validate_relations()?;
        Ok(schema)
    }

    fn validate_relations(&self) -> Result<(), SchemaError> {
        for type_def in self.types.values() {
            for field in type_def.fields() {
                if let Some(target) = field.relation_target() {
                    if self.get_type(target).is_none() {
                        return Err(SchemaError::UnknownRelation {
                            type_name: type_def.name.clone(),
                            field: field.name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// On-disk schema document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub types: Vec<TypeDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDocument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, PropertyDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDocument {
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PropertyDocument {
    fn kind(&self, type_name: &str, field: &str) -> Result<FieldKind, SchemaError> {
        let scalar = match self.property_type.to_ascii_lowercase().as_str() {
            "string" | "text" => ScalarType::String,
            "id" | "uuid" => ScalarType::Id,
            "integer" | "int" => ScalarType::Integer,
            "number" | "float" | "decimal" => ScalarType::Number,
            "boolean" | "bool" => ScalarType::Boolean,
            "date" => ScalarType::Date,
            "datetime" | "timestamp" => ScalarType::DateTime,
            "object" | "array" => {
                let target = self.relation.clone().ok_or_else(|| {
                    SchemaError::InvalidFormat(format!(
                        "{}.{}: '{}' properties require a relation target",
                        type_name, field, self.property_type
                    ))
                })?;
                return Ok(FieldKind::Relation {
                    target,
                    many: self.property_type.eq_ignore_ascii_case("array"),
                });
            }
            other => {
                return Err(SchemaError::InvalidFormat(format!(
                    "{}.{}: unsupported property type '{}'",
                    type_name, field, other
                )))
            }
        };
        Ok(FieldKind::Scalar(scalar))
    }
}
