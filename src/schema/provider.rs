use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use super::{Schema, SchemaError};

/// Supplies the field/type graph for a namespace. Schemas are read-only once loaded.
pub trait SchemaProvider: Send + Sync {
    fn schema(&self, namespace: &str) -> Result<Arc<Schema>, SchemaError>;
}

/// In-memory provider, mostly for embedding and tests
#[derive(Debug, Default, Clone)]
pub struct StaticSchemaProvider {
    schemas: HashMap<String, Arc<Schema>>,
}

impl StaticSchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, namespace: impl Into<String>, schema: Schema) -> Self {
        self.schemas.insert(namespace.into(), Arc::new(schema));
        self
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn schema(&self, namespace: &str) -> Result<Arc<Schema>, SchemaError> {
        self.schemas
            .get(namespace)
            .cloned()
            .ok_or_else(|| SchemaError::NotFound(namespace.to_string()))
    }
}

/// Loads `<dir>/<namespace>.{yaml,yml,json}` on first use and caches the result
pub struct FileSchemaProvider {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<Schema>>>,
}

impl FileSchemaProvider {
    const EXTENSIONS: [&'static str; 3] = ["yaml", "yml", "json"];

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn load(&self, namespace: &str) -> Result<Schema, SchemaError> {
        if namespace.is_empty()
            || !namespace.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(SchemaError::NotFound(namespace.to_string()));
        }

        for ext in Self::EXTENSIONS {
            let path = self.dir.join(format!("{}.{}", namespace, ext));
            if path.is_file() {
                tracing::debug!("Loading schema for namespace '{}' from {}", namespace, path.display());
                let content = std::fs::read_to_string(&path)?;
                return Schema::from_yaml(&content);
            }
        }
        Err(SchemaError::NotFound(namespace.to_string()))
    }
}

impl SchemaProvider for FileSchemaProvider {
    fn schema(&self, namespace: &str) -> Result<Arc<Schema>, SchemaError> {
        if let Ok(cache) = self.cache.read() {
            if let Some(schema) = cache.get(namespace) {
                return Ok(schema.clone());
            }
        }

        let schema = Arc::new(self.load(namespace)?);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(namespace.to_string(), schema.clone());
        }
        Ok(schema)
    }
}
