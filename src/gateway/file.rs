use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::{matcher, DataGateway, ReadOptions};
use crate::filter::FilterExpression;
use crate::store::{RecordStore, StoreError, StoreOptions};
use crate::types::{Record, ID_FIELD};

/// Full-scan gateway over `<root>/<namespace>/<type>.json` collections.
///
/// Each call opens a fresh `RecordStore`, so reads always start from the current file.
#[derive(Debug, Clone)]
pub struct FileGateway {
    root: PathBuf,
    options: StoreOptions,
}

impl FileGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: StoreOptions::default(),
        }
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collection file for a namespace/type pair
    pub fn collection_path(&self, namespace: &str, type_name: &str) -> Result<PathBuf, StoreError> {
        validate_name(namespace)?;
        validate_name(type_name)?;
        Ok(self.root.join(namespace).join(format!("{}.json", type_name)))
    }

    async fn with_store<T, F>(&self, namespace: &str, type_name: &str, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(RecordStore) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.collection_path(namespace, type_name)?;
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || {
            let store = RecordStore::open_with_options(path, options)?;
            work(store)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl DataGateway for FileGateway {
    async fn fetch(
        &self,
        namespace: &str,
        type_name: &str,
        filter: &FilterExpression,
        options: &ReadOptions,
    ) -> Result<Vec<Record>, StoreError> {
        let filter = filter.clone();
        let options = options.clone();
        let records = self
            .with_store(namespace, type_name, move |store| {
                let scanned = store.len();
                let matched: Vec<Record> = store
                    .all()
                    .into_iter()
                    .filter(|record| matcher::matches(&filter, record))
                    .collect();
                tracing::trace!("Scanned {} record(s), {} matched", scanned, matched.len());
                Ok(options.apply(matched))
            })
            .await?;
        tracing::debug!("Fetched {} {}:{} record(s)", records.len(), namespace, type_name);
        Ok(records)
    }

    async fn save(&self, namespace: &str, type_name: &str, id: &str, mut record: Record) -> Result<Record, StoreError> {
        record.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        let key = id.to_string();
        self.with_store(namespace, type_name, move |mut store| {
            store.set(key, record.clone())?;
            Ok(record)
        })
        .await
    }

    async fn delete(&self, namespace: &str, type_name: &str, id: &str) -> Result<bool, StoreError> {
        let key = id.to_string();
        self.with_store(namespace, type_name, move |mut store| store.delete(&key)).await
    }
}

/// Identifier check so names cannot escape the data root
fn validate_name(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Condition, Operator};
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn save_fetch_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FileGateway::new(dir.path());

        let saved = gateway
            .save("rrhh", "Empleado", "1", record(json!({ "nombre": "Ana", "salario": 60000 })))
            .await
            .unwrap();
        assert_eq!(saved["id"], json!("1"));
        gateway
            .save("rrhh", "Empleado", "2", record(json!({ "nombre": "Luis", "salario": 40000 })))
            .await
            .unwrap();
        assert!(dir.path().join("rrhh").join("Empleado.json").is_file());

        let filter: FilterExpression = Condition::new(
            "salario",
            Operator::Gt,
            crate::filter::FilterValue::Scalar(json!(50000)),
        )
        .into();
        let found = gateway.fetch("rrhh", "Empleado", &filter, &ReadOptions::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["nombre"], json!("Ana"));

        assert!(gateway.delete("rrhh", "Empleado", "1").await.unwrap());
        assert!(!gateway.delete("rrhh", "Empleado", "1").await.unwrap());
        let rest = gateway
            .fetch("rrhh", "Empleado", &FilterExpression::always(), &ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FileGateway::new(dir.path());
        let err = gateway
            .fetch("../etc", "Empleado", &FilterExpression::always(), &ReadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
        assert!(validate_name("Empleado_2").is_ok());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("").is_err());
    }
}
