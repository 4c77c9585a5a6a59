#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use monk_data::filter::FilterExpression;
use monk_data::gateway::{DataGateway, FileGateway, ReadOptions};
use monk_data::pipeline::OperationPipeline;
use monk_data::schema::{Schema, StaticSchemaProvider};
use monk_data::service::DataService;
use monk_data::store::StoreError;
use monk_data::types::{Record, SecurityContext};

pub const NAMESPACE: &str = "rrhh";

pub const SCHEMA: &str = r#"
types:
  - name: Empleado
    properties:
      nombre: { type: string }
      salario: { type: integer }
      activo: { type: boolean }
      fechaAlta: { type: date }
      propietario: { type: string }
      oficina: { type: object, relation: Oficina }
  - name: Oficina
    properties:
      nombre: { type: string }
      provincia: { type: object, relation: Provincia }
  - name: Provincia
    properties:
      nombre: { type: string }
"#;

pub fn schema() -> Schema {
    Schema::from_yaml(SCHEMA).expect("fixture schema")
}

pub fn schemas() -> Arc<StaticSchemaProvider> {
    Arc::new(StaticSchemaProvider::new().with_schema(NAMESPACE, schema()))
}

pub fn service(root: &Path, pipeline: OperationPipeline) -> DataService {
    DataService::new(Arc::new(FileGateway::new(root)), Arc::new(pipeline), schemas())
}

pub fn object(value: Value) -> Record {
    value.as_object().cloned().expect("fixture must be an object")
}

pub fn args(value: Value) -> Map<String, Value> {
    object(value)
}

/// Nine employees, ids "1".."9", salario 10000..90000
pub fn employee(i: u32) -> Record {
    let (oficina, provincia) = if i % 2 == 0 { ("Vigo", "Pontevedra") } else { ("Madrid", "Madrid") };
    object(json!({
        "nombre": format!("Empleado {}", i),
        "salario": i * 10_000,
        "activo": i % 3 != 0,
        "fechaAlta": format!("2020-0{}-01", i),
        "propietario": if i <= 4 { "ana" } else { "luis" },
        "oficina": { "nombre": oficina, "provincia": { "nombre": provincia } }
    }))
}

pub async fn seed(service: &DataService) -> Result<()> {
    let admin = SecurityContext::user("seed").with_role("admin");
    for i in 1..=9 {
        service
            .create(NAMESPACE, "Empleado", &admin, Some(i.to_string()), employee(i))
            .await?;
    }
    Ok(())
}

pub fn ids(records: &[Record]) -> Vec<String> {
    let mut ids: Vec<String> = records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_str).map(str::to_string))
        .collect();
    ids.sort();
    ids
}

/// Gateway that counts every call and stores nothing
#[derive(Default)]
pub struct RecordingGateway {
    calls: AtomicUsize,
}

impl RecordingGateway {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataGateway for RecordingGateway {
    async fn fetch(&self, _: &str, _: &str, _: &FilterExpression, _: &ReadOptions) -> Result<Vec<Record>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn save(&self, _: &str, _: &str, _: &str, record: Record) -> Result<Record, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn delete(&self, _: &str, _: &str, _: &str) -> Result<bool, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }
}
