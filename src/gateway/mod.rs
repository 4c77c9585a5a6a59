pub mod file;
pub mod matcher;

pub use file::FileGateway;
pub use matcher::matches;

use std::cmp::Ordering;
use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::filter::{FilterExpression, OrderSpec, QueryParameter, SortDirection};
use crate::store::StoreError;
use crate::types::Record;

/// Physical read/write primitives over a namespaced collection.
///
/// Namespace and type name only partition storage; schema rules are enforced upstream.
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn fetch(
        &self,
        namespace: &str,
        type_name: &str,
        filter: &FilterExpression,
        options: &ReadOptions,
    ) -> Result<Vec<Record>, StoreError>;

    async fn save(&self, namespace: &str, type_name: &str, id: &str, record: Record) -> Result<Record, StoreError>;

    /// Returns whether a record was removed
    async fn delete(&self, namespace: &str, type_name: &str, id: &str) -> Result<bool, StoreError>;
}

/// Post-filter shaping of a result set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    pub order: Vec<OrderSpec>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub include: Vec<String>,
    pub distinct: Vec<String>,
}

impl ReadOptions {
    pub fn from_query(query: &QueryParameter) -> Self {
        Self {
            order: query.order().to_vec(),
            limit: query.limit(),
            offset: query.offset(),
            include: query.include().to_vec(),
            distinct: query.distinct().to_vec(),
        }
    }

    /// Apply distinct, order, offset/limit and projection, in that order
    pub fn apply(&self, mut records: Vec<Record>) -> Vec<Record> {
        if !self.distinct.is_empty() {
            let mut seen = HashSet::new();
            records.retain(|record| {
                let key: Vec<Vec<&Value>> = self.distinct.iter().map(|path| matcher::resolve(record, path)).collect();
                seen.insert(serde_json::to_string(&key).unwrap_or_default())
            });
        }

        if !self.order.is_empty() {
            records.sort_by(|a, b| self.compare_records(a, b));
        }

        let offset = self.offset.unwrap_or(0);
        let records = records.into_iter().skip(offset);
        let records: Vec<Record> = match self.limit {
            Some(limit) => records.take(limit).collect(),
            None => records.collect(),
        };

        if self.include.is_empty() {
            return records;
        }
        let paths: Vec<Vec<&str>> = self.include.iter().map(|p| p.split('.').collect()).collect();
        records.into_iter().map(|record| project(record, &paths)).collect()
    }

    fn compare_records(&self, a: &Record, b: &Record) -> Ordering {
        for spec in &self.order {
            let left = matcher::resolve(a, &spec.field).into_iter().find(|v| !v.is_null());
            let right = matcher::resolve(b, &spec.field).into_iter().find(|v| !v.is_null());
            // Missing values sort last regardless of direction
            let ordering = match (left, right) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => return Ordering::Greater,
                (Some(_), None) => return Ordering::Less,
                (Some(l), Some(r)) => matcher::compare(l, r).unwrap_or(Ordering::Equal),
            };
            let ordering = match spec.sort {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Keep scalars; keep nested objects only where an include path names them
fn project(mut record: Record, paths: &[Vec<&str>]) -> Record {
    let keys: Vec<String> = record.keys().cloned().collect();
    for key in keys {
        let nested: Vec<Vec<&str>> = paths
            .iter()
            .filter(|path| path.first() == Some(&key.as_str()))
            .map(|path| path[1..].to_vec())
            .collect();

        let Some(value) = record.get_mut(&key) else { continue };
        if !is_relation_value(value) {
            continue;
        }
        if nested.is_empty() {
            record.remove(&key);
            continue;
        }

        let rest: Vec<Vec<&str>> = nested.into_iter().filter(|path| !path.is_empty()).collect();
        match value {
            Value::Object(map) => *map = project(std::mem::take(map), &rest),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(map) = item {
                        *map = project(std::mem::take(map), &rest);
                    }
                }
            }
            _ => {}
        }
    }
    record
}

fn is_relation_value(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_object),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Record> {
        vec![
            json!({ "id": "1", "nombre": "Ana", "salario": 30000, "oficina": { "nombre": "Vigo", "provincia": { "nombre": "Pontevedra" } } }),
            json!({ "id": "2", "nombre": "Luis", "salario": 70000, "oficina": { "nombre": "Lugo" } }),
            json!({ "id": "3", "nombre": "Ana", "salario": 50000 }),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn order_then_paginate() {
        let options = ReadOptions {
            order: vec![OrderSpec { field: "salario".into(), sort: SortDirection::Desc }],
            offset: Some(1),
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(ids(&options.apply(records())), vec!["3"]);
    }

    #[test]
    fn missing_sort_values_go_last() {
        let options = ReadOptions {
            order: vec![OrderSpec { field: "oficina.nombre".into(), sort: SortDirection::Asc }],
            ..Default::default()
        };
        assert_eq!(ids(&options.apply(records())), vec!["2", "1", "3"]);
    }

    #[test]
    fn distinct_keeps_first_of_each_value() {
        let options = ReadOptions { distinct: vec!["nombre".into()], ..Default::default() };
        assert_eq!(ids(&options.apply(records())), vec!["1", "2"]);
    }

    #[test]
    fn projection_drops_relations_not_included() {
        let options = ReadOptions { include: vec!["oficina".into()], ..Default::default() };
        let out = options.apply(records());
        assert_eq!(out[0]["oficina"], json!({ "nombre": "Vigo" }));
        assert_eq!(out[0]["nombre"], json!("Ana"));

        let options = ReadOptions { include: vec!["oficina.provincia".into()], ..Default::default() };
        let out = options.apply(records());
        assert_eq!(out[0]["oficina"]["provincia"]["nombre"], json!("Pontevedra"));
    }
}
