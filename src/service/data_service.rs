use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::DataError;
use crate::filter::{Condition, FilterExpression, ParserOptions, QueryParameter, QueryParser};
use crate::gateway::{DataGateway, ReadOptions};
use crate::pipeline::{ExecResult, OperationPipeline, Payload, PipelineContext, Terminal};
use crate::schema::SchemaProvider;
use crate::types::{Action, Record, SecurityContext, ID_FIELD};

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Run create/modify results through the redactor as well as reads
    pub redact_write_results: bool,
    /// Modify/delete matching nothing fails with NotFound instead of succeeding empty
    pub not_found_is_error: bool,
    pub parser: ParserOptions,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            redact_write_results: true,
            not_found_is_error: true,
            parser: ParserOptions::default(),
        }
    }
}

impl ServiceOptions {
    pub fn from_config() -> Self {
        let pipeline = &crate::config::config().pipeline;
        Self {
            redact_write_results: pipeline.redact_write_results,
            not_found_is_error: pipeline.not_found_is_error,
            parser: ParserOptions::from_config(),
        }
    }
}

/// Mutation-shaped request: an action keyword, an optional id and the object payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationRequest {
    pub action: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub object: Option<Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub action: Action,
    pub affected: usize,
    pub records: Vec<Record>,
}

/// Runs every CRUD operation through guard, sanitize, restrict, execute and redact,
/// and is the single place a guard denial becomes `DataError::Unauthorized`.
pub struct DataService {
    gateway: Arc<dyn DataGateway>,
    pipeline: Arc<OperationPipeline>,
    schemas: Arc<dyn SchemaProvider>,
    options: ServiceOptions,
}

impl DataService {
    pub fn new(gateway: Arc<dyn DataGateway>, pipeline: Arc<OperationPipeline>, schemas: Arc<dyn SchemaProvider>) -> Self {
        Self {
            gateway,
            pipeline,
            schemas,
            options: ServiceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Build a query for `type_name` from raw arguments using the namespace's schema
    pub fn parse_query(&self, namespace: &str, type_name: &str, args: &Map<String, Value>) -> Result<QueryParameter, DataError> {
        let schema = self.schemas.schema(namespace)?;
        let query = QueryParser::new(&schema)
            .with_options(self.options.parser.clone())
            .parse(type_name, args)?;
        Ok(query)
    }

    /// Parse raw arguments and fetch
    pub async fn find(
        &self,
        namespace: &str,
        type_name: &str,
        security: &SecurityContext,
        args: &Map<String, Value>,
    ) -> Result<Vec<Record>, DataError> {
        let query = self.parse_query(namespace, type_name, args)?;
        self.fetch(namespace, security, &query).await
    }

    pub async fn fetch(&self, namespace: &str, security: &SecurityContext, query: &QueryParameter) -> Result<Vec<Record>, DataError> {
        let type_name = self.canonical_type(namespace, query.type_name())?;
        let ctx = PipelineContext::new(Action::Read, namespace, type_name, security.clone());
        self.authorize(&ctx, None).await?;

        let filter = self.pipeline.restrictor.restrict_filter(&ctx, query.filter().clone()).await?;
        let terminal = self.fetch_terminal(&ctx, ReadOptions::from_query(query));
        let records = self
            .pipeline
            .executor
            .execute_operation(&ctx, Payload::Filter(filter), terminal)
            .await?;

        let records = self.pipeline.redactor.filter_output(&ctx, records).await?;
        tracing::debug!("Read {} record(s) from {} in {:?}", records.len(), ctx.target(), ctx.elapsed());
        Ok(records)
    }

    /// Create one record; an id is generated when none is given
    pub async fn create(
        &self,
        namespace: &str,
        type_name: &str,
        security: &SecurityContext,
        id: Option<String>,
        input: Record,
    ) -> Result<Vec<Record>, DataError> {
        let type_name = self.canonical_type(namespace, type_name)?;
        let ctx = PipelineContext::new(Action::Create, namespace, type_name, security.clone());
        self.authorize(&ctx, Some(&input)).await?;

        let id = id
            .or_else(|| input.get(ID_FIELD).and_then(id_string))
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut record = self.pipeline.sanitizer.sanitize_input(&ctx, input).await?;
        record.insert(ID_FIELD.to_string(), Value::String(id));

        let terminal = self.save_terminal(&ctx, None);
        let saved = self
            .pipeline
            .executor
            .execute_operation(&ctx, Payload::Records(vec![record]), terminal)
            .await?;

        tracing::info!("Created {} record(s) in {}", saved.len(), ctx.target());
        self.finish_write(&ctx, saved).await
    }

    /// Merge `input` into every record matching `filter`
    pub async fn modify(
        &self,
        namespace: &str,
        type_name: &str,
        security: &SecurityContext,
        filter: FilterExpression,
        input: Record,
    ) -> Result<Vec<Record>, DataError> {
        let type_name = self.canonical_type(namespace, type_name)?;
        let ctx = PipelineContext::new(Action::Update, namespace, type_name, security.clone());
        self.authorize(&ctx, Some(&input)).await?;

        let mut changes = self.pipeline.sanitizer.sanitize_input(&ctx, input).await?;
        let requested_id = changes.remove(ID_FIELD).map(|id| id_string(&id));
        let existing = self.matching(&ctx, filter).await?;
        if let Some(requested) = requested_id {
            if existing.iter().any(|record| record.get(ID_FIELD).and_then(id_string) != requested) {
                return Err(DataError::validation("The id of an existing record cannot be changed"));
            }
        }
        let matched: HashSet<String> = existing
            .iter()
            .filter_map(|record| record.get(ID_FIELD).and_then(id_string))
            .collect();

        let merged: Vec<Record> = existing
            .into_iter()
            .map(|mut record| {
                for (field, value) in &changes {
                    record.insert(field.clone(), value.clone());
                }
                record
            })
            .collect();

        let terminal = self.save_terminal(&ctx, Some(matched));
        let saved = self
            .pipeline
            .executor
            .execute_operation(&ctx, Payload::Records(merged), terminal)
            .await?;

        tracing::info!("Updated {} record(s) in {}", saved.len(), ctx.target());
        self.finish_write(&ctx, saved).await
    }

    /// Delete every record matching `filter`; returns how many were removed
    pub async fn delete(
        &self,
        namespace: &str,
        type_name: &str,
        security: &SecurityContext,
        filter: FilterExpression,
    ) -> Result<usize, DataError> {
        let type_name = self.canonical_type(namespace, type_name)?;
        let ctx = PipelineContext::new(Action::Delete, namespace, type_name, security.clone());
        self.authorize(&ctx, None).await?;

        let existing = self.matching(&ctx, filter).await?;
        let terminal = self.delete_terminal(&ctx);
        let deleted = self
            .pipeline
            .executor
            .execute_operation(&ctx, Payload::Records(existing), terminal)
            .await?;

        tracing::info!("Deleted {} record(s) from {}", deleted.len(), ctx.target());
        Ok(deleted.len())
    }

    /// Entry point for mutation-shaped payloads
    pub async fn mutate(
        &self,
        namespace: &str,
        type_name: &str,
        security: &SecurityContext,
        request: MutationRequest,
    ) -> Result<MutationOutcome, DataError> {
        let action = Action::parse(&request.action)
            .ok_or_else(|| DataError::validation(format!("Unknown mutation action: {}", request.action)))?;
        let object = request.object.unwrap_or_default();

        let records = match action {
            Action::Create => self.create(namespace, type_name, security, request.id, object).await?,
            Action::Read => {
                let filter = request.id.map(by_id).unwrap_or_default();
                let query = QueryParameter::from_filter(type_name, filter);
                self.fetch(namespace, security, &query).await?
            }
            Action::Update => {
                let id = require_id(action, request.id)?;
                self.modify(namespace, type_name, security, by_id(id), object).await?
            }
            Action::Delete => {
                let id = require_id(action, request.id)?;
                let affected = self.delete(namespace, type_name, security, by_id(id)).await?;
                return Ok(MutationOutcome { action, affected, records: Vec::new() });
            }
        };

        Ok(MutationOutcome { action, affected: records.len(), records })
    }

    /// Schema spelling of a type name; collections are keyed by it
    fn canonical_type(&self, namespace: &str, type_name: &str) -> Result<String, DataError> {
        let schema = self.schemas.schema(namespace)?;
        schema
            .get_type(type_name)
            .map(|type_def| type_def.name.clone())
            .ok_or_else(|| DataError::not_found(format!("Unknown type {}:{}", namespace, type_name)))
    }

    async fn authorize(&self, ctx: &PipelineContext, original: Option<&Record>) -> Result<(), DataError> {
        if self.pipeline.guard.can_execute(ctx, original).await {
            Ok(())
        } else {
            Err(DataError::unauthorized(ctx.action, &ctx.namespace, &ctx.type_name))
        }
    }

    /// Restricted read of the records a modify/delete will touch
    async fn matching(&self, ctx: &PipelineContext, filter: FilterExpression) -> Result<Vec<Record>, DataError> {
        let filter = self.pipeline.restrictor.restrict_filter(ctx, filter).await?;
        let existing = self
            .gateway
            .fetch(&ctx.namespace, &ctx.type_name, &filter, &ReadOptions::default())
            .await?;

        if existing.is_empty() && self.options.not_found_is_error {
            return Err(DataError::not_found(format!("No {} record matches the filter", ctx.target())));
        }
        Ok(existing)
    }

    async fn finish_write(&self, ctx: &PipelineContext, records: Vec<Record>) -> Result<Vec<Record>, DataError> {
        if self.options.redact_write_results {
            self.pipeline.redactor.filter_output(ctx, records).await
        } else {
            Ok(records)
        }
    }

    fn fetch_terminal(&self, ctx: &PipelineContext, options: ReadOptions) -> Terminal<'static> {
        let gateway = self.gateway.clone();
        let namespace = ctx.namespace.clone();
        let type_name = ctx.type_name.clone();
        Box::new(move |payload: Payload| -> BoxFuture<'static, ExecResult> {
            Box::pin(async move {
                let filter = match payload {
                    Payload::Filter(filter) => filter,
                    Payload::Records(_) => return Err(DataError::internal("read expects a filter payload")),
                };
                Ok(gateway.fetch(&namespace, &type_name, &filter, &options).await?)
            })
        })
    }

    /// Saves keyed by each record's id; `allowed` pins an update to the ids it matched
    fn save_terminal(&self, ctx: &PipelineContext, allowed: Option<HashSet<String>>) -> Terminal<'static> {
        let gateway = self.gateway.clone();
        let namespace = ctx.namespace.clone();
        let type_name = ctx.type_name.clone();
        Box::new(move |payload: Payload| -> BoxFuture<'static, ExecResult> {
            Box::pin(async move {
                let records = match payload {
                    Payload::Records(records) => records,
                    Payload::Filter(_) => return Err(DataError::internal("write expects a records payload")),
                };
                let mut saved = Vec::with_capacity(records.len());
                for record in records {
                    let id = record
                        .get(ID_FIELD)
                        .and_then(id_string)
                        .ok_or_else(|| DataError::internal("record has no id at save time"))?;
                    if allowed.as_ref().is_some_and(|ids| !ids.contains(&id)) {
                        return Err(DataError::validation(format!("Record '{}' is not part of this update", id)));
                    }
                    saved.push(gateway.save(&namespace, &type_name, &id, record).await?);
                }
                Ok(saved)
            })
        })
    }

    fn delete_terminal(&self, ctx: &PipelineContext) -> Terminal<'static> {
        let gateway = self.gateway.clone();
        let namespace = ctx.namespace.clone();
        let type_name = ctx.type_name.clone();
        Box::new(move |payload: Payload| -> BoxFuture<'static, ExecResult> {
            Box::pin(async move {
                let records = match payload {
                    Payload::Records(records) => records,
                    Payload::Filter(_) => return Err(DataError::internal("delete expects a records payload")),
                };
                let mut deleted = Vec::with_capacity(records.len());
                for record in records {
                    let Some(id) = record.get(ID_FIELD).and_then(id_string) else { continue };
                    if gateway.delete(&namespace, &type_name, &id).await? {
                        deleted.push(record);
                    }
                }
                Ok(deleted)
            })
        })
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn by_id(id: String) -> FilterExpression {
    Condition::eq(ID_FIELD, id).into()
}

fn require_id(action: Action, id: Option<String>) -> Result<String, DataError> {
    id.filter(|id| !id.is_empty())
        .ok_or_else(|| DataError::validation(format!("An id is required to {}", action)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FileGateway;
    use crate::schema::{Schema, StaticSchemaProvider};
    use serde_json::json;

    fn service(dir: &std::path::Path) -> DataService {
        let schema = Schema::from_yaml(
            r#"
types:
  - name: Nota
    properties:
      titulo: { type: string }
"#,
        )
        .unwrap();
        DataService::new(
            Arc::new(FileGateway::new(dir)),
            Arc::new(OperationPipeline::default()),
            Arc::new(StaticSchemaProvider::new().with_schema("demo", schema)),
        )
    }

    #[test]
    fn ids_accept_strings_and_numbers() {
        assert_eq!(id_string(&json!("a1")), Some("a1".to_string()));
        assert_eq!(id_string(&json!(7)), Some("7".to_string()));
        assert_eq!(id_string(&json!("")), None);
        assert_eq!(id_string(&json!(null)), None);
    }

    #[tokio::test]
    async fn mutate_rejects_unknown_actions_and_missing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let security = SecurityContext::anonymous();

        let unknown = MutationRequest { action: "upsert".into(), ..Default::default() };
        let err = service.mutate("demo", "Nota", &security, unknown).await.unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));

        let missing = MutationRequest { action: "delete".into(), ..Default::default() };
        let err = service.mutate("demo", "Nota", &security, missing).await.unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
    }

    #[tokio::test]
    async fn mutate_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let security = SecurityContext::anonymous();

        let created = service
            .mutate(
                "demo",
                "Nota",
                &security,
                MutationRequest {
                    action: "insert".into(),
                    id: Some("n1".into()),
                    object: json!({ "titulo": "hola" }).as_object().cloned(),
                },
            )
            .await
            .unwrap();
        assert_eq!(created.action, Action::Create);
        assert_eq!(created.records[0]["id"], json!("n1"));

        let updated = service
            .mutate(
                "demo",
                "Nota",
                &security,
                MutationRequest {
                    action: "update".into(),
                    id: Some("n1".into()),
                    object: json!({ "titulo": "adios" }).as_object().cloned(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.records[0]["titulo"], json!("adios"));

        let read = service
            .mutate("demo", "Nota", &security, MutationRequest { action: "read".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(read.affected, 1);

        let deleted = service
            .mutate(
                "demo",
                "Nota",
                &security,
                MutationRequest { action: "remove".into(), id: Some("n1".into()), object: None },
            )
            .await
            .unwrap();
        assert_eq!(deleted.affected, 1);
        assert!(deleted.records.is_empty());
    }
}
