use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DataError;
use crate::pipeline::{PipelineContext, SanitizeNext, SanitizeRule};
use crate::schema::SchemaProvider;
use crate::types::Record;

/// Fields only the system may set
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Drops system-managed fields from client input
pub struct SystemFieldSanitizer;

#[async_trait]
impl SanitizeRule for SystemFieldSanitizer {
    fn name(&self) -> &'static str {
        "system_fields"
    }

    async fn sanitize(&self, ctx: &PipelineContext, mut input: Record, next: SanitizeNext<'_>) -> Result<Record, DataError> {
        for field in SYSTEM_FIELDS {
            if input.remove(*field).is_some() {
                tracing::debug!("Dropped system field '{}' from {} input", field, ctx.target());
            }
        }
        next.run(ctx, input).await
    }
}

/// Drops fields the schema does not declare for the target type
pub struct SchemaFieldSanitizer {
    provider: Arc<dyn SchemaProvider>,
}

impl SchemaFieldSanitizer {
    pub fn new(provider: Arc<dyn SchemaProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl SanitizeRule for SchemaFieldSanitizer {
    fn name(&self) -> &'static str {
        "schema_fields"
    }

    async fn sanitize(&self, ctx: &PipelineContext, mut input: Record, next: SanitizeNext<'_>) -> Result<Record, DataError> {
        let schema = match self.provider.schema(&ctx.namespace) {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!("No schema for {}, input passed through: {}", ctx.target(), e);
                return next.run(ctx, input).await;
            }
        };

        if let Some(type_def) = schema.get_type(&ctx.type_name) {
            let unknown: Vec<String> = input.keys().filter(|k| !type_def.has_field(k)).cloned().collect();
            for field in unknown {
                tracing::warn!("Dropped unknown field '{}' from {} input", field, ctx.target());
                input.remove(&field);
            }
        }
        next.run(ctx, input).await
    }
}
