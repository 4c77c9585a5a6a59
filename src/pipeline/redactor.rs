use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::context::PipelineContext;
use crate::error::DataError;
use crate::types::Record;

/// Strips or masks fields on records leaving the service
#[async_trait]
pub trait RedactRule: Send + Sync {
    fn name(&self) -> &'static str;

    async fn redact(&self, ctx: &PipelineContext, records: Vec<Record>, next: RedactNext<'_>) -> Result<Vec<Record>, DataError>;
}

pub struct RedactNext<'a> {
    rules: &'a [Arc<dyn RedactRule>],
}

impl<'a> RedactNext<'a> {
    pub fn run(self, ctx: &'a PipelineContext, records: Vec<Record>) -> BoxFuture<'a, Result<Vec<Record>, DataError>> {
        Box::pin(async move {
            match self.rules.split_first() {
                Some((rule, rest)) => {
                    tracing::trace!("Redactor '{}' on {}", rule.name(), ctx.target());
                    rule.redact(ctx, records, RedactNext { rules: rest }).await
                }
                None => Ok(records),
            }
        })
    }
}

/// Last pipeline stage
#[derive(Default)]
pub struct OutputRedactor {
    rules: Vec<Arc<dyn RedactRule>>,
}

impl OutputRedactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Arc<dyn RedactRule>) {
        tracing::debug!("Registered redactor '{}'", rule.name());
        self.rules.push(rule);
    }

    pub async fn filter_output(&self, ctx: &PipelineContext, records: Vec<Record>) -> Result<Vec<Record>, DataError> {
        RedactNext { rules: &self.rules }.run(ctx, records).await
    }
}
