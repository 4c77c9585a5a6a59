use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::context::PipelineContext;
use crate::error::DataError;
use crate::types::Record;

/// Transforms a write payload before it reaches storage
#[async_trait]
pub trait SanitizeRule: Send + Sync {
    fn name(&self) -> &'static str;

    async fn sanitize(&self, ctx: &PipelineContext, input: Record, next: SanitizeNext<'_>) -> Result<Record, DataError>;
}

pub struct SanitizeNext<'a> {
    rules: &'a [Arc<dyn SanitizeRule>],
}

impl<'a> SanitizeNext<'a> {
    pub fn run(self, ctx: &'a PipelineContext, input: Record) -> BoxFuture<'a, Result<Record, DataError>> {
        Box::pin(async move {
            match self.rules.split_first() {
                Some((rule, rest)) => {
                    tracing::trace!("Sanitizer '{}' on {}", rule.name(), ctx.target());
                    rule.sanitize(ctx, input, SanitizeNext { rules: rest }).await
                }
                None => Ok(input),
            }
        })
    }
}

/// Second pipeline stage; passes input through unchanged when no rule is installed
#[derive(Default)]
pub struct InputSanitizer {
    rules: Vec<Arc<dyn SanitizeRule>>,
}

impl InputSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Arc<dyn SanitizeRule>) {
        tracing::debug!("Registered sanitizer '{}'", rule.name());
        self.rules.push(rule);
    }

    pub async fn sanitize_input(&self, ctx: &PipelineContext, input: Record) -> Result<Record, DataError> {
        SanitizeNext { rules: &self.rules }.run(ctx, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, SecurityContext};
    use serde_json::json;

    struct Upper;

    #[async_trait]
    impl SanitizeRule for Upper {
        fn name(&self) -> &'static str { "upper" }

        async fn sanitize(&self, ctx: &PipelineContext, mut input: Record, next: SanitizeNext<'_>) -> Result<Record, DataError> {
            if let Some(name) = input.get("nombre").and_then(|v| v.as_str()).map(str::to_uppercase) {
                input.insert("nombre".into(), json!(name));
            }
            next.run(ctx, input).await
        }
    }

    #[tokio::test]
    async fn rules_transform_in_order_and_empty_chain_is_identity() {
        let ctx = PipelineContext::new(Action::Create, "rrhh", "Empleado", SecurityContext::anonymous());
        let input = json!({ "nombre": "ana" }).as_object().cloned().unwrap();

        let empty = InputSanitizer::new();
        assert_eq!(empty.sanitize_input(&ctx, input.clone()).await.unwrap(), input);

        let mut sanitizer = InputSanitizer::new();
        sanitizer.add_rule(Arc::new(Upper));
        let out = sanitizer.sanitize_input(&ctx, input).await.unwrap();
        assert_eq!(out["nombre"], json!("ANA"));
    }
}
