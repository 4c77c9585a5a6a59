use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::context::PipelineContext;
use crate::error::DataError;
use crate::filter::FilterExpression;

/// Narrows the filter of a read, update or delete (tenant or ownership scoping)
#[async_trait]
pub trait RestrictRule: Send + Sync {
    fn name(&self) -> &'static str;

    async fn restrict(
        &self,
        ctx: &PipelineContext,
        filter: FilterExpression,
        next: RestrictNext<'_>,
    ) -> Result<FilterExpression, DataError>;
}

pub struct RestrictNext<'a> {
    rules: &'a [Arc<dyn RestrictRule>],
}

impl<'a> RestrictNext<'a> {
    pub fn run(self, ctx: &'a PipelineContext, filter: FilterExpression) -> BoxFuture<'a, Result<FilterExpression, DataError>> {
        Box::pin(async move {
            match self.rules.split_first() {
                Some((rule, rest)) => {
                    tracing::trace!("Restriction '{}' on {}", rule.name(), ctx.target());
                    rule.restrict(ctx, filter, RestrictNext { rules: rest }).await
                }
                None => Ok(filter),
            }
        })
    }
}

/// Third pipeline stage
#[derive(Default)]
pub struct RestrictionPipeline {
    rules: Vec<Arc<dyn RestrictRule>>,
}

impl RestrictionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Arc<dyn RestrictRule>) {
        tracing::debug!("Registered restriction '{}'", rule.name());
        self.rules.push(rule);
    }

    /// The chain's output is AND-ed with the incoming filter, so the result
    /// never matches a record the incoming filter would reject.
    pub async fn restrict_filter(&self, ctx: &PipelineContext, filter: FilterExpression) -> Result<FilterExpression, DataError> {
        let restricted = RestrictNext { rules: &self.rules }.run(ctx, filter.clone()).await?;
        if restricted == filter {
            return Ok(filter);
        }
        Ok(filter.narrow(restricted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Condition;
    use crate::types::{Action, SecurityContext};

    /// Tries to replace the filter with match-everything
    struct Widen;

    #[async_trait]
    impl RestrictRule for Widen {
        fn name(&self) -> &'static str { "widen" }

        async fn restrict(&self, _ctx: &PipelineContext, _filter: FilterExpression, _next: RestrictNext<'_>) -> Result<FilterExpression, DataError> {
            Ok(FilterExpression::always())
        }
    }

    fn ctx() -> PipelineContext {
        PipelineContext::new(Action::Read, "rrhh", "Empleado", SecurityContext::anonymous())
    }

    #[tokio::test]
    async fn no_rules_leaves_filter_untouched() {
        let filter: FilterExpression = Condition::eq("nombre", "Ana").into();
        let out = RestrictionPipeline::new().restrict_filter(&ctx(), filter.clone()).await.unwrap();
        assert_eq!(out, filter);
    }

    #[tokio::test]
    async fn a_rule_cannot_widen_the_filter() {
        let mut pipeline = RestrictionPipeline::new();
        pipeline.add_rule(Arc::new(Widen));
        let filter: FilterExpression = Condition::eq("nombre", "Ana").into();
        let out = pipeline.restrict_filter(&ctx(), filter.clone()).await.unwrap();
        assert_eq!(out, filter);
    }
}
