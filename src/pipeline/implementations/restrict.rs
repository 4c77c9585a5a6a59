use async_trait::async_trait;

use crate::error::DataError;
use crate::filter::{Condition, FilterExpression};
use crate::pipeline::{PipelineContext, RestrictNext, RestrictRule};

/// Scopes queries to records whose `field` equals the caller's `claim`.
/// Callers without the claim see nothing.
pub struct OwnershipRestriction {
    field: String,
    claim: String,
    type_name: Option<String>,
}

impl OwnershipRestriction {
    pub fn new(field: impl Into<String>, claim: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            claim: claim.into(),
            type_name: None,
        }
    }

    pub fn for_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

#[async_trait]
impl RestrictRule for OwnershipRestriction {
    fn name(&self) -> &'static str {
        "ownership"
    }

    async fn restrict(
        &self,
        ctx: &PipelineContext,
        filter: FilterExpression,
        next: RestrictNext<'_>,
    ) -> Result<FilterExpression, DataError> {
        if self.type_name.as_deref().map_or(false, |t| !ctx.is_type(t)) {
            return next.run(ctx, filter).await;
        }

        let scoped = match ctx.security.claim(&self.claim) {
            Some(value) => filter.narrow(Condition::eq(self.field.clone(), value).into()),
            None => {
                tracing::debug!("No '{}' claim for {}; restricting to nothing", self.claim, ctx.target());
                FilterExpression::never()
            }
        };
        next.run(ctx, scoped).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RestrictionPipeline;
    use crate::types::{Action, SecurityContext};
    use std::sync::Arc;

    #[tokio::test]
    async fn narrows_by_claim_or_matches_nothing() {
        let mut pipeline = RestrictionPipeline::new();
        pipeline.add_rule(Arc::new(OwnershipRestriction::new("owner", "sub")));

        let ctx = PipelineContext::new(Action::Read, "rrhh", "Empleado", SecurityContext::user("ana"));
        let out = pipeline.restrict_filter(&ctx, FilterExpression::always()).await.unwrap();
        assert_eq!(out, Condition::eq("owner", "ana").into());

        let anon = PipelineContext::new(Action::Read, "rrhh", "Empleado", SecurityContext::anonymous());
        let original: FilterExpression = Condition::eq("nombre", "Ana").into();
        let out = pipeline.restrict_filter(&anon, original.clone()).await.unwrap();
        assert_eq!(out, FilterExpression::and(vec![original, FilterExpression::never()]));
    }
}
