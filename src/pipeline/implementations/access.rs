use async_trait::async_trait;

use crate::pipeline::{AccessRule, GuardNext, PipelineContext};
use crate::types::{Action, Record};

/// Allows everything and stops the chain
pub struct AllowAll;

#[async_trait]
impl AccessRule for AllowAll {
    fn name(&self) -> &'static str {
        "allow_all"
    }

    async fn can_execute(&self, _ctx: &PipelineContext, _original: Option<&Record>, _next: GuardNext<'_>) -> bool {
        true
    }
}

/// Denies anonymous callers, defers otherwise
pub struct RequireAuthenticated;

#[async_trait]
impl AccessRule for RequireAuthenticated {
    fn name(&self) -> &'static str {
        "require_authenticated"
    }

    async fn can_execute(&self, ctx: &PipelineContext, original: Option<&Record>, next: GuardNext<'_>) -> bool {
        if !ctx.security.is_authenticated() {
            tracing::debug!("Anonymous {} on {} rejected", ctx.action, ctx.target());
            return false;
        }
        next.run(ctx, original).await
    }
}

/// Requires a role for the listed actions (all actions when empty), optionally for one type only
pub struct RoleRule {
    role: String,
    actions: Vec<Action>,
    type_name: Option<String>,
}

impl RoleRule {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            actions: Vec::new(),
            type_name: None,
        }
    }

    pub fn on(mut self, actions: &[Action]) -> Self {
        self.actions = actions.to_vec();
        self
    }

    pub fn for_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    fn applies(&self, ctx: &PipelineContext) -> bool {
        (self.actions.is_empty() || self.actions.contains(&ctx.action))
            && self.type_name.as_deref().map_or(true, |t| ctx.is_type(t))
    }
}

#[async_trait]
impl AccessRule for RoleRule {
    fn name(&self) -> &'static str {
        "role"
    }

    async fn can_execute(&self, ctx: &PipelineContext, original: Option<&Record>, next: GuardNext<'_>) -> bool {
        if self.applies(ctx) && !ctx.security.has_role(&self.role) {
            tracing::debug!("{} on {} requires role '{}'", ctx.action, ctx.target(), self.role);
            return false;
        }
        next.run(ctx, original).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AccessGuard;
    use crate::types::SecurityContext;
    use std::sync::Arc;

    fn ctx(action: Action, security: SecurityContext) -> PipelineContext {
        PipelineContext::new(action, "rrhh", "Empleado", security)
    }

    #[tokio::test]
    async fn role_rule_only_guards_its_actions() {
        let mut guard = AccessGuard::new(true);
        guard.add_rule(Arc::new(RequireAuthenticated));
        guard.add_rule(Arc::new(RoleRule::new("admin").on(&[Action::Delete]).for_type("empleado")));

        let user = SecurityContext::user("ana");
        assert!(guard.can_execute(&ctx(Action::Read, user.clone()), None).await);
        assert!(!guard.can_execute(&ctx(Action::Delete, user.clone()), None).await);
        assert!(guard.can_execute(&ctx(Action::Delete, user.with_role("admin")), None).await);
        assert!(!guard.can_execute(&ctx(Action::Read, SecurityContext::anonymous()), None).await);
    }

    #[tokio::test]
    async fn allow_all_overrides_a_closed_default() {
        let mut guard = AccessGuard::new(false);
        guard.add_rule(Arc::new(AllowAll));
        assert!(guard.can_execute(&ctx(Action::Update, SecurityContext::anonymous()), None).await);
    }
}
