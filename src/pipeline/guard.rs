use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::context::PipelineContext;
use crate::types::Record;

/// One link in the access chain. Return `false` to deny, `true` to allow outright,
/// or `next.run(..)` to defer to the rules behind this one.
#[async_trait]
pub trait AccessRule: Send + Sync {
    fn name(&self) -> &'static str;

    async fn can_execute(&self, ctx: &PipelineContext, original: Option<&Record>, next: GuardNext<'_>) -> bool;
}

/// Continuation into the remaining access rules
pub struct GuardNext<'a> {
    rules: &'a [Arc<dyn AccessRule>],
    default_allow: bool,
}

impl<'a> GuardNext<'a> {
    pub fn run(self, ctx: &'a PipelineContext, original: Option<&'a Record>) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match self.rules.split_first() {
                Some((rule, rest)) => {
                    tracing::trace!("Access rule '{}' on {}", rule.name(), ctx.target());
                    let next = GuardNext { rules: rest, default_allow: self.default_allow };
                    rule.can_execute(ctx, original, next).await
                }
                None => self.default_allow,
            }
        })
    }
}

/// First pipeline stage. The only stage that can stop an operation.
pub struct AccessGuard {
    rules: Vec<Arc<dyn AccessRule>>,
    default_allow: bool,
}

impl AccessGuard {
    /// `default_allow` is the verdict when every rule defers
    pub fn new(default_allow: bool) -> Self {
        Self { rules: Vec::new(), default_allow }
    }

    pub fn add_rule(&mut self, rule: Arc<dyn AccessRule>) {
        tracing::debug!("Registered access rule '{}'", rule.name());
        self.rules.push(rule);
    }

    pub fn default_allow(&self) -> bool {
        self.default_allow
    }

    pub async fn can_execute(&self, ctx: &PipelineContext, original: Option<&Record>) -> bool {
        let next = GuardNext { rules: &self.rules, default_allow: self.default_allow };
        let allowed = next.run(ctx, original).await;
        if !allowed {
            tracing::warn!(
                "Access denied: {} on {} for {:?}",
                ctx.action, ctx.target(), ctx.security.subject
            );
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, SecurityContext};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Deny;

    #[async_trait]
    impl AccessRule for Deny {
        fn name(&self) -> &'static str { "deny" }

        async fn can_execute(&self, _ctx: &PipelineContext, _original: Option<&Record>, _next: GuardNext<'_>) -> bool {
            false
        }
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl AccessRule for Counting {
        fn name(&self) -> &'static str { "counting" }

        async fn can_execute(&self, ctx: &PipelineContext, original: Option<&Record>, next: GuardNext<'_>) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            next.run(ctx, original).await
        }
    }

    fn ctx() -> PipelineContext {
        PipelineContext::new(Action::Read, "rrhh", "Empleado", SecurityContext::anonymous())
    }

    #[tokio::test]
    async fn empty_chain_uses_default() {
        assert!(AccessGuard::new(true).can_execute(&ctx(), None).await);
        assert!(!AccessGuard::new(false).can_execute(&ctx(), None).await);
    }

    #[tokio::test]
    async fn denial_short_circuits_later_rules() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut guard = AccessGuard::new(true);
        guard.add_rule(Arc::new(Counting(calls.clone())));
        guard.add_rule(Arc::new(Deny));
        guard.add_rule(Arc::new(Counting(calls.clone())));

        assert!(!guard.can_execute(&ctx(), None).await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
