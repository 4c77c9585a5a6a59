use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::context::PipelineContext;
use crate::error::DataError;
use crate::filter::FilterExpression;
use crate::types::{Action, Record};

/// What the physical operation receives: records to write, or the filter selecting records
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Records(Vec<Record>),
    Filter(FilterExpression),
}

pub type ExecResult = Result<Vec<Record>, DataError>;

/// The gateway call at the end of the hook chain
pub type Terminal<'t> = Box<dyn FnOnce(Payload) -> BoxFuture<'t, ExecResult> + Send + 't>;

/// Business-rule hook around the physical call. Work before `next.run(..)` sees the payload,
/// work after it sees the result; not calling `next` short-circuits the operation.
#[async_trait]
pub trait ExecHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &PipelineContext, payload: Payload, next: ExecNext<'_>) -> ExecResult;
}

type HookList = Arc<[Arc<dyn ExecHook>]>;

pub struct ExecNext<'t> {
    hooks: HookList,
    index: usize,
    terminal: Terminal<'t>,
}

impl<'t> ExecNext<'t> {
    pub fn run<'x>(self, ctx: &'x PipelineContext, payload: Payload) -> BoxFuture<'x, ExecResult>
    where
        't: 'x,
    {
        Box::pin(async move {
            match self.hooks.get(self.index).cloned() {
                Some(hook) => {
                    tracing::trace!("Exec hook '{}' on {} {}", hook.name(), ctx.action, ctx.target());
                    let next = ExecNext { hooks: self.hooks, index: self.index + 1, terminal: self.terminal };
                    hook.execute(ctx, payload, next).await
                }
                None => (self.terminal)(payload).await,
            }
        })
    }
}

/// Which operations a hook is registered for; `None` matches any namespace or type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookScope {
    pub namespace: Option<String>,
    pub type_name: Option<String>,
    /// Empty means every action
    pub actions: Vec<Action>,
}

impl HookScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_type(namespace: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            type_name: Some(type_name.into()),
            actions: Vec::new(),
        }
    }

    pub fn for_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn on(mut self, actions: &[Action]) -> Self {
        self.actions = actions.to_vec();
        self
    }

    pub fn matches(&self, namespace: &str, type_name: &str, action: Action) -> bool {
        self.namespace.as_deref().map_or(true, |ns| ns == namespace)
            && self.type_name.as_deref().map_or(true, |t| t == type_name)
            && (self.actions.is_empty() || self.actions.contains(&action))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HookKey {
    namespace: String,
    type_name: String,
    action: Action,
}

/// Fourth pipeline stage: hooks keyed by (namespace, typeName, action).
///
/// A target's chain is collected from the registration list the first time it runs
/// and cached until the next registration.
#[derive(Default)]
pub struct ExecPipeline {
    registrations: Vec<(HookScope, Arc<dyn ExecHook>)>,
    resolved: RwLock<HashMap<HookKey, HookList>>,
}

impl ExecPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scope: HookScope, hook: Arc<dyn ExecHook>) {
        tracing::debug!("Registered exec hook '{}' for {:?}", hook.name(), scope);
        self.registrations.push((scope, hook));
        self.resolved.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn collect(&self, namespace: &str, type_name: &str, action: Action) -> HookList {
        self.registrations
            .iter()
            .filter(|(scope, _)| scope.matches(namespace, type_name, action))
            .map(|(_, hook)| hook.clone())
            .collect::<Vec<_>>()
            .into()
    }

    /// Hook chain for a target, in registration order
    pub fn hooks_for(&self, namespace: &str, type_name: &str, action: Action) -> HookList {
        let key = HookKey { namespace: namespace.to_string(), type_name: type_name.to_string(), action };
        if let Some(hooks) = self.resolved.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return hooks.clone();
        }
        let hooks = self.collect(namespace, type_name, action);
        self.resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(hooks)
            .clone()
    }

    /// Number of targets whose chain is currently cached
    pub fn cached_targets(&self) -> usize {
        self.resolved.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn execute_operation<'t>(&self, ctx: &PipelineContext, payload: Payload, terminal: Terminal<'t>) -> ExecResult {
        let hooks = self.hooks_for(&ctx.namespace, &ctx.type_name, ctx.action);
        ExecNext { hooks, index: 0, terminal }.run(ctx, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SecurityContext;
    use serde_json::json;
    use std::sync::Mutex;

    struct Tag(&'static str, Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl ExecHook for Tag {
        fn name(&self) -> &'static str { self.0 }

        async fn execute(&self, ctx: &PipelineContext, payload: Payload, next: ExecNext<'_>) -> ExecResult {
            self.1.lock().unwrap().push(format!("before {}", self.0));
            let result = next.run(ctx, payload).await;
            self.1.lock().unwrap().push(format!("after {}", self.0));
            result
        }
    }

    struct Block;

    #[async_trait]
    impl ExecHook for Block {
        fn name(&self) -> &'static str { "block" }

        async fn execute(&self, _ctx: &PipelineContext, _payload: Payload, _next: ExecNext<'_>) -> ExecResult {
            Err(DataError::validation("blocked"))
        }
    }

    fn terminal(log: Arc<Mutex<Vec<String>>>) -> Terminal<'static> {
        Box::new(move |payload: Payload| -> BoxFuture<'static, ExecResult> {
            Box::pin(async move {
                log.lock().unwrap().push("gateway".to_string());
                match payload {
                    Payload::Records(records) => Ok(records),
                    Payload::Filter(_) => Ok(Vec::new()),
                }
            })
        })
    }

    fn ctx(action: Action, type_name: &str) -> PipelineContext {
        PipelineContext::new(action, "rrhh", type_name, SecurityContext::anonymous())
    }

    #[tokio::test]
    async fn hooks_wrap_the_gateway_call_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut exec = ExecPipeline::new();
        exec.register(HookScope::all(), Arc::new(Tag("outer", log.clone())));
        exec.register(HookScope::for_type("rrhh", "Empleado"), Arc::new(Tag("inner", log.clone())));

        let record = json!({ "id": "1" }).as_object().cloned().unwrap();
        let out = exec
            .execute_operation(&ctx(Action::Create, "Empleado"), Payload::Records(vec![record]), terminal(log.clone()))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before outer", "before inner", "gateway", "after inner", "after outer"]
        );
    }

    #[tokio::test]
    async fn scopes_select_hooks_per_type_and_action() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut exec = ExecPipeline::new();
        exec.register(HookScope::for_type("rrhh", "Empleado").on(&[Action::Delete]), Arc::new(Block));

        assert_eq!(exec.hooks_for("rrhh", "Empleado", Action::Delete).len(), 1);
        assert_eq!(exec.hooks_for("rrhh", "Empleado", Action::Read).len(), 0);
        assert_eq!(exec.hooks_for("rrhh", "Oficina", Action::Delete).len(), 0);

        let err = exec
            .execute_operation(&ctx(Action::Delete, "Empleado"), Payload::Filter(FilterExpression::always()), terminal(log.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wildcard_chains_are_cached_per_target_and_reset_on_register() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut exec = ExecPipeline::new();
        exec.register(HookScope::for_namespace("rrhh"), Arc::new(Tag("ns", log.clone())));
        exec.register(HookScope::all().on(&[Action::Update]), Arc::new(Tag("updates", log.clone())));

        let first = exec.hooks_for("rrhh", "Oficina", Action::Update);
        let second = exec.hooks_for("rrhh", "Oficina", Action::Update);
        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(exec.hooks_for("otro", "Oficina", Action::Update).len(), 1);
        assert_eq!(exec.cached_targets(), 2);

        exec.register(HookScope::all(), Arc::new(Tag("late", log.clone())));
        assert_eq!(exec.cached_targets(), 0);

        exec.execute_operation(&ctx(Action::Update, "Oficina"), Payload::Filter(FilterExpression::always()), terminal(log.clone()))
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before ns", "before updates", "before late", "gateway", "after late", "after updates", "after ns"]
        );
    }
}
