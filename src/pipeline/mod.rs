// Five-stage operation pipeline: guard, sanitize, restrict, execute, redact.
// Every stage is an ordered chain of rules; each rule gets a `next` continuation.

pub mod context;
pub mod exec;
pub mod guard;
pub mod implementations;
pub mod redactor;
pub mod restriction;
pub mod sanitizer;

pub use context::PipelineContext;
pub use exec::{ExecHook, ExecNext, ExecPipeline, ExecResult, HookScope, Payload, Terminal};
pub use guard::{AccessGuard, AccessRule, GuardNext};
pub use redactor::{OutputRedactor, RedactNext, RedactRule};
pub use restriction::{RestrictNext, RestrictRule, RestrictionPipeline};
pub use sanitizer::{InputSanitizer, SanitizeNext, SanitizeRule};

use std::sync::Arc;

/// The fixed stage order around every CRUD call. Rule lists are read-only once
/// the pipeline is built and can be shared across concurrent requests.
pub struct OperationPipeline {
    pub guard: AccessGuard,
    pub sanitizer: InputSanitizer,
    pub restrictor: RestrictionPipeline,
    pub executor: ExecPipeline,
    pub redactor: OutputRedactor,
}

impl OperationPipeline {
    /// Empty pipeline; `default_allow` decides when no access rule does
    pub fn new(default_allow: bool) -> Self {
        Self {
            guard: AccessGuard::new(default_allow),
            sanitizer: InputSanitizer::new(),
            restrictor: RestrictionPipeline::new(),
            executor: ExecPipeline::new(),
            redactor: OutputRedactor::new(),
        }
    }

    /// Pipeline with configured guard default, system-field sanitizing, timestamps
    /// and, when enabled, audit logging
    pub fn from_config() -> Self {
        let config = crate::config::config();
        let mut pipeline = Self::new(config.security.guard_default_allow)
            .with_sanitizer(implementations::SystemFieldSanitizer)
            .with_hook(HookScope::all(), implementations::TimestampHook);
        if config.security.enable_audit_logging {
            pipeline = pipeline.with_hook(HookScope::all(), implementations::AuditHook);
        }
        pipeline
    }

    pub fn with_access_rule(mut self, rule: impl AccessRule + 'static) -> Self {
        self.guard.add_rule(Arc::new(rule));
        self
    }

    pub fn with_sanitizer(mut self, rule: impl SanitizeRule + 'static) -> Self {
        self.sanitizer.add_rule(Arc::new(rule));
        self
    }

    pub fn with_restriction(mut self, rule: impl RestrictRule + 'static) -> Self {
        self.restrictor.add_rule(Arc::new(rule));
        self
    }

    pub fn with_hook(mut self, scope: HookScope, hook: impl ExecHook + 'static) -> Self {
        self.executor.register(scope, Arc::new(hook));
        self
    }

    pub fn with_redactor(mut self, rule: impl RedactRule + 'static) -> Self {
        self.redactor.add_rule(Arc::new(rule));
        self
    }
}

impl Default for OperationPipeline {
    fn default() -> Self {
        Self::new(true)
    }
}
