use std::time::{Duration, Instant};

use crate::types::{Action, SecurityContext};

/// Per-call pipeline state. Built by the data service for one operation and dropped afterwards.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub action: Action,
    pub namespace: String,
    pub type_name: String,
    pub security: SecurityContext,
    start_time: Instant,
}

impl PipelineContext {
    pub fn new(
        action: Action,
        namespace: impl Into<String>,
        type_name: impl Into<String>,
        security: SecurityContext,
    ) -> Self {
        Self {
            action,
            namespace: namespace.into(),
            type_name: type_name.into(),
            security,
            start_time: Instant::now(),
        }
    }

    /// `namespace:typeName`
    pub fn target(&self) -> String {
        format!("{}:{}", self.namespace, self.type_name)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn is_type(&self, type_name: &str) -> bool {
        self.type_name.eq_ignore_ascii_case(type_name)
    }
}
