use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::pipeline::{ExecHook, ExecNext, ExecResult, Payload, PipelineContext};
use crate::types::{Action, ID_FIELD};

/// Stamps `created_at` on create and `updated_at` on create and update
pub struct TimestampHook;

#[async_trait]
impl ExecHook for TimestampHook {
    fn name(&self) -> &'static str {
        "timestamps"
    }

    async fn execute(&self, ctx: &PipelineContext, payload: Payload, next: ExecNext<'_>) -> ExecResult {
        let payload = match payload {
            Payload::Records(mut records) if matches!(ctx.action, Action::Create | Action::Update) => {
                let now = Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
                for record in &mut records {
                    if ctx.action == Action::Create {
                        record.insert("created_at".to_string(), now.clone());
                    }
                    record.insert("updated_at".to_string(), now.clone());
                }
                Payload::Records(records)
            }
            other => other,
        };
        next.run(ctx, payload).await
    }
}

/// Logs every completed write under the `monk_data::audit` target
pub struct AuditHook;

#[async_trait]
impl ExecHook for AuditHook {
    fn name(&self) -> &'static str {
        "audit"
    }

    async fn execute(&self, ctx: &PipelineContext, payload: Payload, next: ExecNext<'_>) -> ExecResult {
        let result = next.run(ctx, payload).await;
        if !ctx.action.is_write() {
            return result;
        }

        match &result {
            Ok(records) => {
                let ids: Vec<&str> = records
                    .iter()
                    .filter_map(|r| r.get(ID_FIELD).and_then(Value::as_str))
                    .collect();
                tracing::info!(
                    target: "monk_data::audit",
                    "{} {} by {:?}: {:?} in {:?}",
                    ctx.action,
                    ctx.target(),
                    ctx.security.subject,
                    ids,
                    ctx.elapsed()
                );
            }
            Err(e) => {
                tracing::info!(
                    target: "monk_data::audit",
                    "{} {} by {:?} failed: {}",
                    ctx.action,
                    ctx.target(),
                    ctx.security.subject,
                    e
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ExecPipeline, HookScope, Terminal};
    use crate::types::SecurityContext;
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::Arc;

    fn echo() -> Terminal<'static> {
        Box::new(|payload: Payload| -> BoxFuture<'static, ExecResult> {
            Box::pin(async move {
                match payload {
                    Payload::Records(records) => Ok(records),
                    Payload::Filter(_) => Ok(Vec::new()),
                }
            })
        })
    }

    #[tokio::test]
    async fn timestamps_depend_on_action() {
        let mut exec = ExecPipeline::new();
        exec.register(HookScope::all(), Arc::new(TimestampHook));
        exec.register(HookScope::all(), Arc::new(AuditHook));
        let record = json!({ "id": "1" }).as_object().cloned().unwrap();

        let create = PipelineContext::new(Action::Create, "rrhh", "Empleado", SecurityContext::anonymous());
        let out = exec.execute_operation(&create, Payload::Records(vec![record.clone()]), echo()).await.unwrap();
        assert!(out[0].contains_key("created_at"));
        assert!(out[0].contains_key("updated_at"));

        let update = PipelineContext::new(Action::Update, "rrhh", "Empleado", SecurityContext::anonymous());
        let out = exec.execute_operation(&update, Payload::Records(vec![record]), echo()).await.unwrap();
        assert!(!out[0].contains_key("created_at"));
        assert!(out[0].contains_key("updated_at"));
    }
}
