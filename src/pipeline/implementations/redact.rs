use async_trait::async_trait;
use serde_json::Value;

use crate::error::DataError;
use crate::pipeline::{PipelineContext, RedactNext, RedactRule};
use crate::types::Record;

#[derive(Debug, Clone, PartialEq)]
pub enum RedactionMode {
    Remove,
    Mask(String),
}

/// Removes or masks dotted field paths on outgoing records
pub struct FieldRedaction {
    paths: Vec<String>,
    mode: RedactionMode,
    exempt_role: Option<String>,
    type_name: Option<String>,
}

impl FieldRedaction {
    pub fn remove<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            mode: RedactionMode::Remove,
            exempt_role: None,
            type_name: None,
        }
    }

    pub fn mask<I, S>(paths: I, mask: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: RedactionMode::Mask(mask.into()),
            ..Self::remove(paths)
        }
    }

    /// Callers holding this role see records unredacted
    pub fn exempt(mut self, role: impl Into<String>) -> Self {
        self.exempt_role = Some(role.into());
        self
    }

    pub fn for_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    fn apply(&self, record: &mut Record) {
        for path in &self.paths {
            let segments: Vec<&str> = path.split('.').collect();
            redact_path(record, &segments, &self.mode);
        }
    }
}

fn redact_path(record: &mut Record, segments: &[&str], mode: &RedactionMode) {
    let Some((head, rest)) = segments.split_first() else { return };
    if rest.is_empty() {
        match mode {
            RedactionMode::Remove => {
                record.remove(*head);
            }
            RedactionMode::Mask(mask) => {
                if let Some(value) = record.get_mut(*head).filter(|v| !v.is_null()) {
                    *value = Value::String(mask.clone());
                }
            }
        }
        return;
    }

    match record.get_mut(*head) {
        Some(Value::Object(nested)) => redact_path(nested, rest, mode),
        Some(Value::Array(items)) => {
            for item in items.iter_mut() {
                if let Value::Object(nested) = item {
                    redact_path(nested, rest, mode);
                }
            }
        }
        _ => {}
    }
}

#[async_trait]
impl RedactRule for FieldRedaction {
    fn name(&self) -> &'static str {
        "field_redaction"
    }

    async fn redact(&self, ctx: &PipelineContext, mut records: Vec<Record>, next: RedactNext<'_>) -> Result<Vec<Record>, DataError> {
        let exempt = self.exempt_role.as_deref().map_or(false, |role| ctx.security.has_role(role));
        let applies = self.type_name.as_deref().map_or(true, |t| ctx.is_type(t));
        if applies && !exempt {
            for record in &mut records {
                self.apply(record);
            }
        }
        next.run(ctx, records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::OutputRedactor;
    use crate::types::{Action, SecurityContext};
    use serde_json::json;
    use std::sync::Arc;

    fn records() -> Vec<Record> {
        vec![json!({
            "id": "1",
            "salario": 50000,
            "oficina": { "telefono": "986000000", "nombre": "Vigo" }
        })
        .as_object()
        .cloned()
        .unwrap()]
    }

    #[tokio::test]
    async fn removes_and_masks_nested_paths() {
        let mut redactor = OutputRedactor::new();
        redactor.add_rule(Arc::new(FieldRedaction::remove(["salario"]).exempt("rrhh")));
        redactor.add_rule(Arc::new(FieldRedaction::mask(["oficina.telefono"], "***")));

        let ctx = PipelineContext::new(Action::Read, "rrhh", "Empleado", SecurityContext::user("ana"));
        let out = redactor.filter_output(&ctx, records()).await.unwrap();
        assert!(!out[0].contains_key("salario"));
        assert_eq!(out[0]["oficina"]["telefono"], json!("***"));
        assert_eq!(out[0]["oficina"]["nombre"], json!("Vigo"));

        let hr = PipelineContext::new(Action::Read, "rrhh", "Empleado", SecurityContext::user("eva").with_role("rrhh"));
        let out = redactor.filter_output(&hr, records()).await.unwrap();
        assert_eq!(out[0]["salario"], json!(50000));
    }
}
