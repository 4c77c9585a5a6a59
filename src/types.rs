/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// CRUD actions supported throughout the system
/// Used by the pipeline stages, the data service and the hook registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Parse an action keyword from a mutation payload
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "create" | "insert" => Some(Action::Create),
            "read" | "fetch" | "select" => Some(Action::Read),
            "update" | "modify" => Some(Action::Update),
            "delete" | "remove" => Some(Action::Delete),
            _ => None,
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Action::Read)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name to value; relations nest as objects (to-one) or arrays of objects (to-many)
pub type Record = Map<String, Value>;

/// Primary key field present on every stored record
pub const ID_FIELD: &str = "id";

/// Authenticated identity snapshot passed explicitly through every pipeline call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityContext {
    pub subject: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub claims: Map<String, Value>,
}

impl SecurityContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.subject.is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Look up a claim; `sub` falls back to the subject
    pub fn claim(&self, name: &str) -> Option<Value> {
        match self.claims.get(name) {
            Some(value) => Some(value.clone()),
            None if name == "sub" => self.subject.clone().map(Value::String),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_keywords_parse_case_insensitively() {
        assert_eq!(Action::parse("CREATE"), Some(Action::Create));
        assert_eq!(Action::parse("modify"), Some(Action::Update));
        assert_eq!(Action::parse("remove"), Some(Action::Delete));
        assert_eq!(Action::parse("upsert"), None);
    }

    #[test]
    fn sub_claim_falls_back_to_subject() {
        let ctx = SecurityContext::user("ana");
        assert_eq!(ctx.claim("sub"), Some(Value::String("ana".into())));
        assert_eq!(ctx.claim("tenant"), None);

        let ctx = ctx.with_claim("tenant", "galicia");
        assert_eq!(ctx.claim("tenant"), Some(Value::String("galicia".into())));
    }
}
