// Boundary error types for the data service
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::filter::FilterError;
use crate::schema::SchemaError;
use crate::store::StoreError;
use crate::types::Action;

/// Errors surfaced by the data service, with status codes a transport layer can map directly
#[derive(Debug)]
pub enum DataError {
    // 400 Bad Request
    MalformedFilter {
        message: String,
        argument: Option<String>,
    },
    Validation {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 403 Forbidden
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    StorageLockFailure(String),
    Storage(String),
    Schema(String),
    Internal(String),
}

impl DataError {
    pub fn status_code(&self) -> u16 {
        match self {
            DataError::MalformedFilter { .. } => 400,
            DataError::Validation { .. } => 400,
            DataError::Unauthorized(_) => 403,
            DataError::NotFound(_) => 404,
            DataError::StorageLockFailure(_) => 500,
            DataError::Storage(_) => 500,
            DataError::Schema(_) => 500,
            DataError::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DataError::MalformedFilter { message, .. } => message,
            DataError::Validation { message, .. } => message,
            DataError::Unauthorized(msg) => msg,
            DataError::NotFound(msg) => msg,
            DataError::StorageLockFailure(msg) => msg,
            DataError::Storage(msg) => msg,
            DataError::Schema(msg) => msg,
            DataError::Internal(msg) => msg,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DataError::MalformedFilter { .. } => "MALFORMED_FILTER",
            DataError::Validation { .. } => "VALIDATION_ERROR",
            DataError::Unauthorized(_) => "FORBIDDEN",
            DataError::NotFound(_) => "NOT_FOUND",
            DataError::StorageLockFailure(_) => "STORAGE_LOCK_FAILURE",
            DataError::Storage(_) => "STORAGE_ERROR",
            DataError::Schema(_) => "SCHEMA_ERROR",
            DataError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        });

        match self {
            DataError::MalformedFilter { argument: Some(argument), .. } => {
                response["argument"] = json!(argument);
            }
            DataError::Validation { field_errors: Some(field_errors), .. } => {
                response["field_errors"] = json!(field_errors);
            }
            _ => {}
        }

        response
    }
}

// Constructors
impl DataError {
    /// Guard denial: `Not allowed to <action> on <namespace>:<typeName>`
    pub fn unauthorized(action: Action, namespace: &str, type_name: &str) -> Self {
        DataError::Unauthorized(format!("Not allowed to {} on {}:{}", action, namespace, type_name))
    }

    pub fn malformed_filter(message: impl Into<String>, argument: Option<String>) -> Self {
        DataError::MalformedFilter {
            message: message.into(),
            argument,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DataError::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn validation_with_fields(message: impl Into<String>, field_errors: HashMap<String, String>) -> Self {
        DataError::Validation {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        DataError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        DataError::Internal(message.into())
    }
}

impl From<FilterError> for DataError {
    fn from(err: FilterError) -> Self {
        let argument = err.argument().map(String::from);
        DataError::malformed_filter(err.to_string(), argument)
    }
}

impl From<SchemaError> for DataError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::NotFound(namespace) => DataError::not_found(format!("Unknown namespace: {}", namespace)),
            other => {
                tracing::error!("Schema error: {}", other);
                DataError::Schema(other.to_string())
            }
        }
    }
}

impl From<StoreError> for DataError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName(name) => DataError::validation(format!("Invalid collection name: {}", name)),
            err if err.is_lock_failure() => {
                tracing::error!("Storage lock failure: {}", err);
                DataError::StorageLockFailure(err.to_string())
            }
            other => {
                tracing::error!("Storage error: {}", other);
                DataError::Storage(other.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::validation(format!("Invalid JSON: {}", err))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for DataError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_message_names_action_and_target() {
        let err = DataError::unauthorized(Action::Delete, "rrhh", "Empleado");
        assert_eq!(err.to_string(), "Not allowed to delete on rrhh:Empleado");
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn filter_errors_keep_the_argument() {
        let err: DataError = FilterError::malformed("sueldoGt", "unknown field").into();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_json()["argument"], "sueldoGt");
        assert_eq!(err.error_code(), "MALFORMED_FILTER");
    }

    #[test]
    fn lock_timeouts_map_to_lock_failure() {
        let err: DataError = StoreError::LockTimeout {
            path: "e.json.lock".into(),
            waited: std::time::Duration::from_millis(10),
        }
        .into();
        assert_eq!(err.error_code(), "STORAGE_LOCK_FAILURE");
        assert_eq!(err.status_code(), 500);
    }
}
