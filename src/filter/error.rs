use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Malformed filter argument '{argument}': {reason}")]
    MalformedFilter { argument: String, reason: String },

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),
}

impl FilterError {
    pub fn malformed(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        FilterError::MalformedFilter {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// The offending argument name, when the error is tied to one
    pub fn argument(&self) -> Option<&str> {
        match self {
            FilterError::MalformedFilter { argument, .. } => Some(argument),
            _ => None,
        }
    }
}
