//! Matcher error taxonomy

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("unknown pattern id: {0}")]
    NotFound(String),

    #[error("invalid pattern `{id}`: {message}")]
    InvalidDefinition { id: String, message: String },
}

impl PatternError {
    pub fn kind(&self) -> &'static str {
        match self {
            PatternError::NotFound(_) => "pattern_not_found",
            PatternError::InvalidDefinition { .. } => "invalid_pattern",
        }
    }

    pub(crate) fn invalid(id: &str, message: impl Into<String>) -> Self {
        PatternError::InvalidDefinition {
            id: id.to_string(),
            message: message.into(),
        }
    }
}
