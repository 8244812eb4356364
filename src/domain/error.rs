use serde::Serialize;
use thiserror::Error;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Path of the offending field, e.g. `.username`
    pub path: String,
    /// Human readable description of the failed rule
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.path, self.message)
    }
}

/// Broad classification of a [`DomainError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Storage,
    Hash,
    Configuration,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Storage => write!(f, "storage"),
            Self::Hash => write!(f, "hash"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Hash error: {message}")]
    Hash { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Validation failure carrying every field error found, in order
    pub fn validation(details: Vec<FieldError>) -> Self {
        let message = details
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        Self::Validation { message, details }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn hash(message: impl Into<String>) -> Self {
        Self::Hash {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Hash { .. } => ErrorKind::Hash,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP-style status code so outer layers can map errors directly
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation { .. } => 422,
            _ => 500,
        }
    }

    /// Field errors of a validation failure; empty for every other kind
    pub fn details(&self) -> &[FieldError] {
        match self {
            Self::Validation { details, .. } => details,
            _ => &[],
        }
    }
}

/// Serializable error shape handed to outer layers
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    pub status: u16,
    #[serde(rename = "notFound")]
    pub not_found: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

impl From<&DomainError> for ErrorResponse {
    fn from(error: &DomainError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            status: error.status(),
            not_found: error.is_not_found(),
            details: error.details().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("User '42' not found");
        assert_eq!(error.to_string(), "Not found: User '42' not found");
        assert!(error.is_not_found());
        assert_eq!(error.status(), 404);
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation(vec![
            FieldError::new(".username", "should NOT be shorter than 1 characters"),
            FieldError::new(".password", "should NOT be shorter than 3 characters"),
        ]);

        assert_eq!(
            error.to_string(),
            "Validation error: .username should NOT be shorter than 1 characters, \
             .password should NOT be shorter than 3 characters"
        );
        assert_eq!(error.status(), 422);
        assert!(!error.is_not_found());
        assert_eq!(error.details().len(), 2);
        assert_eq!(error.details()[0].path, ".username");
    }

    #[test]
    fn test_other_kinds() {
        let storage = DomainError::storage("connection refused");
        assert_eq!(storage.kind(), ErrorKind::Storage);
        assert_eq!(storage.status(), 500);
        assert!(storage.details().is_empty());

        let hash = DomainError::hash("invalid PHC string");
        assert_eq!(hash.kind(), ErrorKind::Hash);
        assert_eq!(hash.to_string(), "Hash error: invalid PHC string");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(ErrorKind::Validation.to_string(), "validation");
    }

    #[test]
    fn test_error_response_shape() {
        let response = ErrorResponse::from(&DomainError::not_found("User '42' not found"));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["status"], 404);
        assert_eq!(json["notFound"], true);
        assert!(json.get("details").is_none());

        let response = ErrorResponse::from(&DomainError::validation(vec![FieldError::new(
            ".username",
            "should NOT be shorter than 1 characters",
        )]));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["notFound"], false);
        assert_eq!(json["details"][0]["path"], ".username");
    }
}
