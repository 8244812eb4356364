//! User record shape validation

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use super::entity::UserInput;
use crate::domain::{DomainError, FieldError};

const MIN_ID: i64 = 1;
const MIN_USERNAME_LENGTH: usize = 1;
const MIN_PASSWORD_LENGTH: usize = 3;
const MAX_PASSWORD_LENGTH: usize = 30;

/// Letters and digits only, anchored at both ends
pub(crate) static PASSWORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-zA-Z0-9]+$").expect("password pattern is valid"));

/// Fields in the order their errors are reported
const FIELD_ORDER: [&str; 3] = ["id", "username", "password"];

/// Validates candidate user records before any side effect
///
/// Rules:
/// - `id`, when present, is at least 1
/// - `username` is required and at least 1 character long
/// - `password` is required, 3 to 30 characters, letters and digits only
///
/// The contract is fixed at construction and shared by every call.
#[derive(Debug, Clone)]
pub struct UserValidator {
    schema: Value,
}

impl Default for UserValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UserValidator {
    pub fn new() -> Self {
        let schema = json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "minimum": MIN_ID
                },
                "username": {
                    "type": "string",
                    "minLength": MIN_USERNAME_LENGTH
                },
                "password": {
                    "type": "string",
                    "pattern": PASSWORD_PATTERN.as_str(),
                    "minLength": MIN_PASSWORD_LENGTH,
                    "maxLength": MAX_PASSWORD_LENGTH
                }
            },
            "required": ["username", "password"]
        });

        Self { schema }
    }

    /// JSON-schema rendition of the contract, for callers that validate upstream
    pub fn json_schema(&self) -> &Value {
        &self.schema
    }

    /// Check a record, collecting every field error
    pub fn validate(&self, input: &UserInput) -> Result<(), DomainError> {
        let errors = match input.validate() {
            Ok(()) => return Ok(()),
            Err(errors) => errors,
        };

        let by_field = errors.field_errors();
        let mut details = Vec::new();

        for field in FIELD_ORDER {
            if let Some(field_errors) = by_field.get(field) {
                let length = field_length(input, field);

                for error in field_errors.iter() {
                    let message = describe(field, length, error);
                    details.push(FieldError::new(format!(".{}", field), message));
                }
            }
        }

        Err(DomainError::validation(details))
    }
}

fn field_length(input: &UserInput, field: &str) -> Option<usize> {
    match field {
        "username" => input.username.as_ref().map(|u| u.chars().count()),
        "password" => input.password.as_ref().map(|p| p.chars().count()),
        _ => None,
    }
}

fn length_bounds(field: &str) -> (Option<usize>, Option<usize>) {
    match field {
        "username" => (Some(MIN_USERNAME_LENGTH), None),
        "password" => (Some(MIN_PASSWORD_LENGTH), Some(MAX_PASSWORD_LENGTH)),
        _ => (None, None),
    }
}

fn describe(field: &str, length: Option<usize>, error: &ValidationError) -> String {
    match error.code.as_ref() {
        "required" => format!("should have required property '{}'", field),
        "length" => match (length, length_bounds(field)) {
            (Some(length), (Some(min), _)) if length < min => {
                format!("should NOT be shorter than {} characters", min)
            }
            (_, (_, Some(max))) => format!("should NOT be longer than {} characters", max),
            _ => "has an invalid length".to_string(),
        },
        "range" => format!("should be >= {}", MIN_ID),
        "regex" => format!("should match pattern \"{}\"", PASSWORD_PATTERN.as_str()),
        code => format!("failed the '{}' rule", code),
    }
}
