//! User entity and related types

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validation::PASSWORD_PATTERN;
use crate::domain::DomainError;

/// Server-generated user identifier, the table's primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output of a credential hasher, ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedCredential {
    /// Encoded derived key
    pub hash: String,
    /// Externally stored salt, only for schemes that are not self-salting
    pub salt: Option<String>,
}

impl DerivedCredential {
    pub fn new(hash: impl Into<String>, salt: Option<String>) -> Self {
        Self {
            hash: hash.into(),
            salt,
        }
    }

    /// Check that the credential fits a table with or without a salt column
    ///
    /// A salt written to a table without the column would be lost and the row
    /// could never be verified again.
    pub fn check_salt_column(&self, with_salt: bool) -> Result<(), DomainError> {
        match (with_salt, self.salt.is_some()) {
            (true, false) => Err(DomainError::storage(
                "Credential has no salt but the user table requires one",
            )),
            (false, true) => Err(DomainError::storage(
                "Credential has a salt but the user table has no salt column",
            )),
            _ => Ok(()),
        }
    }
}

/// A user row as materialized from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    username: String,
    hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
    /// Plaintext echo of the caller's input on `put`. Never persisted and
    /// never populated from storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

impl User {
    /// Build a user from stored columns
    pub fn from_row(
        id: UserId,
        username: impl Into<String>,
        hash: impl Into<String>,
        salt: Option<String>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            hash: hash.into(),
            salt,
            password: None,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn salt(&self) -> Option<&str> {
        self.salt.as_deref()
    }

    /// Plaintext password echoed back by `put`, if any
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Attach the caller-supplied plaintext to a freshly written row
    pub fn with_password_echo(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Drop the plaintext echo, leaving only stored columns
    pub fn without_password(mut self) -> Self {
        self.password = None;
        self
    }
}

/// Candidate record submitted to `put`
///
/// `id` selects the update branch; without it a new row is inserted.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserInput {
    #[serde(default)]
    #[validate(range(min = 1))]
    pub id: Option<i64>,
    #[serde(default)]
    #[validate(required, length(min = 1))]
    pub username: Option<String>,
    #[serde(default)]
    #[validate(required, length(min = 3, max = 30), regex(path = *PASSWORD_PATTERN))]
    pub password: Option<String>,
}

impl UserInput {
    /// Input for the insert branch
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: None,
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Input for the update branch
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Username and plaintext password presented for authentication
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}
