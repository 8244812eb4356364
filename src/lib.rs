//! User store
//!
//! A data-access layer for user accounts:
//! - Shape validation of user records before any write
//! - Credential hashing with Argon2 or PBKDF2
//! - PostgreSQL persistence through a pooled, per-operation connection
//! - Password verification on authentication

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::user::{Credentials, User, UserId, UserInput};
pub use domain::{DomainError, ErrorKind, ErrorResponse, FieldError};
pub use infrastructure::user::{PostgresUserRepository, UserService};

use std::sync::Arc;

use tracing::info;

use infrastructure::user::create_hasher;

/// User service backed by PostgreSQL
pub type PostgresUserService = UserService<PostgresUserRepository>;

/// Build a user service for the given connection URL with default settings
pub async fn connect(url: &str) -> Result<PostgresUserService, DomainError> {
    let mut config = AppConfig::default();
    config.database.url = url.to_string();

    connect_with_config(&config).await
}

/// Build a user service from a full configuration
///
/// The pool connects lazily: no connection is opened until the first
/// operation, so this succeeds without a reachable server.
pub async fn connect_with_config(config: &AppConfig) -> Result<PostgresUserService, DomainError> {
    config.validate()?;

    let hasher = create_hasher(&config.hashing)?;
    let repository = PostgresUserRepository::connect_lazy(&config.database, hasher.requires_salt())?;

    info!(
        table = %config.database.table,
        scheme = hasher.name(),
        "User store configured"
    );

    Ok(UserService::new(Arc::new(repository), hasher))
}
