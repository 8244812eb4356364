//! User infrastructure module
//!
//! This module provides implementations for credential storage and
//! verification: Argon2 and PBKDF2 hashers, PostgreSQL and in-memory
//! repositories, and the user service that composes them.

mod factory;
mod password;
mod postgres_repository;
mod repository;
mod service;

pub use factory::create_hasher;
pub use password::{Argon2Hasher, CredentialHasher, Pbkdf2Hasher};
pub use postgres_repository::PostgresUserRepository;
pub use repository::{InMemoryHandle, InMemoryUserRepository};
pub use service::UserService;
