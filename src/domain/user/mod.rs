//! User domain
//!
//! This module provides domain types and traits for user credentials,
//! including the user record, shape validation, and the repository trait.

mod entity;
mod repository;
mod validation;

pub use entity::{Credentials, DerivedCredential, User, UserId, UserInput};
pub use repository::UserRepository;
pub use validation::UserValidator;

#[cfg(test)]
pub use repository::MockUserRepository;
