//! Hasher factory for runtime selection

use std::sync::Arc;

use crate::config::{HashingConfig, HashingScheme};
use crate::domain::DomainError;

use super::password::{Argon2Hasher, CredentialHasher, Pbkdf2Hasher};

/// Create the credential hasher named by the configuration
pub fn create_hasher(config: &HashingConfig) -> Result<Arc<dyn CredentialHasher>, DomainError> {
    match config.scheme {
        HashingScheme::Argon2 => Ok(Arc::new(Argon2Hasher::new())),
        HashingScheme::Pbkdf2 => Ok(Arc::new(Pbkdf2Hasher::with_iterations(
            config.pbkdf2_iterations,
        )?)),
    }
}
