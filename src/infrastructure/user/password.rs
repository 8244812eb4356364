//! Credential hashing with Argon2 or PBKDF2

use std::fmt::Debug;
use std::num::NonZeroU32;

use argon2::{
    password_hash::{
        self, rand_core::OsRng, PasswordHash, PasswordHasher as Argon2PasswordHasher,
        PasswordVerifier, SaltString,
    },
    Argon2,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::domain::user::DerivedCredential;
use crate::domain::DomainError;

/// Trait for credential derivation and verification
///
/// A mismatching password is `Ok(false)`; `Err` is reserved for failures of
/// the primitive itself, such as a malformed stored hash.
pub trait CredentialHasher: Send + Sync + Debug {
    /// Scheme name, for logs
    fn name(&self) -> &'static str;

    /// Whether derived credentials carry a salt that must be stored separately
    fn requires_salt(&self) -> bool;

    /// Derive a storable credential from a plaintext password
    fn derive(&self, password: &str) -> Result<DerivedCredential, DomainError>;

    /// Check a plaintext password against a stored credential
    fn verify(&self, password: &str, hash: &str, salt: Option<&str>) -> Result<bool, DomainError>;
}

/// Argon2-based hasher producing self-describing PHC strings
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialHasher for Argon2Hasher {
    fn name(&self) -> &'static str {
        "argon2"
    }

    fn requires_salt(&self) -> bool {
        false
    }

    fn derive(&self, password: &str) -> Result<DerivedCredential, DomainError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| DerivedCredential::new(hash.to_string(), None))
            .map_err(|e| DomainError::hash(format!("Failed to hash password: {}", e)))
    }

    // PHC strings embed their own parameters, so a hash produced with older
    // parameters still verifies.
    fn verify(&self, password: &str, hash: &str, _salt: Option<&str>) -> Result<bool, DomainError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| DomainError::hash(format!("Malformed stored hash: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(DomainError::hash(format!("Failed to verify password: {}", e))),
        }
    }
}

const PBKDF2_SALT_LEN: usize = 32;
const PBKDF2_CREDENTIAL_LEN: usize = 32;

/// PBKDF2-HMAC-SHA256 hasher; salt and hash are stored base64 encoded
#[derive(Debug, Clone)]
pub struct Pbkdf2Hasher {
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl Pbkdf2Hasher {
    pub fn new(iterations: NonZeroU32) -> Self {
        Self {
            iterations,
            rng: SystemRandom::new(),
        }
    }

    /// Build from a raw iteration count, rejecting zero
    pub fn with_iterations(iterations: u32) -> Result<Self, DomainError> {
        NonZeroU32::new(iterations)
            .map(Self::new)
            .ok_or_else(|| DomainError::configuration("PBKDF2 iterations must be at least 1"))
    }

    fn random_salt(&self) -> Result<[u8; PBKDF2_SALT_LEN], DomainError> {
        let mut salt = [0u8; PBKDF2_SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| DomainError::hash("Failed to generate salt"))?;
        Ok(salt)
    }
}

impl CredentialHasher for Pbkdf2Hasher {
    fn name(&self) -> &'static str {
        "pbkdf2"
    }

    fn requires_salt(&self) -> bool {
        true
    }

    fn derive(&self, password: &str) -> Result<DerivedCredential, DomainError> {
        let salt = self.random_salt()?;
        let mut credential = [0u8; PBKDF2_CREDENTIAL_LEN];

        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            password.as_bytes(),
            &mut credential,
        );

        Ok(DerivedCredential::new(
            STANDARD.encode(credential),
            Some(STANDARD.encode(salt)),
        ))
    }

    fn verify(&self, password: &str, hash: &str, salt: Option<&str>) -> Result<bool, DomainError> {
        let salt = salt.ok_or_else(|| DomainError::hash("Stored credential has no salt"))?;
        let salt = STANDARD
            .decode(salt)
            .map_err(|e| DomainError::hash(format!("Malformed stored salt: {}", e)))?;
        let hash = STANDARD
            .decode(hash)
            .map_err(|e| DomainError::hash(format!("Malformed stored hash: {}", e)))?;

        if hash.is_empty() {
            return Err(DomainError::hash("Stored hash is empty"));
        }

        // ring compares in constant time
        Ok(pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            password.as_bytes(),
            &hash,
        )
        .is_ok())
    }
}
