//! User repository trait

use async_trait::async_trait;

use super::entity::{DerivedCredential, User, UserId};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Row-store access for the user table
///
/// Every query borrows a handle obtained from [`UserRepository::acquire`]; the
/// caller owns it for the whole operation and releases it by dropping it.
/// Queries return the raw rows they produced: an empty list is a normal result,
/// not an error. Store faults surface as [`DomainError::Storage`].
#[cfg_attr(test, automock(type Handle = ();))]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Connection handle held for the duration of one operation
    type Handle: Send;

    /// Check out a handle from the store
    async fn acquire(&self) -> Result<Self::Handle, DomainError>;

    /// Create the user table if it does not exist
    async fn create_table(&self, handle: &mut Self::Handle) -> Result<(), DomainError>;

    /// Drop the user table if it exists
    async fn drop_table(&self, handle: &mut Self::Handle) -> Result<(), DomainError>;

    /// Insert a new row, returning it with its generated id
    async fn insert(
        &self,
        handle: &mut Self::Handle,
        username: &str,
        credential: &DerivedCredential,
    ) -> Result<Vec<User>, DomainError>;

    /// Replace username and credential of an existing row
    async fn update(
        &self,
        handle: &mut Self::Handle,
        id: UserId,
        username: &str,
        credential: &DerivedCredential,
    ) -> Result<Vec<User>, DomainError>;

    async fn select_by_id(
        &self,
        handle: &mut Self::Handle,
        id: UserId,
    ) -> Result<Vec<User>, DomainError>;

    async fn select_by_username(
        &self,
        handle: &mut Self::Handle,
        username: &str,
    ) -> Result<Vec<User>, DomainError>;

    /// Release the underlying store; no operation may be in flight
    async fn close(&self);
}
