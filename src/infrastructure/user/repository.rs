//! In-memory user repository implementation

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::user::{DerivedCredential, User, UserId, UserRepository};
use crate::domain::DomainError;

#[derive(Debug)]
struct Table {
    next_id: i64,
    rows: BTreeMap<UserId, User>,
}

impl Table {
    fn new() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }

    fn username_taken(&self, username: &str, except: Option<UserId>) -> bool {
        self.rows
            .values()
            .any(|u| u.username() == username && Some(u.id()) != except)
    }
}

/// Exclusive access to the in-memory table for one operation
#[derive(Debug)]
pub struct InMemoryHandle(OwnedMutexGuard<Option<Table>>);

/// In-memory implementation of UserRepository
///
/// Mirrors the Postgres table semantics: queries fail while the table does not
/// exist, usernames are unique and ids are assigned sequentially.
#[derive(Debug)]
pub struct InMemoryUserRepository {
    table: Arc<Mutex<Option<Table>>>,
    with_salt: bool,
}

impl InMemoryUserRepository {
    /// Create a repository whose table has no salt column
    pub fn new() -> Self {
        Self::with_salt_column(false)
    }

    pub fn with_salt_column(with_salt: bool) -> Self {
        Self {
            table: Arc::new(Mutex::new(None)),
            with_salt,
        }
    }

    fn to_row(&self, id: UserId, username: &str, credential: &DerivedCredential) -> User {
        User::from_row(id, username, &credential.hash, credential.salt.clone())
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn existing(handle: &mut InMemoryHandle) -> Result<&mut Table, DomainError> {
    handle
        .0
        .as_mut()
        .ok_or_else(|| DomainError::storage("User table does not exist"))
}

fn duplicate(username: &str) -> DomainError {
    DomainError::storage(format!(
        "duplicate key value violates unique constraint: username '{}' already exists",
        username
    ))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    type Handle = InMemoryHandle;

    async fn acquire(&self) -> Result<InMemoryHandle, DomainError> {
        Ok(InMemoryHandle(Arc::clone(&self.table).lock_owned().await))
    }

    async fn create_table(&self, handle: &mut InMemoryHandle) -> Result<(), DomainError> {
        if handle.0.is_none() {
            *handle.0 = Some(Table::new());
        }
        Ok(())
    }

    async fn drop_table(&self, handle: &mut InMemoryHandle) -> Result<(), DomainError> {
        *handle.0 = None;
        Ok(())
    }

    async fn insert(
        &self,
        handle: &mut InMemoryHandle,
        username: &str,
        credential: &DerivedCredential,
    ) -> Result<Vec<User>, DomainError> {
        credential.check_salt_column(self.with_salt)?;
        let table = existing(handle)?;

        if table.username_taken(username, None) {
            return Err(duplicate(username));
        }

        let id = UserId::new(table.next_id);
        table.next_id += 1;

        let user = self.to_row(id, username, credential);
        table.rows.insert(id, user.clone());

        Ok(vec![user])
    }

    async fn update(
        &self,
        handle: &mut InMemoryHandle,
        id: UserId,
        username: &str,
        credential: &DerivedCredential,
    ) -> Result<Vec<User>, DomainError> {
        credential.check_salt_column(self.with_salt)?;
        let table = existing(handle)?;

        if !table.rows.contains_key(&id) {
            return Ok(Vec::new());
        }

        if table.username_taken(username, Some(id)) {
            return Err(duplicate(username));
        }

        let user = self.to_row(id, username, credential);
        table.rows.insert(id, user.clone());

        Ok(vec![user])
    }

    async fn select_by_id(
        &self,
        handle: &mut InMemoryHandle,
        id: UserId,
    ) -> Result<Vec<User>, DomainError> {
        let table = existing(handle)?;
        Ok(table.rows.get(&id).cloned().into_iter().collect())
    }

    async fn select_by_username(
        &self,
        handle: &mut InMemoryHandle,
        username: &str,
    ) -> Result<Vec<User>, DomainError> {
        let table = existing(handle)?;

        Ok(table
            .rows
            .values()
            .filter(|u| u.username() == username)
            .cloned()
            .collect())
    }

    async fn close(&self) {}
}
