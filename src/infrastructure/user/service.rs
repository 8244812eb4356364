//! User service: the validate, hash, persist, retrieve and verify pipeline

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::domain::user::{
    Credentials, DerivedCredential, User, UserId, UserInput, UserRepository, UserValidator,
};
use crate::domain::DomainError;

use super::password::CredentialHasher;

/// A record that passed shape validation
#[derive(Debug)]
struct ValidatedUser {
    id: Option<UserId>,
    username: String,
    password: String,
}

/// A validated record with its derived credential, ready to be written
#[derive(Debug)]
struct PendingWrite {
    id: Option<UserId>,
    username: String,
    /// Kept only to echo back to the caller; never handed to the repository
    password: String,
    credential: DerivedCredential,
}

/// User service composing validation, hashing and persistence
///
/// Every operation checks out one repository handle, runs its steps in order
/// and stops at the first failing step, returning that step's error unchanged.
/// The handle is released when the operation returns, on success or failure.
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    hasher: Arc<dyn CredentialHasher>,
    validator: UserValidator,
}

impl<R: UserRepository> std::fmt::Debug for UserService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("hasher", &self.hasher)
            .finish()
    }
}

impl<R: UserRepository> UserService<R> {
    /// Create a new user service
    pub fn new(repository: Arc<R>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            repository,
            hasher,
            validator: UserValidator::new(),
        }
    }

    /// JSON-schema rendition of the record contract enforced by `put`
    pub fn json_schema(&self) -> &Value {
        self.validator.json_schema()
    }

    /// Whether the configured hashing scheme stores a separate salt column
    pub fn requires_salt(&self) -> bool {
        self.hasher.requires_salt()
    }

    /// Create the user table if it does not exist
    #[instrument(skip(self))]
    pub async fn create_schema(&self) -> Result<(), DomainError> {
        let mut handle = self.repository.acquire().await?;
        self.repository.create_table(&mut handle).await?;

        info!(with_salt = self.hasher.requires_salt(), "User schema created");
        Ok(())
    }

    /// Drop the user table; succeeds when it is already absent
    #[instrument(skip(self))]
    pub async fn drop_schema(&self) -> Result<(), DomainError> {
        let mut handle = self.repository.acquire().await?;
        self.repository.drop_table(&mut handle).await?;

        info!("User schema dropped");
        Ok(())
    }

    /// Insert a new user, or update an existing one when `id` is set
    ///
    /// The returned row carries the caller's plaintext password as a
    /// convenience echo; it was not read from storage.
    #[instrument(skip(self, input), fields(username = ?input.username, id = ?input.id))]
    pub async fn put(&self, input: UserInput) -> Result<User, DomainError> {
        let mut handle = self.repository.acquire().await?;

        let user = self.validate(input)?;
        let pending = self.derive_credential(user).await?;
        let (rows, password) = self.write(&mut handle, pending).await?;
        let user = first_row(rows, || "Written user not returned by the store".to_string())?;

        info!(user_id = %user.id(), "User written");
        Ok(user.with_password_echo(password))
    }

    /// Get a user by id
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> Result<User, DomainError> {
        let mut handle = self.repository.acquire().await?;

        let rows = self.repository.select_by_id(&mut handle, UserId::new(id)).await?;
        first_row(rows, || format!("User '{}' not found", id))
    }

    /// Get a user by username
    #[instrument(skip(self))]
    pub async fn get_by_username(&self, username: &str) -> Result<User, DomainError> {
        let mut handle = self.repository.acquire().await?;

        let rows = self.repository.select_by_username(&mut handle, username).await?;
        first_row(rows, || format!("User '{}' not found", username))
    }

    /// Check a username and password
    ///
    /// An unknown username is a `NotFound` error; a wrong password for an
    /// existing user is `Ok(false)`.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn authenticate(&self, credentials: Credentials) -> Result<bool, DomainError> {
        let mut handle = self.repository.acquire().await?;

        let rows = self
            .repository
            .select_by_username(&mut handle, &credentials.username)
            .await?;
        let user = first_row(rows, || format!("User '{}' not found", credentials.username))?;
        let matched = self.verify(credentials.password, user).await?;

        debug!(matched, "Password verification completed");
        Ok(matched)
    }

    /// Close the underlying store. No operation may be in flight.
    pub async fn end(&self) {
        self.repository.close().await;
        debug!("User store closed");
    }

    fn validate(&self, input: UserInput) -> Result<ValidatedUser, DomainError> {
        if let Err(e) = self.validator.validate(&input) {
            debug!(error = %e, "Rejected user record");
            return Err(e);
        }

        Ok(ValidatedUser {
            id: input.id.map(UserId::new),
            username: input.username.unwrap_or_default(),
            password: input.password.unwrap_or_default(),
        })
    }

    async fn derive_credential(&self, user: ValidatedUser) -> Result<PendingWrite, DomainError> {
        let hasher = Arc::clone(&self.hasher);
        let password = user.password.clone();
        let credential = run_blocking(move || hasher.derive(&password)).await?;

        Ok(PendingWrite {
            id: user.id,
            username: user.username,
            password: user.password,
            credential,
        })
    }

    async fn write(
        &self,
        handle: &mut R::Handle,
        pending: PendingWrite,
    ) -> Result<(Vec<User>, String), DomainError> {
        let rows = match pending.id {
            Some(id) => {
                self.repository
                    .update(handle, id, &pending.username, &pending.credential)
                    .await?
            }
            None => {
                self.repository
                    .insert(handle, &pending.username, &pending.credential)
                    .await?
            }
        };

        Ok((rows, pending.password))
    }

    async fn verify(&self, password: String, user: User) -> Result<bool, DomainError> {
        let hasher = Arc::clone(&self.hasher);
        run_blocking(move || hasher.verify(&password, user.hash(), user.salt())).await
    }
}

/// Collapse a query result to its first row
fn first_row(rows: Vec<User>, missing: impl FnOnce() -> String) -> Result<User, DomainError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DomainError::not_found(missing()))
}

/// Key derivation is deliberately slow; keep it off the async workers
async fn run_blocking<T, F>(task: F) -> Result<T, DomainError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| DomainError::hash(format!("Hashing task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::MockUserRepository;
    use crate::domain::ErrorKind;
    use crate::infrastructure::user::password::{Argon2Hasher, Pbkdf2Hasher};
    use crate::infrastructure::user::repository::InMemoryUserRepository;

    fn fast_hasher() -> Arc<dyn CredentialHasher> {
        Arc::new(Pbkdf2Hasher::with_iterations(1_000).unwrap())
    }

    async fn create_service() -> UserService<InMemoryUserRepository> {
        let repository = Arc::new(InMemoryUserRepository::with_salt_column(true));
        let service = UserService::new(repository, fast_hasher());
        service.create_schema().await.unwrap();
        service
    }

    async fn create_argon2_service() -> UserService<InMemoryUserRepository> {
        let repository = Arc::new(InMemoryUserRepository::new());
        let service = UserService::new(repository, Arc::new(Argon2Hasher::new()));
        service.create_schema().await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_insert_user() {
        let service = create_service().await;

        let user = service.put(UserInput::new("myusername", "wait")).await.unwrap();

        assert!(user.id().value() > 0);
        assert_eq!(user.username(), "myusername");
        assert_eq!(user.password(), Some("wait"));
        assert!(!user.hash().is_empty());
        assert!(fast_hasher()
            .verify("wait", user.hash(), user.salt())
            .unwrap());
    }

    #[tokio::test]
    async fn test_update_user() {
        let service = create_service().await;

        let first = service.put(UserInput::new("myuser", "apassword")).await.unwrap();
        let second = service
            .put(UserInput::new("myuser", "anotherpassword").with_id(first.id().value()))
            .await
            .unwrap();

        assert_eq!(second.id(), first.id());
        assert_eq!(second.username(), "myuser");
        assert_ne!(second.hash(), first.hash());

        let stored = service.get_by_id(first.id().value()).await.unwrap();
        assert_eq!(stored.hash(), second.hash());
    }

    #[tokio::test]
    async fn test_update_can_rename() {
        let service = create_service().await;

        let user = service.put(UserInput::new("before", "mypass")).await.unwrap();
        service
            .put(UserInput::new("after", "mypass").with_id(user.id().value()))
            .await
            .unwrap();

        assert_eq!(service.get_by_id(user.id().value()).await.unwrap().username(), "after");
        assert!(service.get_by_username("before").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let service = create_service().await;

        let error = service
            .put(UserInput::new("myuser", "mypass").with_id(99))
            .await
            .unwrap_err();

        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let service = create_service().await;

        let expected = service
            .put(UserInput::new("myusername2", "mypass"))
            .await
            .unwrap()
            .without_password();
        let user = service.get_by_id(expected.id().value()).await.unwrap();

        assert_eq!(user, expected);
        assert!(user.password().is_none());
    }

    #[tokio::test]
    async fn test_get_by_username() {
        let service = create_service().await;

        let expected = service
            .put(UserInput::new("myusername3", "mypass"))
            .await
            .unwrap()
            .without_password();
        let user = service.get_by_username("myusername3").await.unwrap();

        assert_eq!(user, expected);
    }

    #[tokio::test]
    async fn test_empty_username_rejected() {
        let service = create_service().await;

        let error = service.put(UserInput::new("", "mypass")).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(error.status(), 422);
        assert_eq!(error.details()[0].path, ".username");
        assert_eq!(
            error.details()[0].message,
            "should NOT be shorter than 1 characters"
        );
        assert!(service.get_by_username("").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_authenticate() {
        let service = create_service().await;

        service.put(UserInput::new("myusername4", "mypass")).await.unwrap();

        assert!(service
            .authenticate(Credentials::new("myusername4", "mypass"))
            .await
            .unwrap());
        assert!(!service
            .authenticate(Credentials::new("myusername4", "wrong"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_authenticate_uses_latest_password() {
        let service = create_service().await;

        let user = service.put(UserInput::new("myusername5", "oldpass")).await.unwrap();
        service
            .put(UserInput::new("myusername5", "newpass").with_id(user.id().value()))
            .await
            .unwrap();

        assert!(!service
            .authenticate(Credentials::new("myusername5", "oldpass"))
            .await
            .unwrap());
        assert!(service
            .authenticate(Credentials::new("myusername5", "newpass"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user() {
        let service = create_service().await;

        let error = service
            .authenticate(Credentials::new("nobody", "mypass"))
            .await
            .unwrap_err();

        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_get_missing_user() {
        let service = create_service().await;

        let error = service.get_by_id(42).await.unwrap_err();

        assert!(error.is_not_found());
        assert_eq!(error.status(), 404);

        let error = service.get_by_username("missing").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_storage_error() {
        let service = create_service().await;

        service.put(UserInput::new("taken", "mypass")).await.unwrap();
        let error = service.put(UserInput::new("taken", "other")).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_schema_recreate() {
        let service = create_service().await;

        service.put(UserInput::new("user", "mypass")).await.unwrap();
        service.drop_schema().await.unwrap();
        service.drop_schema().await.unwrap();

        let error = service.get_by_username("user").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Storage);

        service.create_schema().await.unwrap();
        service.create_schema().await.unwrap();

        let user = service.put(UserInput::new("user", "mypass")).await.unwrap();
        assert_eq!(user.id().value(), 1);
    }

    #[tokio::test]
    async fn test_argon2_pipeline() {
        let service = create_argon2_service().await;
        assert!(!service.requires_salt());

        let user = service.put(UserInput::new("argonuser", "mypass")).await.unwrap();
        assert!(user.salt().is_none());

        assert!(service
            .authenticate(Credentials::new("argonuser", "mypass"))
            .await
            .unwrap());
        assert!(!service
            .authenticate(Credentials::new("argonuser", "another"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_salted_hasher_on_unsalted_table_writes_nothing() {
        let repository = Arc::new(InMemoryUserRepository::new());
        let service = UserService::new(repository, fast_hasher());
        service.create_schema().await.unwrap();

        let error = service
            .put(UserInput::new("myuser", "mypass"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Storage);
        assert!(service.get_by_username("myuser").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_puts() {
        let service = Arc::new(create_service().await);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .put(UserInput::new(format!("user{}", i), "mypass"))
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        for i in 0..8 {
            let user = service.get_by_username(&format!("user{}", i)).await.unwrap();
            assert_eq!(user.username(), format!("user{}", i));
        }
    }

    #[tokio::test]
    async fn test_validation_failure_skips_store() {
        let mut repository = MockUserRepository::new();
        repository.expect_acquire().returning(|| Ok(()));
        repository.expect_insert().never();
        repository.expect_update().never();

        let service = UserService::new(Arc::new(repository), fast_hasher());
        let error = service
            .put(UserInput {
                username: Some("myuser".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(error.details()[0].path, ".password");
    }

    #[tokio::test]
    async fn test_storage_error_surfaces_unchanged() {
        let mut repository = MockUserRepository::new();
        repository.expect_acquire().returning(|| Ok(()));
        repository
            .expect_select_by_username()
            .returning(|_, _| Err(DomainError::storage("connection reset by peer")));

        let service = UserService::new(Arc::new(repository), fast_hasher());
        let error = service
            .authenticate(Credentials::new("myuser", "mypass"))
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "Storage error: connection reset by peer");
    }

    #[tokio::test]
    async fn test_acquire_failure_aborts_put() {
        let mut repository = MockUserRepository::new();
        repository
            .expect_acquire()
            .returning(|| Err(DomainError::storage("pool timed out")));
        repository.expect_insert().never();

        let service = UserService::new(Arc::new(repository), fast_hasher());
        let error = service
            .put(UserInput::new("myuser", "mypass"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_empty_write_result_is_not_found() {
        let mut repository = MockUserRepository::new();
        repository.expect_acquire().returning(|| Ok(()));
        repository.expect_insert().returning(|_, _, _| Ok(Vec::new()));

        let service = UserService::new(Arc::new(repository), fast_hasher());
        let error = service
            .put(UserInput::new("myuser", "mypass"))
            .await
            .unwrap_err();

        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_stored_hash_is_hash_error() {
        let mut repository = MockUserRepository::new();
        repository.expect_acquire().returning(|| Ok(()));
        repository.expect_select_by_username().returning(|_, username| {
            Ok(vec![User::from_row(
                UserId::new(1),
                username,
                "not base64!",
                Some("c2FsdA==".to_string()),
            )])
        });

        let service = UserService::new(Arc::new(repository), fast_hasher());
        let error = service
            .authenticate(Credentials::new("myuser", "mypass"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Hash);
    }

    #[tokio::test]
    async fn test_end_closes_repository() {
        let mut repository = MockUserRepository::new();
        repository.expect_close().times(1).returning(|| ());

        let service = UserService::new(Arc::new(repository), fast_hasher());
        service.end().await;
    }

    #[test]
    fn test_json_schema_exposed() {
        let service = UserService::new(Arc::new(InMemoryUserRepository::new()), fast_hasher());

        assert_eq!(service.json_schema()["required"][1], "password");
    }
}
