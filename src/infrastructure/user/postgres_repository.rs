//! PostgreSQL user repository implementation

use std::time::Duration;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::domain::user::{DerivedCredential, User, UserId, UserRepository};
use crate::domain::DomainError;

/// PostgreSQL implementation of UserRepository
///
/// The `salt` column exists only when `with_salt` is set; the flag must match
/// the hashing scheme the table is used with.
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
    table: String,
    with_salt: bool,
}

impl PostgresUserRepository {
    /// Create a new repository with the given connection pool
    ///
    /// `table` is interpolated into statements and must be a trusted identifier.
    pub fn new(pool: PgPool, table: impl Into<String>, with_salt: bool) -> Self {
        Self {
            pool,
            table: table.into(),
            with_salt,
        }
    }

    /// Build a pool that opens connections on first use
    pub fn connect_lazy(config: &DatabaseConfig, with_salt: bool) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect_lazy(&config.url)
            .map_err(|e| DomainError::storage(format!("Invalid PostgreSQL URL: {}", e)))?;

        Ok(Self::new(pool, &config.table, with_salt))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn columns(&self) -> &'static str {
        if self.with_salt {
            "id, username, hash, salt"
        } else {
            "id, username, hash"
        }
    }

    fn create_table_sql(&self) -> String {
        let salt_column = if self.with_salt {
            ",\n                salt TEXT NOT NULL"
        } else {
            ""
        };

        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(255) UNIQUE NOT NULL,
                hash TEXT NOT NULL{}
            )
            "#,
            self.table, salt_column
        )
    }

    fn insert_sql(&self) -> String {
        if self.with_salt {
            format!(
                "INSERT INTO {} (username, hash, salt) VALUES ($1, $2, $3) RETURNING {}",
                self.table,
                self.columns()
            )
        } else {
            format!(
                "INSERT INTO {} (username, hash) VALUES ($1, $2) RETURNING {}",
                self.table,
                self.columns()
            )
        }
    }

    fn update_sql(&self) -> String {
        if self.with_salt {
            format!(
                "UPDATE {} SET username = $2, hash = $3, salt = $4 WHERE id = $1 RETURNING {}",
                self.table,
                self.columns()
            )
        } else {
            format!(
                "UPDATE {} SET username = $2, hash = $3 WHERE id = $1 RETURNING {}",
                self.table,
                self.columns()
            )
        }
    }

    fn select_sql(&self, key: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = $1",
            self.columns(),
            self.table,
            key
        )
    }

    fn rows_to_users(&self, rows: Vec<PgRow>) -> Result<Vec<User>, DomainError> {
        rows.iter()
            .map(|row| row_to_user(row, self.with_salt))
            .collect()
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    type Handle = PoolConnection<Postgres>;

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, DomainError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to acquire connection: {}", e)))
    }

    async fn create_table(&self, handle: &mut PoolConnection<Postgres>) -> Result<(), DomainError> {
        sqlx::query(&self.create_table_sql())
            .execute(&mut **handle)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create table: {}", e)))?;

        debug!(table = %self.table, with_salt = self.with_salt, "User table ensured");
        Ok(())
    }

    async fn drop_table(&self, handle: &mut PoolConnection<Postgres>) -> Result<(), DomainError> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&mut **handle)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to drop table: {}", e)))?;

        debug!(table = %self.table, "User table dropped");
        Ok(())
    }

    async fn insert(
        &self,
        handle: &mut PoolConnection<Postgres>,
        username: &str,
        credential: &DerivedCredential,
    ) -> Result<Vec<User>, DomainError> {
        credential.check_salt_column(self.with_salt)?;

        let sql = self.insert_sql();
        let mut query = sqlx::query(&sql).bind(username).bind(&credential.hash);

        if self.with_salt {
            query = query.bind(credential.salt.as_deref());
        }

        let rows = query
            .fetch_all(&mut **handle)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to insert user: {}", e)))?;

        self.rows_to_users(rows)
    }

    async fn update(
        &self,
        handle: &mut PoolConnection<Postgres>,
        id: UserId,
        username: &str,
        credential: &DerivedCredential,
    ) -> Result<Vec<User>, DomainError> {
        credential.check_salt_column(self.with_salt)?;

        let sql = self.update_sql();
        let mut query = sqlx::query(&sql)
            .bind(id.value())
            .bind(username)
            .bind(&credential.hash);

        if self.with_salt {
            query = query.bind(credential.salt.as_deref());
        }

        let rows = query
            .fetch_all(&mut **handle)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update user: {}", e)))?;

        self.rows_to_users(rows)
    }

    async fn select_by_id(
        &self,
        handle: &mut PoolConnection<Postgres>,
        id: UserId,
    ) -> Result<Vec<User>, DomainError> {
        let rows = sqlx::query(&self.select_sql("id"))
            .bind(id.value())
            .fetch_all(&mut **handle)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        self.rows_to_users(rows)
    }

    async fn select_by_username(
        &self,
        handle: &mut PoolConnection<Postgres>,
        username: &str,
    ) -> Result<Vec<User>, DomainError> {
        let rows = sqlx::query(&self.select_sql("username"))
            .bind(username)
            .fetch_all(&mut **handle)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user by username: {}", e)))?;

        self.rows_to_users(rows)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_user(row: &PgRow, with_salt: bool) -> Result<User, DomainError> {
    let column = |e: sqlx::Error| DomainError::storage(format!("Invalid user row: {}", e));

    let id: i64 = row.try_get("id").map_err(column)?;
    let username: String = row.try_get("username").map_err(column)?;
    let hash: String = row.try_get("hash").map_err(column)?;
    let salt: Option<String> = if with_salt {
        row.try_get("salt").map_err(column)?
    } else {
        None
    };

    Ok(User::from_row(UserId::new(id), username, hash, salt))
}
